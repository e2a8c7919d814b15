use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use firehose_api::{LogConsumer, Reading};
use firehose_memory::MemoryLog;
use gateway::{Gateway, router};

fn post_readings(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/readings")
        .header("content-type", "application/json")
        .body(Body::from(body.to_owned()))
        .unwrap()
}

fn app(log: &MemoryLog) -> axum::Router {
    router(Arc::new(Gateway::new(Arc::new(log.producer()), log.topic())))
}

#[tokio::test]
async fn valid_reading_returns_202_and_is_published() {
    let log = MemoryLog::new("sensor-readings", 4);
    let resp = app(&log)
        .oneshot(post_readings(r#"{"sensor_id":"s1","value":23.5,"timestamp":1700000000}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    let mut consumer = log.consumer("test");
    let batch = consumer.fetch(10, Duration::from_millis(10)).await.unwrap();
    assert_eq!(batch.len(), 1);
    let record = &batch.records[0];
    assert_eq!(record.key.as_deref(), Some(&b"s1"[..]));
    assert_eq!(
        Reading::decode(record.payload.as_deref().unwrap()).unwrap(),
        Reading::new("s1", 23.5, 1_700_000_000)
    );
}

#[tokio::test]
async fn malformed_body_returns_400() {
    let log = MemoryLog::new("sensor-readings", 1);
    for body in [
        "{",
        r#"{"sensor_id":"s1","timestamp":1700000000}"#,
        r#"{"sensor_id":"s1","value":23.5,"timestamp":"yesterday"}"#,
    ] {
        let resp = app(&log).oneshot(post_readings(body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{body}");
        let text = to_bytes(resp.into_body(), 1024).await.unwrap();
        assert_eq!(&text[..], b"Invalid request payload");
    }
    assert_eq!(log.end_offset(0), 0);
}

#[tokio::test]
async fn unstorable_reading_returns_400() {
    let log = MemoryLog::new("sensor-readings", 1);
    for body in [
        r#"{"sensor_id":"bad\u0000id","value":1.0,"timestamp":1}"#,
        r#"{"sensor_id":"s1","value":1.0,"timestamp":-210866803201}"#,
    ] {
        let resp = app(&log).oneshot(post_readings(body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{body}");
    }
    assert_eq!(log.end_offset(0), 0);
}

#[tokio::test]
async fn refused_handoff_returns_503() {
    let log = MemoryLog::new("sensor-readings", 1);
    log.fail_next_publishes(1);
    let resp = app(&log)
        .oneshot(post_readings(r#"{"sensor_id":"s1","value":1,"timestamp":1}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn get_on_readings_is_not_allowed() {
    let log = MemoryLog::new("sensor-readings", 1);
    let req = Request::builder().uri("/readings").body(Body::empty()).unwrap();
    let resp = app(&log).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn health_is_ok() {
    let log = MemoryLog::new("sensor-readings", 1);
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let resp = app(&log).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn concurrent_requests_share_one_producer() {
    let log = MemoryLog::new("sensor-readings", 4);
    let router = app(&log);

    let mut handles = Vec::new();
    for i in 0..32 {
        let router = router.clone();
        handles.push(tokio::spawn(async move {
            let body = format!(r#"{{"sensor_id":"s{}","value":{i},"timestamp":{i}}}"#, i % 5);
            router.oneshot(post_readings(&body)).await.unwrap().status()
        }));
    }
    for h in handles {
        assert_eq!(h.await.unwrap(), StatusCode::ACCEPTED);
    }

    let total: i64 = (0..4).map(|p| log.end_offset(p)).sum();
    assert_eq!(total, 32);
}
