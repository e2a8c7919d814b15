use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{FirehoseError, InsertRow};

/// Earliest Unix second the time-series store can hold
/// (PostgreSQL `timestamptz` lower bound, 4714-11-24 00:00:00 UTC BC).
pub const MIN_STORABLE_TIMESTAMP: i64 = -210_866_803_200;

// ════════════════════════════════════════════════════════════════
//  Reading
// ════════════════════════════════════════════════════════════════

/// Одно измерение датчика. Неизменяемо после создания.
///
/// Каноническая байтовая форма — компактный JSON
/// `{"sensor_id":"s1","value":23.5,"timestamp":1700000000}`.
/// `decode(encode(r)) == r` для всех трёх полей.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    sensor_id: String,
    value: f64,
    /// Unix epoch seconds, UTC.
    timestamp: i64,
}

impl Reading {
    pub fn new(sensor_id: impl Into<String>, value: f64, timestamp: i64) -> Self {
        Self { sensor_id: sensor_id.into(), value, timestamp }
    }

    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Partition key в логе: байты `sensor_id`.
    pub fn key(&self) -> Vec<u8> {
        self.sensor_id.as_bytes().to_vec()
    }

    /// Сериализовать в каноническую форму.
    ///
    /// JSON не умеет NaN/Inf, поэтому такие значения — `Validation`,
    /// а не молчаливый `null` в payload.
    pub fn encode(&self) -> Result<Vec<u8>, FirehoseError> {
        if !self.value.is_finite() {
            return Err(FirehoseError::validation(format!(
                "value for sensor '{}' is not finite",
                self.sensor_id
            )));
        }
        serde_json::to_vec(self).map_err(|e| FirehoseError::validation(e.to_string()))
    }

    /// Разобрать байты. Все три поля обязательны и должны иметь верный тип.
    pub fn decode(bytes: &[u8]) -> Result<Self, FirehoseError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Можно ли сохранить измерение в `readings` как есть.
    ///
    /// Timestamp вне диапазона `timestamptz` и NUL в `sensor_id` (Postgres
    /// `text` не хранит 0x00) — `Decode`: такая запись иначе валила бы
    /// каждую попытку вставки батча.
    pub fn check_storable(&self) -> Result<(), FirehoseError> {
        self.row_time()?;
        self.check_sensor_id()
    }

    /// Проекция в строку таблицы `readings(time, sensor_id, value)`.
    pub fn to_row(&self) -> Result<InsertRow, FirehoseError> {
        let time = self.row_time()?;
        self.check_sensor_id()?;
        Ok(InsertRow {
            time,
            sensor_id: self.sensor_id.clone(),
            value: self.value,
        })
    }

    fn row_time(&self) -> Result<DateTime<Utc>, FirehoseError> {
        storable_time(self.timestamp).ok_or_else(|| {
            FirehoseError::decode(format!(
                "timestamp {} of sensor '{}' is outside the storable range",
                self.timestamp, self.sensor_id
            ))
        })
    }

    fn check_sensor_id(&self) -> Result<(), FirehoseError> {
        if self.sensor_id.contains('\0') {
            return Err(FirehoseError::decode(format!(
                "sensor_id {:?} contains a NUL character",
                self.sensor_id
            )));
        }
        Ok(())
    }
}

fn storable_time(timestamp: i64) -> Option<DateTime<Utc>> {
    if timestamp < MIN_STORABLE_TIMESTAMP {
        return None;
    }
    DateTime::<Utc>::from_timestamp(timestamp, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(r: &Reading) -> Reading {
        Reading::decode(&r.encode().unwrap()).unwrap()
    }

    #[test]
    fn canonical_form() {
        let r = Reading::new("s1", 23.5, 1_700_000_000);
        assert_eq!(
            String::from_utf8(r.encode().unwrap()).unwrap(),
            r#"{"sensor_id":"s1","value":23.5,"timestamp":1700000000}"#
        );
    }

    #[test]
    fn round_trip_is_exact() {
        let cases = [
            Reading::new("s1", 23.5, 1_700_000_000),
            Reading::new("", 0.0, 0),
            Reading::new("neg", -0.0, -1),
            Reading::new("max", f64::MAX, i64::MAX),
            Reading::new("min", f64::MIN, i64::MIN),
            Reading::new("tiny", f64::MIN_POSITIVE, 1),
            Reading::new("subnormal", 5e-324, -86_400),
            Reading::new("pi", std::f64::consts::PI, 1_234_567_890),
            Reading::new("0.1", 0.1 + 0.2, 42),
            Reading::new("юникод \"quoted\"", 1e300, 7),
        ];
        for r in &cases {
            let back = round_trip(r);
            assert_eq!(back.sensor_id(), r.sensor_id());
            assert_eq!(back.value().to_bits(), r.value().to_bits(), "{r:?}");
            assert_eq!(back.timestamp(), r.timestamp());
        }
    }

    #[test]
    fn decode_requires_all_fields() {
        assert!(Reading::decode(br#"{"sensor_id":"s1","value":1.0}"#).is_err());
        assert!(Reading::decode(br#"{"sensor_id":"s1","timestamp":1}"#).is_err());
        assert!(Reading::decode(br#"{"value":1.0,"timestamp":1}"#).is_err());
    }

    #[test]
    fn decode_rejects_wrong_types() {
        assert!(Reading::decode(br#"{"sensor_id":1,"value":1.0,"timestamp":1}"#).is_err());
        assert!(Reading::decode(br#"{"sensor_id":"s","value":"1","timestamp":1}"#).is_err());
        assert!(Reading::decode(br#"{"sensor_id":"s","value":1.0,"timestamp":1.5}"#).is_err());
        assert!(Reading::decode(b"not json").is_err());
        assert!(Reading::decode(b"").is_err());
    }

    #[test]
    fn decode_accepts_integer_value_and_extra_fields() {
        let r = Reading::decode(br#"{"sensor_id":"s","value":3,"timestamp":1,"unit":"C"}"#).unwrap();
        assert_eq!(r, Reading::new("s", 3.0, 1));
    }

    #[test]
    fn encode_rejects_non_finite() {
        let err = Reading::new("s", f64::NAN, 1).encode().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
        assert!(Reading::new("s", f64::INFINITY, 1).encode().is_err());
    }

    #[test]
    fn row_time_is_utc_seconds() {
        let row = Reading::new("s1", 23.5, 1_700_000_000).to_row().unwrap();
        assert_eq!(row.time.to_rfc3339(), "2023-11-14T22:13:20+00:00");
        assert_eq!(row.sensor_id, "s1");
        assert_eq!(row.value, 23.5);

        let neg = Reading::new("s", 0.0, -1).to_row().unwrap();
        assert_eq!(neg.time.to_rfc3339(), "1969-12-31T23:59:59+00:00");
    }

    #[test]
    fn row_rejects_unstorable_timestamps() {
        assert!(Reading::new("s", 0.0, MIN_STORABLE_TIMESTAMP).to_row().is_ok());
        let err = Reading::new("s", 0.0, MIN_STORABLE_TIMESTAMP - 1).to_row().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Decode);
        assert!(Reading::new("s", 0.0, i64::MAX).to_row().is_err());
    }

    #[test]
    fn nul_in_sensor_id_is_not_storable() {
        let r = Reading::decode(br#"{"sensor_id":"bad\u0000id","value":1.0,"timestamp":1}"#).unwrap();
        assert_eq!(r.sensor_id(), "bad\0id");
        assert_eq!(r.check_storable().unwrap_err().kind(), crate::ErrorKind::Decode);
        assert_eq!(r.to_row().unwrap_err().kind(), crate::ErrorKind::Decode);
        assert!(Reading::new("ok", 1.0, 1).check_storable().is_ok());
    }
}
