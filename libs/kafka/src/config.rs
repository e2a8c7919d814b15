use std::collections::BTreeMap;
use std::time::Duration;

use rdkafka::ClientConfig;

/// Параметры подключения к Kafka-совместимому брокеру.
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    /// `bootstrap.servers`, e.g. "localhost:19092".
    pub brokers: String,
    /// Бюджет на проверку связи с брокером при старте и на seek.
    pub connect_timeout: Duration,
    /// `auto.offset.reset` для группы без committed offset'ов.
    pub auto_offset_reset: String,
    /// Дополнительные librdkafka properties, применяются последними.
    pub properties: BTreeMap<String, String>,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:19092".into(),
            connect_timeout: Duration::from_secs(5),
            auto_offset_reset: "earliest".into(),
            properties: BTreeMap::new(),
        }
    }
}

impl KafkaConfig {
    /// Idempotent producer: повторы внутри клиента не ломают порядок по ключу.
    pub fn producer_config(&self) -> ClientConfig {
        let mut cfg = ClientConfig::new();
        cfg.set("bootstrap.servers", &self.brokers)
            .set("enable.idempotence", "true")
            .set("acks", "all");
        self.apply_properties(&mut cfg);
        cfg
    }

    /// Consumer без auto-commit: offset'ы коммитит только materializer.
    pub fn consumer_config(&self, group: &str) -> ClientConfig {
        let mut cfg = ClientConfig::new();
        cfg.set("bootstrap.servers", &self.brokers)
            .set("group.id", group)
            .set("enable.auto.commit", "false")
            .set("enable.partition.eof", "false")
            .set("auto.offset.reset", &self.auto_offset_reset);
        self.apply_properties(&mut cfg);
        cfg
    }

    fn apply_properties(&self, cfg: &mut ClientConfig) {
        for (key, value) in &self.properties {
            cfg.set(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn producer_is_idempotent() {
        let cfg = KafkaConfig::default().producer_config();
        assert_eq!(cfg.get("bootstrap.servers"), Some("localhost:19092"));
        assert_eq!(cfg.get("enable.idempotence"), Some("true"));
        assert_eq!(cfg.get("acks"), Some("all"));
    }

    #[test]
    fn consumer_never_auto_commits() {
        let cfg = KafkaConfig::default().consumer_config("processor-group");
        assert_eq!(cfg.get("group.id"), Some("processor-group"));
        assert_eq!(cfg.get("enable.auto.commit"), Some("false"));
        assert_eq!(cfg.get("auto.offset.reset"), Some("earliest"));
    }

    #[test]
    fn extra_properties_override_defaults() {
        let mut kafka = KafkaConfig::default();
        kafka.properties.insert("acks".into(), "1".into());
        kafka.properties.insert("client.id".into(), "firehose".into());
        let cfg = kafka.producer_config();
        assert_eq!(cfg.get("acks"), Some("1"));
        assert_eq!(cfg.get("client.id"), Some("firehose"));
    }
}
