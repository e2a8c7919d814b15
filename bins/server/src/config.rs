use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use firehose_kafka::KafkaConfig;
use firehose_postgres::{PgStoreConfig, validate_table_identifier};
use materializer::MaterializerOptions;

use crate::error::ServerError;

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Parser)]
#[command(name = "firehose", about = "Приём показаний сенсоров: HTTP → лог → time-series store")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// HTTP ingress: принять показание и передать в лог
    Gateway(GatewayArgs),
    /// Batch materializer: перенести записи лога в store
    Materialize(MaterializeArgs),
}

/// Общие для обеих ролей параметры лога.
#[derive(Args, Clone, Debug, Default)]
pub struct LogArgs {
    /// Путь к TOML конфиг файлу (без него — значения по умолчанию)
    #[arg(long, env = "FIREHOSE_CONFIG")]
    pub config: Option<String>,

    /// Kafka bootstrap servers
    #[arg(long, env = "FIREHOSE_BROKERS")]
    pub brokers: Option<String>,

    /// Topic с показаниями
    #[arg(long, env = "FIREHOSE_TOPIC")]
    pub topic: Option<String>,
}

#[derive(Args, Clone, Debug, Default)]
pub struct GatewayArgs {
    #[command(flatten)]
    pub log: LogArgs,

    /// Адрес HTTP сервера, напр. 0.0.0.0:8000
    #[arg(long, env = "FIREHOSE_LISTEN")]
    pub listen: Option<String>,
}

#[derive(Args, Clone, Debug, Default)]
pub struct MaterializeArgs {
    #[command(flatten)]
    pub log: LogArgs,

    /// Consumer group
    #[arg(long, env = "FIREHOSE_GROUP")]
    pub group: Option<String>,

    /// Строка подключения к store
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Число реплик materializer'а в процессе
    #[arg(long)]
    pub replicas: Option<usize>,

    /// Сколько fetch ждёт первую запись, мс
    #[arg(long, env = "FIREHOSE_FETCH_WAIT_MS")]
    pub fetch_wait_ms: Option<u64>,

    /// Пауза после пустого или неуспешного цикла, мс
    #[arg(long, env = "FIREHOSE_IDLE_BACKOFF_MS")]
    pub idle_backoff_ms: Option<u64>,
}

// ═══════════════════════════════════════════════════════════════
//  Config file (TOML)
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub log: LogSection,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub gateway: GatewaySection,
    #[serde(default)]
    pub materializer: MaterializerSection,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    pub brokers: String,
    pub topic: String,
    pub group: String,
    pub connect_timeout_ms: u64,
    pub auto_offset_reset: String,
    /// Дополнительные librdkafka properties.
    pub properties: BTreeMap<String, String>,
}

impl Default for LogSection {
    fn default() -> Self {
        let kafka = KafkaConfig::default();
        Self {
            brokers: kafka.brokers,
            topic: "sensor-readings".into(),
            group: "processor-group".into(),
            connect_timeout_ms: kafka.connect_timeout.as_millis() as u64,
            auto_offset_reset: kafka.auto_offset_reset,
            properties: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub url: String,
    pub table: String,
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
}

impl Default for StoreSection {
    fn default() -> Self {
        let store = PgStoreConfig::default();
        Self {
            url: store.url,
            table: store.table,
            max_connections: store.max_connections,
            acquire_timeout_ms: store.acquire_timeout.as_millis() as u64,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GatewaySection {
    pub listen: String,
    pub flush_timeout_ms: u64,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8000".into(),
            flush_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MaterializerSection {
    pub max_records: usize,
    pub fetch_wait_ms: u64,
    pub idle_backoff_ms: u64,
    pub replicas: usize,
    pub shutdown_grace_ms: u64,
}

impl Default for MaterializerSection {
    fn default() -> Self {
        let options = MaterializerOptions::default();
        Self {
            max_records: options.max_records,
            fetch_wait_ms: options.fetch_wait.as_millis() as u64,
            idle_backoff_ms: options.idle_backoff.as_millis() as u64,
            replicas: 1,
            shutdown_grace_ms: 30_000,
        }
    }
}

impl ServerConfig {
    pub fn load(path: &str) -> Result<Self, ServerError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        Self::parse(&content)
            .map_err(|e| ServerError::Config { context: "parse", detail: format!("'{path}': {e}") })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Явно указанный файл обязан читаться; без него — defaults.
    fn load_optional(path: Option<&str>) -> Result<Self, ServerError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Effective — merged config
// ═══════════════════════════════════════════════════════════════

/// Итоговая конфигурация gateway: config.toml < env/CLI
#[derive(Debug)]
pub struct GatewayEffective {
    pub kafka: KafkaConfig,
    pub topic: String,
    pub listen: SocketAddr,
    pub flush_timeout: Duration,
}

impl GatewayEffective {
    pub fn new(args: &GatewayArgs) -> Result<Self, ServerError> {
        let cfg = ServerConfig::load_optional(args.log.config.as_deref())?;
        Self::merge(args, cfg)
    }

    pub fn merge(args: &GatewayArgs, cfg: ServerConfig) -> Result<Self, ServerError> {
        let (kafka, topic) = merge_log(&args.log, &cfg.log)?;
        let listen = args.listen.clone().unwrap_or(cfg.gateway.listen);
        let listen: SocketAddr = listen
            .parse()
            .map_err(|e| ServerError::invalid(format!("listen '{listen}': {e}")))?;

        Ok(Self {
            kafka,
            topic,
            listen,
            flush_timeout: Duration::from_millis(cfg.gateway.flush_timeout_ms),
        })
    }
}

/// Итоговая конфигурация materializer'а: config.toml < env/CLI
#[derive(Debug)]
pub struct MaterializeEffective {
    pub kafka: KafkaConfig,
    pub topic: String,
    pub group: String,
    pub store: PgStoreConfig,
    pub options: MaterializerOptions,
    pub replicas: usize,
    pub shutdown_grace: Duration,
}

impl MaterializeEffective {
    pub fn new(args: &MaterializeArgs) -> Result<Self, ServerError> {
        let cfg = ServerConfig::load_optional(args.log.config.as_deref())?;
        Self::merge(args, cfg)
    }

    pub fn merge(args: &MaterializeArgs, cfg: ServerConfig) -> Result<Self, ServerError> {
        let (kafka, topic) = merge_log(&args.log, &cfg.log)?;
        let group = args.group.clone().unwrap_or(cfg.log.group);
        if group.is_empty() {
            return Err(ServerError::invalid("consumer group is empty"));
        }

        validate_table_identifier(&cfg.store.table)?;
        let store = PgStoreConfig {
            url: args.database_url.clone().unwrap_or(cfg.store.url),
            table: cfg.store.table,
            max_connections: cfg.store.max_connections,
            acquire_timeout: Duration::from_millis(cfg.store.acquire_timeout_ms),
        };

        let m = cfg.materializer;
        if m.max_records == 0 {
            return Err(ServerError::invalid("materializer.max_records must be > 0"));
        }
        let replicas = args.replicas.unwrap_or(m.replicas);
        if replicas == 0 {
            return Err(ServerError::invalid("replicas must be > 0"));
        }
        if store.max_connections == 0 {
            return Err(ServerError::invalid("store.max_connections must be > 0"));
        }

        Ok(Self {
            kafka,
            topic,
            group,
            store,
            options: MaterializerOptions {
                max_records: m.max_records,
                fetch_wait: Duration::from_millis(args.fetch_wait_ms.unwrap_or(m.fetch_wait_ms)),
                idle_backoff: Duration::from_millis(args.idle_backoff_ms.unwrap_or(m.idle_backoff_ms)),
            },
            replicas,
            shutdown_grace: Duration::from_millis(m.shutdown_grace_ms),
        })
    }
}

fn merge_log(args: &LogArgs, log: &LogSection) -> Result<(KafkaConfig, String), ServerError> {
    let brokers = args.brokers.clone().unwrap_or_else(|| log.brokers.clone());
    if brokers.trim().is_empty() {
        return Err(ServerError::invalid("brokers are empty"));
    }
    let topic = args.topic.clone().unwrap_or_else(|| log.topic.clone());
    if topic.is_empty() {
        return Err(ServerError::invalid("topic is empty"));
    }

    let kafka = KafkaConfig {
        brokers,
        connect_timeout: Duration::from_millis(log.connect_timeout_ms),
        auto_offset_reset: log.auto_offset_reset.clone(),
        properties: log.properties.clone(),
    };
    Ok((kafka, topic))
}
