//! In-memory log and store backends.
//!
//! Используются в тестах gateway и materializer'а вместо Kafka и PostgreSQL.

mod log;
mod store;

pub use log::{MemoryConsumer, MemoryLog, MemoryProducer};
pub use store::MemoryStore;
