pub mod account_store;
pub mod config;
pub mod event_handler;
pub mod event_log;
pub mod kafka_abstraction;
pub mod logging;

pub use account_store::{AccountStore, InMemoryAccountStore, PostgresAccountStore, StoreError};
pub use config::AppConfig;
pub use event_handler::{AccountEventHandler, EventHandler, HandleOutcome};
pub use event_log::InMemoryEventLog;
pub use kafka_abstraction::{
    EventProducer, KafkaConfig, KafkaEventConsumer, KafkaEventProducer, ProducerError,
};
