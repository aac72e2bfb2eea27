pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod web;

// Re-export commonly used types
pub use application::{AccountCommandService, CommandError};
pub use domain::{Account, AccountEvent, EventKind, TOPICS};
pub use infrastructure::{
    AccountEventHandler, AccountStore, AppConfig, EventHandler, EventProducer, HandleOutcome,
    InMemoryAccountStore, InMemoryEventLog, KafkaEventConsumer, KafkaEventProducer,
    PostgresAccountStore,
};
