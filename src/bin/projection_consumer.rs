use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use bank_events::infrastructure::logging::{init_logging, LoggingConfig};
use bank_events::{AccountEventHandler, AppConfig, KafkaEventConsumer, PostgresAccountStore};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env();
    let _guard = init_logging(&LoggingConfig {
        file_name: "projection-consumer.log".to_string(),
        ..config.logging.clone()
    })?;

    info!("Starting projection consumer...");

    let store = PostgresAccountStore::connect(&config.database.url, config.database.max_connections)
        .await
        .context("connecting to account store")?;
    store
        .ensure_schema()
        .await
        .context("creating accounts table")?;

    let handler = AccountEventHandler::new(Arc::new(store));

    let consumer = KafkaEventConsumer::new(&config.kafka).context("creating Kafka consumer")?;
    consumer.subscribe().context("subscribing to event topics")?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                signal.cancel();
            }
            Err(e) => error!("failed to listen for ctrl-c: {}", e),
        }
    });

    consumer.run(&handler, shutdown).await;

    info!("Projection consumer stopped");
    Ok(())
}
