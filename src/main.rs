use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use bank_events::infrastructure::logging::{init_logging, LoggingConfig};
use bank_events::web::create_router;
use bank_events::{
    AccountCommandService, AccountEventHandler, AppConfig, EventProducer, InMemoryAccountStore,
    InMemoryEventLog, KafkaEventProducer,
};

const IN_PROCESS_PROJECTION_INTERVAL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env();
    let _guard = init_logging(&LoggingConfig {
        file_name: "command-api.log".to_string(),
        ..config.logging.clone()
    })?;

    info!("Starting bank-events command API");

    let shutdown = CancellationToken::new();
    let mut projection: Option<JoinHandle<()>> = None;

    let producer: Arc<dyn EventProducer> = if config.kafka.enabled {
        Arc::new(
            KafkaEventProducer::new(&config.kafka).context("creating Kafka producer")?,
        )
    } else {
        warn!("Kafka disabled; events are projected in process into an in-memory store");
        let log = InMemoryEventLog::new();
        let handler = AccountEventHandler::new(Arc::new(InMemoryAccountStore::new()));
        let projection_log = log.clone();
        let projection_shutdown = shutdown.clone();
        projection = Some(tokio::spawn(async move {
            projection_log
                .project_into(&handler, IN_PROCESS_PROJECTION_INTERVAL, projection_shutdown)
                .await;
        }));
        Arc::new(log)
    };

    let service = Arc::new(AccountCommandService::new(producer));
    let app = create_router(service);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Server listening on {}", addr);

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for ctrl-c: {}", e);
            }
            info!("Shutdown signal received");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Some(projection) = projection {
        projection.await.context("in-process projection task")?;
    }

    Ok(())
}
