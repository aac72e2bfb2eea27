use async_trait::async_trait;
use rdkafka::{
    client::ClientContext,
    config::ClientConfig,
    consumer::{Consumer, ConsumerContext, Rebalance, StreamConsumer},
    error::KafkaError,
    producer::{FutureProducer, FutureRecord},
    util::Timeout,
    Message,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::{AccountEvent, TOPICS};
use crate::infrastructure::event_handler::EventHandler;

/// Publishes one event to the log under its own topic. Returns only once the
/// log has acknowledged the write.
#[async_trait]
pub trait EventProducer: Send + Sync {
    async fn produce(&self, event: &AccountEvent) -> Result<(), ProducerError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Producer error: {0}")]
    Transport(String),
}

impl From<KafkaError> for ProducerError {
    fn from(error: KafkaError) -> Self {
        ProducerError::Transport(error.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub enabled: bool,
    pub bootstrap_servers: String,
    pub group_id: String,
    pub client_id: String,
    pub auto_offset_reset: String,
    pub message_timeout_ms: u64,
    pub session_timeout_ms: u32,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bootstrap_servers: "localhost:9092".to_string(),
            group_id: "bank-events-projection".to_string(),
            client_id: "bank-events".to_string(),
            auto_offset_reset: "earliest".to_string(),
            message_timeout_ms: 5000,
            session_timeout_ms: 10000,
        }
    }
}

#[derive(Clone)]
pub struct KafkaEventProducer {
    producer: FutureProducer,
    send_timeout: Duration,
}

impl KafkaEventProducer {
    pub fn new(config: &KafkaConfig) -> Result<Self, KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("client.id", &config.client_id)
            .set("acks", "all")
            .set("message.timeout.ms", config.message_timeout_ms.to_string())
            .create()?;

        info!(
            "KafkaEventProducer: connected to {} (acks=all)",
            config.bootstrap_servers
        );

        Ok(Self {
            producer,
            send_timeout: Duration::from_millis(config.message_timeout_ms),
        })
    }
}

#[async_trait]
impl EventProducer for KafkaEventProducer {
    async fn produce(&self, event: &AccountEvent) -> Result<(), ProducerError> {
        let payload = event.to_payload()?;
        let topic = event.topic();

        // Keyed by account so one account's events stay on one partition.
        let (partition, offset) = self
            .producer
            .send(
                FutureRecord::to(topic)
                    .key(event.account_id())
                    .payload(&payload),
                Timeout::After(self.send_timeout),
            )
            .await
            .map_err(|(e, _)| ProducerError::from(e))?;

        debug!(
            topic,
            partition,
            offset,
            account_id = event.account_id(),
            "event acknowledged"
        );
        Ok(())
    }
}

struct LoggingConsumerContext;

impl ClientContext for LoggingConsumerContext {}

impl ConsumerContext for LoggingConsumerContext {
    fn pre_rebalance(
        &self,
        _consumer: &rdkafka::consumer::BaseConsumer<Self>,
        rebalance: &Rebalance,
    ) {
        info!("Pre-rebalance: {:?}", rebalance);
    }

    fn post_rebalance(
        &self,
        _consumer: &rdkafka::consumer::BaseConsumer<Self>,
        rebalance: &Rebalance,
    ) {
        info!("Post-rebalance: {:?}", rebalance);
    }
}

type LoggingConsumer = StreamConsumer<LoggingConsumerContext>;

const RECEIVE_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Waits out the receive backoff. Returns `false` if shutdown came first.
async fn back_off(shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(RECEIVE_RETRY_BACKOFF) => true,
    }
}

/// Consumer-group member feeding every delivered message to an
/// [`EventHandler`], one at a time.
pub struct KafkaEventConsumer {
    consumer: LoggingConsumer,
}

impl KafkaEventConsumer {
    pub fn new(config: &KafkaConfig) -> Result<Self, KafkaError> {
        info!(
            "KafkaEventConsumer: bootstrap_servers: {}, group_id: {}, auto_offset_reset: {}",
            config.bootstrap_servers, config.group_id, config.auto_offset_reset
        );

        // Offsets are stored by hand after the handler returns and committed by
        // the background auto-commit, giving at-least-once delivery.
        let consumer: LoggingConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("group.id", &config.group_id)
            .set("client.id", &config.client_id)
            .set("enable.auto.commit", "true")
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", config.session_timeout_ms.to_string())
            .create_with_context(LoggingConsumerContext)?;

        Ok(Self { consumer })
    }

    pub fn subscribe(&self) -> Result<(), KafkaError> {
        self.consumer.subscribe(&TOPICS)?;
        info!("KafkaEventConsumer: subscribed to {:?}", TOPICS);
        Ok(())
    }

    /// Runs until `shutdown` is cancelled. A bad message never stops the loop.
    pub async fn run(&self, handler: &dyn EventHandler, shutdown: CancellationToken) {
        loop {
            let received = tokio::select! {
                _ = shutdown.cancelled() => break,
                received = self.consumer.recv() => received,
            };

            let message = match received {
                Ok(message) => message.detach(),
                Err(e) => {
                    error!("KafkaEventConsumer: receive failed: {}", e);
                    if back_off(&shutdown).await {
                        continue;
                    }
                    break;
                }
            };

            let outcome = handler
                .handle(message.topic(), message.payload().unwrap_or_default())
                .await;
            debug!(
                topic = message.topic(),
                partition = message.partition(),
                offset = message.offset(),
                ?outcome,
                "message handled"
            );

            // The stored offset is the next one to read.
            if let Err(e) = self.consumer.store_offset(
                message.topic(),
                message.partition(),
                message.offset() + 1,
            ) {
                warn!(
                    "KafkaEventConsumer: failed to store offset {} on {}/{}: {}",
                    message.offset(),
                    message.topic(),
                    message.partition(),
                    e
                );
            }
        }

        info!("KafkaEventConsumer: shutdown requested, leaving consume loop");
    }
}
