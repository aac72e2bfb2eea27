use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::domain::AccountEvent;
use crate::infrastructure::event_handler::{EventHandler, HandleOutcome};
use crate::infrastructure::kafka_abstraction::{EventProducer, ProducerError};

#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub topic: String,
    pub key: String,
    pub payload: Vec<u8>,
}

/// Append-only log kept in process memory. Stands in for the broker when
/// Kafka is disabled, paired with [`InMemoryEventLog::project_into`], and
/// lets tests replay published records into a handler.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventLog {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Removes and returns every record published so far, in publish order.
    pub fn drain(&self) -> Vec<LogRecord> {
        std::mem::take(&mut *self.lock())
    }

    /// Drains the log and delivers each record to `handler`, one at a time.
    pub async fn deliver_to(&self, handler: &dyn EventHandler) -> Vec<HandleOutcome> {
        let mut outcomes = Vec::new();
        for record in self.drain() {
            outcomes.push(handler.handle(&record.topic, &record.payload).await);
        }
        outcomes
    }

    /// Delivers new records to `handler` every `interval` until `shutdown` is
    /// cancelled, then drains what is left.
    pub async fn project_into(
        &self,
        handler: &dyn EventHandler,
        interval: Duration,
        shutdown: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.deliver_to(handler).await;
                }
            }
        }
        let remaining = self.deliver_to(handler).await;
        info!(
            "InMemoryEventLog: projection stopped after draining {} records",
            remaining.len()
        );
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LogRecord>> {
        // A poisoned log still holds valid records.
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl EventProducer for InMemoryEventLog {
    async fn produce(&self, event: &AccountEvent) -> Result<(), ProducerError> {
        let record = LogRecord {
            topic: event.topic().to_string(),
            key: event.account_id().to_string(),
            payload: event.to_payload()?,
        };
        debug!(topic = %record.topic, key = %record.key, "appended to in-memory log");
        self.lock().push(record);
        Ok(())
    }
}
