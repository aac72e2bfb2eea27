use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::domain::{Account, AccountEvent, EventKind};
use crate::infrastructure::account_store::{AccountStore, StoreError};

/// Consumer-side entry point: one call per delivered message.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, topic: &str, payload: &[u8]) -> HandleOutcome;
}

/// What happened to a delivered message. Informational only: no outcome
/// is retried or re-queued.
#[derive(Debug, Clone, PartialEq)]
pub enum HandleOutcome {
    Applied(EventKind),
    /// The event's precondition did not hold (unknown account, duplicate open).
    Skipped { kind: EventKind, reason: String },
    /// The payload could not be decoded or the store call failed.
    Dropped { reason: String },
    UnknownTopic,
}

#[derive(Debug)]
enum ProjectionError {
    MissingAccount(String),
    Store(StoreError),
}

impl From<StoreError> for ProjectionError {
    fn from(error: StoreError) -> Self {
        ProjectionError::Store(error)
    }
}

/// Routes events by topic and applies them to the account store.
///
/// Delivery is at-least-once and nothing here deduplicates: redelivered
/// deposits and withdrawals are applied again. A redelivered open is
/// rejected by the store and skipped, so the first open for an id wins.
#[derive(Clone)]
pub struct AccountEventHandler {
    store: Arc<dyn AccountStore>,
}

impl AccountEventHandler {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    async fn apply(&self, event: AccountEvent) -> Result<(), ProjectionError> {
        match event {
            AccountEvent::OpenAccount(e) => {
                let account = Account::open(&e);
                self.store.insert(account).await?;
                info!(account_id = %e.id, balance = %e.opening_balance, "account opened");
            }
            AccountEvent::DepositFund(e) => {
                let account = self
                    .store
                    .adjust_balance(&e.id, e.amount)
                    .await?
                    .ok_or_else(|| ProjectionError::MissingAccount(e.id.clone()))?;
                info!(account_id = %account.id, balance = %account.balance, "funds deposited");
            }
            AccountEvent::WithdrawFund(e) => {
                // No floor: balances may go negative.
                let account = self
                    .store
                    .adjust_balance(&e.id, -e.amount)
                    .await?
                    .ok_or_else(|| ProjectionError::MissingAccount(e.id.clone()))?;
                info!(account_id = %account.id, balance = %account.balance, "funds withdrawn");
            }
            AccountEvent::CloseAccount(e) => {
                self.store.delete(&e.id).await?;
                info!(account_id = %e.id, "account deleted");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl EventHandler for AccountEventHandler {
    async fn handle(&self, topic: &str, payload: &[u8]) -> HandleOutcome {
        let Some(kind) = EventKind::from_topic(topic) else {
            warn!(topic, "unknown topic, message ignored");
            return HandleOutcome::UnknownTopic;
        };

        let event = match AccountEvent::from_payload(kind, payload) {
            Ok(event) => event,
            Err(e) => {
                error!(topic, error = %e, "undecodable payload, message dropped");
                return HandleOutcome::Dropped {
                    reason: e.to_string(),
                };
            }
        };

        match self.apply(event).await {
            Ok(()) => HandleOutcome::Applied(kind),
            Err(ProjectionError::MissingAccount(id)) => {
                warn!(topic, account_id = %id, "account not found, message dropped");
                HandleOutcome::Skipped {
                    kind,
                    reason: format!("account {} not found", id),
                }
            }
            Err(ProjectionError::Store(StoreError::AlreadyExists(id))) => {
                warn!(topic, account_id = %id, "account already open, message dropped");
                HandleOutcome::Skipped {
                    kind,
                    reason: format!("account {} already exists", id),
                }
            }
            Err(ProjectionError::Store(e)) => {
                error!(topic, error = %e, "store call failed, message dropped");
                HandleOutcome::Dropped {
                    reason: e.to_string(),
                }
            }
        }
    }
}
