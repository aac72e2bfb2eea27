use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::domain::{
    AccountEvent, CloseAccountCommand, CloseAccountEvent, DepositFundCommand, DepositFundEvent,
    OpenAccountCommand, OpenAccountEvent, WithdrawFundCommand, WithdrawFundEvent,
};
use crate::infrastructure::kafka_abstraction::{EventProducer, ProducerError};

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("bad request")]
    BadRequest,
    #[error("failed to publish event: {0}")]
    Publish(#[from] ProducerError),
}

impl CommandError {
    /// True when the caller sent an invalid command (4xx), false for server
    /// side failures (5xx).
    pub fn is_client_error(&self) -> bool {
        matches!(self, CommandError::BadRequest)
    }
}

/// Write side of the account service: validate, build the event, publish.
///
/// A successful return means the event is durable in the log, not that the
/// projection has applied it. An id returned by [`open_account`] may not be
/// queryable yet.
///
/// [`open_account`]: AccountCommandService::open_account
#[derive(Clone)]
pub struct AccountCommandService {
    producer: Arc<dyn EventProducer>,
}

impl AccountCommandService {
    pub fn new(producer: Arc<dyn EventProducer>) -> Self {
        Self { producer }
    }

    pub async fn open_account(&self, command: OpenAccountCommand) -> Result<String, CommandError> {
        check(&command)?;

        let event = OpenAccountEvent {
            id: Uuid::new_v4().to_string(),
            account_holder: command.account_holder,
            account_type: command.account_type,
            opening_balance: command.opening_balance,
        };
        let id = event.id.clone();

        self.publish(event.into()).await?;
        Ok(id)
    }

    pub async fn deposit_fund(&self, command: DepositFundCommand) -> Result<(), CommandError> {
        check(&command)?;

        // Balances are not checked here; the projection applies whatever arrives.
        let event = DepositFundEvent {
            id: command.id,
            amount: command.amount,
        };
        self.publish(event.into()).await
    }

    pub async fn withdraw_fund(&self, command: WithdrawFundCommand) -> Result<(), CommandError> {
        check(&command)?;

        let event = WithdrawFundEvent {
            id: command.id,
            amount: command.amount,
        };
        self.publish(event.into()).await
    }

    pub async fn close_account(&self, command: CloseAccountCommand) -> Result<(), CommandError> {
        check(&command)?;

        let event = CloseAccountEvent { id: command.id };
        self.publish(event.into()).await
    }

    async fn publish(&self, event: AccountEvent) -> Result<(), CommandError> {
        info!(kind = %event.kind(), account_id = event.account_id(), "publishing event");
        self.producer.produce(&event).await.map_err(|e| {
            warn!(kind = %event.kind(), account_id = event.account_id(), error = %e, "publish failed");
            CommandError::from(e)
        })
    }
}

fn check<C: Validate + std::fmt::Debug>(command: &C) -> Result<(), CommandError> {
    command.validate().map_err(|errors| {
        debug!(?command, %errors, "command rejected");
        CommandError::BadRequest
    })
}
