use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::events::OpenAccountEvent;

/// Read-side account record. Only the projection mutates it, and only in
/// response to events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: String,
    pub account_holder: String,
    pub account_type: i32,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn open(event: &OpenAccountEvent) -> Self {
        let now = Utc::now();
        Account {
            id: event.id.clone(),
            account_holder: event.account_holder.clone(),
            account_type: event.account_type,
            balance: event.opening_balance,
            created_at: now,
            updated_at: now,
        }
    }

    /// Adds `delta` to the balance. On overflow the account is left untouched.
    pub fn apply_delta(&mut self, delta: Decimal) -> Result<(), BalanceOverflow> {
        self.balance = self
            .balance
            .checked_add(delta)
            .ok_or_else(|| BalanceOverflow {
                account_id: self.id.clone(),
                delta,
            })?;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("balance of account {account_id} overflows when adjusted by {delta}")]
pub struct BalanceOverflow {
    pub account_id: String,
    pub delta: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn account(balance: Decimal) -> Account {
        Account::open(&OpenAccountEvent {
            id: "a1".to_string(),
            account_holder: "alice".to_string(),
            account_type: 1,
            opening_balance: balance,
        })
    }

    #[test]
    fn apply_delta_moves_the_balance() {
        let mut account = account(dec!(10.50));
        account.apply_delta(dec!(-0.75)).unwrap();
        assert_eq!(account.balance, dec!(9.75));
    }

    #[test]
    fn overflowing_delta_leaves_account_unchanged() {
        let mut account = account(Decimal::MAX);
        let before = account.clone();

        let err = account.apply_delta(dec!(1)).unwrap_err();

        assert_eq!(err.account_id, "a1");
        assert_eq!(account, before);
        account.apply_delta(dec!(-1)).unwrap();
        assert_eq!(account.balance, Decimal::MAX - dec!(1));
    }
}
