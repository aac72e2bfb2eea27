use async_trait::async_trait;
use chrono::Utc;
use dashmap::{mapref::entry::Entry, DashMap};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::domain::{Account, BalanceOverflow};

/// Upper bound on any single store call.
pub const STORE_CALL_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("account {0} already exists")]
    AlreadyExists(String),
    #[error("account {0} not found")]
    NotFound(String),
    #[error(transparent)]
    BalanceOverflow(#[from] BalanceOverflow),
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence for account projections, keyed by account id.
///
/// Implementations serialize writes per id themselves; callers never lock.
/// `adjust_balance` is the atomic read-modify-write used for fund movements.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Fails with [`StoreError::AlreadyExists`] if the id is taken.
    async fn insert(&self, account: Account) -> Result<(), StoreError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Account>, StoreError>;
    async fn find_all(&self) -> Result<Vec<Account>, StoreError>;
    /// Replaces a stored account. Fails with [`StoreError::NotFound`] if absent.
    async fn update(&self, account: Account) -> Result<(), StoreError>;
    /// Adds `delta` to the balance and returns the new state, or `None` if the
    /// account does not exist. A result outside the `Decimal` range fails with
    /// [`StoreError::BalanceOverflow`] and nothing is written.
    async fn adjust_balance(&self, id: &str, delta: Decimal)
        -> Result<Option<Account>, StoreError>;
    /// Removing an absent id is not an error.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryAccountStore {
    accounts: Arc<DashMap<String, Account>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn insert(&self, account: Account) -> Result<(), StoreError> {
        match self.accounts.entry(account.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(account.id)),
            Entry::Vacant(slot) => {
                slot.insert(account);
                Ok(())
            }
        }
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.get(id).map(|entry| entry.value().clone()))
    }

    async fn find_all(&self) -> Result<Vec<Account>, StoreError> {
        let mut accounts: Vec<Account> = self
            .accounts
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        accounts.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(accounts)
    }

    async fn update(&self, account: Account) -> Result<(), StoreError> {
        match self.accounts.get_mut(&account.id) {
            Some(mut stored) => {
                *stored = account;
                Ok(())
            }
            None => Err(StoreError::NotFound(account.id)),
        }
    }

    async fn adjust_balance(
        &self,
        id: &str,
        delta: Decimal,
    ) -> Result<Option<Account>, StoreError> {
        // get_mut holds the shard write lock for the whole read-modify-write.
        let Some(mut stored) = self.accounts.get_mut(id) else {
            return Ok(None);
        };
        stored.apply_delta(delta)?;
        Ok(Some(stored.value().clone()))
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.accounts.remove(id);
        Ok(())
    }
}

#[derive(Clone)]
pub struct PostgresAccountStore {
    pool: PgPool,
}

const ACCOUNT_COLUMNS: &str = "id, account_holder, account_type, balance, created_at, updated_at";

impl PostgresAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(STORE_CALL_TIMEOUT)
            .connect(database_url)
            .await?;
        info!(
            "PostgresAccountStore: connected (max_connections={})",
            max_connections
        );
        Ok(Self::new(pool))
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        bounded(
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS accounts (
                    id TEXT PRIMARY KEY,
                    account_holder TEXT NOT NULL,
                    account_type INTEGER NOT NULL,
                    balance NUMERIC NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
                "#,
            )
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }
}

async fn bounded<T, F>(call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(STORE_CALL_TIMEOUT, call).await {
        Ok(result) => result.map_err(StoreError::from),
        Err(_) => Err(StoreError::Timeout(STORE_CALL_TIMEOUT)),
    }
}

fn account_from_row(row: &PgRow) -> Result<Account, sqlx::Error> {
    Ok(Account {
        id: row.try_get("id")?,
        account_holder: row.try_get("account_holder")?,
        account_type: row.try_get("account_type")?,
        balance: row.try_get("balance")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl AccountStore for PostgresAccountStore {
    async fn insert(&self, account: Account) -> Result<(), StoreError> {
        let result = bounded(
            sqlx::query(
                "INSERT INTO accounts (id, account_holder, account_type, balance, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (id) DO NOTHING",
            )
            .bind(&account.id)
            .bind(&account.account_holder)
            .bind(account.account_type)
            .bind(account.balance)
            .bind(account.created_at)
            .bind(account.updated_at)
            .execute(&self.pool),
        )
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists(account.id));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Account>, StoreError> {
        let sql = format!("SELECT {} FROM accounts WHERE id = $1", ACCOUNT_COLUMNS);
        let row = bounded(sqlx::query(&sql).bind(id).fetch_optional(&self.pool)).await?;
        Ok(row.as_ref().map(account_from_row).transpose()?)
    }

    async fn find_all(&self) -> Result<Vec<Account>, StoreError> {
        let sql = format!("SELECT {} FROM accounts ORDER BY id", ACCOUNT_COLUMNS);
        let rows = bounded(sqlx::query(&sql).fetch_all(&self.pool)).await?;
        Ok(rows
            .iter()
            .map(account_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn update(&self, account: Account) -> Result<(), StoreError> {
        let result = bounded(
            sqlx::query(
                "UPDATE accounts SET account_holder = $2, account_type = $3, balance = $4, updated_at = $5 \
                 WHERE id = $1",
            )
            .bind(&account.id)
            .bind(&account.account_holder)
            .bind(account.account_type)
            .bind(account.balance)
            .bind(Utc::now())
            .execute(&self.pool),
        )
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(account.id));
        }
        Ok(())
    }

    async fn adjust_balance(
        &self,
        id: &str,
        delta: Decimal,
    ) -> Result<Option<Account>, StoreError> {
        // NUMERIC is wider than Decimal; a balance outside its range could be
        // written but never read back.
        let sql = format!(
            "UPDATE accounts SET balance = balance + $2, updated_at = NOW() \
             WHERE id = $1 AND balance + $2 BETWEEN $3 AND $4 RETURNING {}",
            ACCOUNT_COLUMNS
        );
        let row = bounded(
            sqlx::query(&sql)
                .bind(id)
                .bind(delta)
                .bind(Decimal::MIN)
                .bind(Decimal::MAX)
                .fetch_optional(&self.pool),
        )
        .await?;

        if let Some(row) = row {
            return Ok(Some(account_from_row(&row)?));
        }

        let exists = bounded(
            sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM accounts WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool),
        )
        .await?;
        if exists {
            return Err(StoreError::BalanceOverflow(BalanceOverflow {
                account_id: id.to_string(),
                delta,
            }));
        }
        Ok(None)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        bounded(
            sqlx::query("DELETE FROM accounts WHERE id = $1")
                .bind(id)
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OpenAccountEvent;
    use rust_decimal_macros::dec;

    fn account(id: &str, balance: Decimal) -> Account {
        Account::open(&OpenAccountEvent {
            id: id.to_string(),
            account_holder: "alice".to_string(),
            account_type: 1,
            opening_balance: balance,
        })
    }

    #[tokio::test]
    async fn insert_rejects_existing_id() {
        let store = InMemoryAccountStore::new();
        store.insert(account("a1", dec!(10))).await.unwrap();

        let err = store.insert(account("a1", dec!(99))).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(id) if id == "a1"));

        let stored = store.find_by_id("a1").await.unwrap().unwrap();
        assert_eq!(stored.balance, dec!(10));
    }

    #[tokio::test]
    async fn update_requires_existing_account() {
        let store = InMemoryAccountStore::new();
        let err = store.update(account("nope", dec!(1))).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));

        store.insert(account("a1", dec!(1))).await.unwrap();
        let mut changed = account("a1", dec!(1));
        changed.account_holder = "bob".to_string();
        store.update(changed).await.unwrap();
        assert_eq!(
            store.find_by_id("a1").await.unwrap().unwrap().account_holder,
            "bob"
        );
    }

    #[tokio::test]
    async fn adjust_balance_on_missing_account_is_none() {
        let store = InMemoryAccountStore::new();
        assert!(store
            .adjust_balance("ghost", dec!(5))
            .await
            .unwrap()
            .is_none());
        assert!(store.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn adjust_balance_rejects_overflow_without_writing() {
        let store = InMemoryAccountStore::new();
        store.insert(account("a1", Decimal::MAX)).await.unwrap();

        let err = store.adjust_balance("a1", dec!(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::BalanceOverflow(ref o) if o.account_id == "a1"));
        assert_eq!(
            store.find_by_id("a1").await.unwrap().unwrap().balance,
            Decimal::MAX
        );
    }

    #[tokio::test]
    async fn delete_is_silent_for_missing_ids() {
        let store = InMemoryAccountStore::new();
        store.insert(account("a1", dec!(1))).await.unwrap();
        store.delete("a1").await.unwrap();
        store.delete("a1").await.unwrap();
        assert!(store.find_by_id("a1").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adjustments_are_not_lost() {
        let store = InMemoryAccountStore::new();
        store.insert(account("a1", dec!(0))).await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..100 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store.adjust_balance("a1", dec!(0.01)).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let stored = store.find_by_id("a1").await.unwrap().unwrap();
        assert_eq!(stored.balance, dec!(1.00));
    }

    #[tokio::test]
    async fn find_all_is_ordered_by_id() {
        let store = InMemoryAccountStore::new();
        for id in ["c", "a", "b"] {
            store.insert(account(id, dec!(1))).await.unwrap();
        }
        let ids: Vec<String> = store
            .find_all()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }
}
