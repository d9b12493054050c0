use thiserror::Error;

use crate::{
    db_types::{BalanceTransaction, Deposit, UserBalance},
    traits::Pagination,
};

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("No balance row exists for user {0}")]
    BalanceNotFound(i64),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::DatabaseError(e.to_string())
    }
}

/// Read access to balances and their histories. These are plain projections over the ledger tables; nothing in here
/// mutates a balance.
#[allow(async_fn_in_trait)]
pub trait BalanceManagement {
    /// Fetch the balance row for the given user, or `None` if the user has never held a balance.
    async fn fetch_balance(&self, user_id: i64) -> Result<Option<UserBalance>, LedgerError>;

    /// Fetch the balance row for the given user, creating a zeroed row first if none exists.
    async fn fetch_or_create_balance(&self, user_id: i64) -> Result<UserBalance, LedgerError>;

    /// The user's deposits, newest first.
    async fn fetch_deposits(&self, user_id: i64, pagination: Pagination) -> Result<Vec<Deposit>, LedgerError>;

    /// Total number of deposits for the user, for pagination.
    async fn count_deposits(&self, user_id: i64) -> Result<i64, LedgerError>;

    /// The user's ledger entries, newest first.
    async fn fetch_transactions(
        &self,
        user_id: i64,
        pagination: Pagination,
    ) -> Result<Vec<BalanceTransaction>, LedgerError>;
}
