use std::fmt::Debug;

use crate::{
    db_types::{BalanceTransaction, Deposit, UserBalance},
    traits::{BalanceManagement, LedgerError, Pagination},
};

/// Read-only access to balances, deposits and the ledger. Crediting happens in the settlement flow; nothing here
/// can mutate a balance.
pub struct BalanceApi<B> {
    db: B,
}

impl<B: Debug> Debug for BalanceApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BalanceApi ({:?})", self.db)
    }
}

impl<B> BalanceApi<B>
where B: BalanceManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// The balance row for the user, or `None` if the user has never held a balance.
    pub async fn balance(&self, user_id: i64) -> Result<Option<UserBalance>, LedgerError> {
        self.db.fetch_balance(user_id).await
    }

    /// The balance row for the user. A user who has never held a balance gets a zeroed row created on first read.
    pub async fn balance_or_default(&self, user_id: i64) -> Result<UserBalance, LedgerError> {
        self.db.fetch_or_create_balance(user_id).await
    }

    /// The user's deposits, newest first, along with the total deposit count for pagination.
    pub async fn deposit_history(
        &self,
        user_id: i64,
        pagination: Pagination,
    ) -> Result<(Vec<Deposit>, i64), LedgerError> {
        let deposits = self.db.fetch_deposits(user_id, pagination).await?;
        let total = self.db.count_deposits(user_id).await?;
        Ok((deposits, total))
    }

    /// The user's ledger entries, newest first.
    pub async fn transaction_history(
        &self,
        user_id: i64,
        pagination: Pagination,
    ) -> Result<Vec<BalanceTransaction>, LedgerError> {
        self.db.fetch_transactions(user_id, pagination).await
    }
}
