//! `SqliteDatabase` is a concrete implementation of a settlement pipeline backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module. Multi-statement units of work run inside a single `sqlx` transaction started from the pool; the crediting
//! transaction doubles as the per-user balance lock, since SQLite serialises write transactions.
use std::fmt::Debug;

use log::*;
use sqlx::{Sqlite, SqlitePool, Transaction};

use super::db::{balances, db_url, deposits, new_pool, price_quotes, transactions, webhook_events};
use crate::{
    db_types::{
        BalanceTransaction,
        Deposit,
        DepositStatus,
        NewDeposit,
        NewPriceQuote,
        PriceQuote,
        UserBalance,
        WebhookEventRecord,
    },
    traits::{
        BalanceManagement,
        DepositGatewayDatabase,
        DepositGatewayError,
        LedgerError,
        Pagination,
        PriceOracleError,
        PriceStorage,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database api object with a connection pool of `max_connections` capacity, using the URL from
    /// the `CPG_DATABASE_URL` environment variable.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Bring the schema up to date. Called once at server startup and by the test harness.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }
}

impl BalanceManagement for SqliteDatabase {
    async fn fetch_balance(&self, user_id: i64) -> Result<Option<UserBalance>, LedgerError> {
        let mut conn = self.pool.acquire().await.map_err(|e| LedgerError::DatabaseError(e.to_string()))?;
        balances::fetch(user_id, &mut conn).await
    }

    async fn fetch_or_create_balance(&self, user_id: i64) -> Result<UserBalance, LedgerError> {
        let mut conn = self.pool.acquire().await.map_err(|e| LedgerError::DatabaseError(e.to_string()))?;
        balances::fetch_or_create(user_id, &mut conn).await
    }

    async fn fetch_deposits(&self, user_id: i64, pagination: Pagination) -> Result<Vec<Deposit>, LedgerError> {
        let mut conn = self.pool.acquire().await.map_err(|e| LedgerError::DatabaseError(e.to_string()))?;
        deposits::fetch_for_user(user_id, pagination.limit(), pagination.offset(), &mut conn)
            .await
            .map_err(|e| LedgerError::DatabaseError(e.to_string()))
    }

    async fn count_deposits(&self, user_id: i64) -> Result<i64, LedgerError> {
        let mut conn = self.pool.acquire().await.map_err(|e| LedgerError::DatabaseError(e.to_string()))?;
        deposits::count_for_user(user_id, &mut conn).await.map_err(|e| LedgerError::DatabaseError(e.to_string()))
    }

    async fn fetch_transactions(
        &self,
        user_id: i64,
        pagination: Pagination,
    ) -> Result<Vec<BalanceTransaction>, LedgerError> {
        let mut conn = self.pool.acquire().await.map_err(|e| LedgerError::DatabaseError(e.to_string()))?;
        transactions::fetch_for_user(user_id, pagination.limit(), pagination.offset(), &mut conn).await
    }
}

impl PriceStorage for SqliteDatabase {
    async fn fetch_latest_quote(&self) -> Result<Option<PriceQuote>, PriceOracleError> {
        let mut conn = self.pool.acquire().await?;
        price_quotes::fetch_latest(&mut conn).await
    }

    async fn insert_price_quote(&self, quote: &NewPriceQuote) -> Result<PriceQuote, PriceOracleError> {
        // The explicit commit makes the quote visible to the other pool connections immediately.
        let mut tx = self.pool.begin().await?;
        let quote = price_quotes::insert(quote, &mut tx).await?;
        tx.commit().await?;
        Ok(quote)
    }
}

impl DepositGatewayDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn upsert_deposit(&self, deposit: NewDeposit) -> Result<(Deposit, bool), DepositGatewayError> {
        let mut tx = self.pool.begin().await?;
        let txid = deposit.txid.clone();
        let confirmations = deposit.confirmations;
        // The insert is the first statement of the transaction, so the write lock is taken up front and a racing
        // delivery for the same txid waits here rather than deadlocking on a read-to-write upgrade.
        let result = match deposits::try_insert(deposit, &mut tx).await? {
            Some(created) => (created, true),
            None => {
                let updated = deposits::advance_confirmations(&txid, confirmations, &mut tx).await?;
                debug!(
                    "🗃️ Deposit {txid} advanced to {} confirmations, status {}",
                    updated.confirmations, updated.status
                );
                (updated, false)
            },
        };
        tx.commit().await?;
        Ok(result)
    }

    async fn fetch_deposit_by_txid(&self, txid: &str) -> Result<Option<Deposit>, DepositGatewayError> {
        let mut conn = self.pool.acquire().await?;
        deposits::fetch_by_txid(txid, &mut conn).await
    }

    async fn fetch_settleable_deposit(&self, invoice_id: &str) -> Result<Option<Deposit>, DepositGatewayError> {
        let mut conn = self.pool.acquire().await?;
        deposits::fetch_settleable_by_invoice(invoice_id, &mut conn).await
    }

    async fn mark_deposit_confirmed(
        &self,
        deposit_id: i64,
        quote: &PriceQuote,
    ) -> Result<Deposit, DepositGatewayError> {
        // The amount is immutable after creation, so it can be read outside the write transaction. The update
        // itself then opens the transaction with a write, which keeps racing settlements deadlock-free.
        let mut conn = self.pool.acquire().await?;
        let deposit = deposits::fetch_by_id(deposit_id, &mut conn)
            .await?
            .ok_or(DepositGatewayError::DepositIdNotFound(deposit_id))?;
        drop(conn);
        let (amount_usd, amount_mxn) =
            quote.convert(deposit.amount_sats).map_err(|e| DepositGatewayError::ConversionError(e.to_string()))?;
        let mut tx = self.pool.begin().await?;
        let deposit = deposits::mark_confirmed(deposit_id, quote, amount_usd, amount_mxn, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "🗃️ Deposit {} confirmed: {} = {} USD / {} MXN at quote #{}",
            deposit.txid,
            deposit.amount_sats,
            amount_usd,
            amount_mxn,
            quote.id
        );
        Ok(deposit)
    }

    async fn credit_deposit(&self, deposit_id: i64) -> Result<Option<BalanceTransaction>, DepositGatewayError> {
        let mut tx: Transaction<'_, Sqlite> = self.pool.begin().await?;
        // Claiming the deposit is the first write in the transaction. It takes SQLite's write lock and re-checks
        // the status in a single step, so a concurrent duplicate either waits here or sees zero rows and bails.
        // If anything after this point fails, the transaction rolls back and the claim is undone.
        let claimed: Option<Deposit> = sqlx::query_as(
            r#"
                UPDATE btc_deposits SET status = 'Credited', credited_at = CURRENT_TIMESTAMP
                WHERE id = $1 AND status != 'Credited'
                RETURNING *;
            "#,
        )
        .bind(deposit_id)
        .fetch_optional(&mut *tx)
        .await?;
        let deposit = match claimed {
            Some(d) => d,
            None => {
                return match deposits::fetch_by_id(deposit_id, &mut tx).await? {
                    Some(d) => {
                        debug!("🗃️ Deposit {} was already credited at {:?}. Nothing to do.", d.txid, d.credited_at);
                        Ok(None)
                    },
                    None => Err(DepositGatewayError::DepositIdNotFound(deposit_id)),
                };
            },
        };
        debug_assert_eq!(deposit.status, DepositStatus::Credited);
        let (amount_usd, amount_mxn) = match (deposit.amount_usd, deposit.amount_mxn) {
            (Some(usd), Some(mxn)) => (usd, mxn),
            _ => {
                return Err(DepositGatewayError::ConversionError(format!(
                    "Deposit {} has no fiat amounts. It must be settled before it can be credited.",
                    deposit.txid
                )));
            },
        };
        let user_id = deposit.user_id;
        let before = balances::fetch_or_create(user_id, &mut tx).await?;
        let after = balances::apply_deposit_credit(user_id, amount_usd, amount_mxn, deposit.amount_sats, &mut tx).await?;
        let txn = transactions::insert_deposit_credit(
            user_id,
            deposit_id,
            amount_usd,
            amount_mxn,
            deposit.amount_sats,
            &before,
            &after,
            &mut tx,
        )
        .await?;
        tx.commit().await?;
        debug!(
            "🗃️💳️ Credited {} USD / {} MXN to user #{user_id} for deposit {} (ledger entry #{})",
            amount_usd, amount_mxn, deposit.txid, txn.id
        );
        Ok(Some(txn))
    }

    async fn log_webhook_event(
        &self,
        event_type: &str,
        invoice_id: Option<&str>,
        store_id: Option<&str>,
        payload: &str,
    ) -> Result<i64, DepositGatewayError> {
        // The log row must be durable before the event is acted on, hence the explicit commit.
        let mut tx = self.pool.begin().await?;
        let event_id = webhook_events::insert(event_type, invoice_id, store_id, payload, &mut tx).await?;
        tx.commit().await?;
        Ok(event_id)
    }

    async fn mark_webhook_event_processed(
        &self,
        event_id: i64,
        error: Option<&str>,
    ) -> Result<(), DepositGatewayError> {
        let mut tx = self.pool.begin().await?;
        webhook_events::mark_processed(event_id, error, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn fetch_webhook_event(&self, event_id: i64) -> Result<Option<WebhookEventRecord>, DepositGatewayError> {
        let mut conn = self.pool.acquire().await?;
        webhook_events::fetch_by_id(event_id, &mut conn).await
    }
}
