use thiserror::Error;

use crate::{
    db_types::{BalanceTransaction, Deposit, NewDeposit, PriceQuote, WebhookEventRecord},
    traits::{BalanceManagement, LedgerError},
};

/// This trait defines the highest level of behaviour for backends supporting the settlement pipeline.
///
/// This behaviour includes:
/// * Tracking deposits through their confirmation lifecycle.
/// * The durable webhook event log (written before any side effect is attempted).
/// * The ledger credit: the only operation anywhere that mutates a user's balance.
#[allow(async_fn_in_trait)]
pub trait DepositGatewayDatabase: Clone + BalanceManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Create or advance the deposit for the given transaction id, in a single atomic transaction.
    ///
    /// If no deposit exists for `deposit.txid`, one is created with status `Pending` and the incoming confirmation
    /// count. If one exists, its confirmation count is clamped to `MAX(stored, incoming)` -- a late, out-of-order
    /// delivery must never regress progress -- and a `Pending` deposit moves to `Confirming`. A deposit that is
    /// already `Confirmed` or `Credited` keeps its status.
    ///
    /// Returns the resulting deposit record and `true` if it was newly created.
    async fn upsert_deposit(&self, deposit: NewDeposit) -> Result<(Deposit, bool), DepositGatewayError>;

    /// Fetch the deposit with the given transaction id.
    async fn fetch_deposit_by_txid(&self, txid: &str) -> Result<Option<Deposit>, DepositGatewayError>;

    /// Fetch the deposit for the given invoice id, provided it has not been credited yet.
    ///
    /// Returning `None` here (never seen, or already credited) is the primary defence against duplicate settlement
    /// webhooks: callers treat it as an idempotent no-op.
    async fn fetch_settleable_deposit(&self, invoice_id: &str) -> Result<Option<Deposit>, DepositGatewayError>;

    /// Persist the fiat conversion for a settling deposit: both fiat amounts, the rate snapshot taken from `quote`,
    /// status `Confirmed` and the confirmation timestamp.
    async fn mark_deposit_confirmed(
        &self,
        deposit_id: i64,
        quote: &PriceQuote,
    ) -> Result<Deposit, DepositGatewayError>;

    /// Credit the deposit's fiat amounts to its owner's balance, exactly once.
    ///
    /// The entire operation runs inside a single database write transaction (the scoped lock over the user's
    /// balance row):
    /// 1. the deposit's status is re-read *inside* the transaction; if it is already `Credited` the transaction is
    ///    abandoned and `None` is returned,
    /// 2. the balance row is created if needed and read as the before-snapshot,
    /// 3. the fiat balances and cumulative deposited totals are updated additively,
    /// 4. a ledger row is appended with before/after snapshots,
    /// 5. the deposit is marked `Credited`.
    ///
    /// The re-check in step 1 is what makes concurrent or duplicated settlement calls safe; the surrounding
    /// transaction is what prevents lost updates. Both are required together.
    ///
    /// Returns the new ledger row, or `None` if the deposit had already been credited.
    async fn credit_deposit(&self, deposit_id: i64) -> Result<Option<BalanceTransaction>, DepositGatewayError>;

    /// Append a row to the webhook event log, returning its id. Called before the event is acted on, so that a
    /// crashed handler still leaves a trace.
    async fn log_webhook_event(
        &self,
        event_type: &str,
        invoice_id: Option<&str>,
        store_id: Option<&str>,
        payload: &str,
    ) -> Result<i64, DepositGatewayError>;

    /// Mark a webhook event as processed, recording the handler error, if any. Called exactly once per event.
    async fn mark_webhook_event_processed(
        &self,
        event_id: i64,
        error: Option<&str>,
    ) -> Result<(), DepositGatewayError>;

    /// Fetch a webhook event log row by id.
    async fn fetch_webhook_event(&self, event_id: i64) -> Result<Option<WebhookEventRecord>, DepositGatewayError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), DepositGatewayError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum DepositGatewayError {
    #[error("We have an internal database engine error (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("The requested deposit (internal id {0}) does not exist")]
    DepositIdNotFound(i64),
    #[error("The requested deposit does not exist for txid {0}")]
    DepositNotFound(String),
    #[error("{0}")]
    LedgerError(#[from] LedgerError),
    #[error("The requested webhook event {0} does not exist")]
    WebhookEventNotFound(i64),
    #[error("Monetary conversion failed. {0}")]
    ConversionError(String),
}

impl From<sqlx::Error> for DepositGatewayError {
    fn from(e: sqlx::Error) -> Self {
        DepositGatewayError::DatabaseError(e.to_string())
    }
}
