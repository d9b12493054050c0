//! Drives deposits through their lifecycle in response to processor webhooks.
//!
//! All idempotency lives in the database layer. This API only decides *which* database operations an event calls
//! for; replaying any event, in any order, any number of times, converges on the same final state.

use std::fmt::Debug;

use log::*;

use crate::{
    cpe_api::{errors::SettlementError, PriceOracle},
    db_types::{BalanceTransaction, Deposit, DepositStatus, NewDeposit},
    traits::{DepositGatewayDatabase, PriceFeed, PriceStorage},
    webhook::InvoiceEvent,
};

pub struct SettlementApi<B> {
    db: B,
}

impl<B: Debug> Debug for SettlementApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementApi ({:?})", self.db)
    }
}

impl<B> SettlementApi<B>
where B: DepositGatewayDatabase
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Record or advance the deposit described by a payment-update event.
    ///
    /// A first sighting creates a `Pending` deposit; repeat sightings clamp the confirmation count upwards and move
    /// `Pending` deposits to `Confirming`. Stale and duplicated deliveries are absorbed by the clamp.
    pub async fn update_deposit(&self, event: &InvoiceEvent) -> Result<(Deposit, bool), SettlementError> {
        let invoice_id = event.invoice_id.clone().ok_or(SettlementError::MissingInvoiceId)?;
        let payment = event
            .payment
            .as_ref()
            .ok_or_else(|| SettlementError::MissingPaymentDetails(invoice_id.clone()))?;
        let txid = payment
            .id
            .clone()
            .ok_or_else(|| SettlementError::MissingPaymentDetails(invoice_id.clone()))?;
        let amount =
            payment.value.ok_or_else(|| SettlementError::MissingPaymentDetails(invoice_id.clone()))?;
        let user_id = event.user_id().ok_or_else(|| SettlementError::MissingUserId(invoice_id.clone()))?;
        let mut deposit =
            NewDeposit::new(txid, user_id, amount, invoice_id).with_confirmations(payment.confirmations);
        if let Some(address) = payment.destination.clone() {
            deposit = deposit.with_address(address);
        }
        let (deposit, created) = self.db.upsert_deposit(deposit).await?;
        if created {
            info!("📬️ New deposit {} of {} for user #{} on invoice {}", deposit.txid, deposit.amount_sats, deposit.user_id, deposit.invoice_id);
        } else {
            debug!("📬️ Deposit {} advanced to {} confirmations ({})", deposit.txid, deposit.confirmations, deposit.status);
        }
        Ok((deposit, created))
    }

    /// Append a row to the webhook event log, returning its id. Call this before acting on a delivery so that a
    /// crashed handler still leaves a trace.
    pub async fn log_webhook_event(
        &self,
        event_type: &str,
        invoice_id: Option<&str>,
        store_id: Option<&str>,
        payload: &str,
    ) -> Result<i64, SettlementError> {
        let id = self.db.log_webhook_event(event_type, invoice_id, store_id, payload).await?;
        Ok(id)
    }

    /// Mark a logged webhook event as processed, recording the handler error, if any.
    pub async fn mark_webhook_event_processed(
        &self,
        event_id: i64,
        error: Option<&str>,
    ) -> Result<(), SettlementError> {
        self.db.mark_webhook_event_processed(event_id, error).await?;
        Ok(())
    }

    /// Settle the invoice named by the event: convert the deposit to fiat at the current rate, and credit the
    /// owner's balance exactly once.
    ///
    /// Returns the new ledger entry, or `None` when there was nothing to do (no deposit for the invoice, or it was
    /// already credited). A deposit left in `Confirmed` by an earlier partial run keeps its original conversion and
    /// goes straight to crediting.
    pub async fn settle_invoice<P, F>(
        &self,
        event: &InvoiceEvent,
        oracle: &PriceOracle<P, F>,
    ) -> Result<Option<BalanceTransaction>, SettlementError>
    where
        P: PriceStorage,
        F: PriceFeed,
    {
        let invoice_id = event.invoice_id.as_deref().ok_or(SettlementError::MissingInvoiceId)?;
        let Some(deposit) = self.db.fetch_settleable_deposit(invoice_id).await? else {
            debug!("📬️ No uncredited deposit for invoice {invoice_id}. Treating the event as a duplicate.");
            return Ok(None);
        };
        let deposit = if deposit.status < DepositStatus::Confirmed {
            let quote = oracle.current_quote().await?;
            let confirmed = self.db.mark_deposit_confirmed(deposit.id, &quote).await?;
            info!(
                "📬️ Deposit {} confirmed at {} USD / {} MXN per BTC",
                confirmed.txid, quote.rate_usd, quote.rate_mxn
            );
            confirmed
        } else {
            debug!("📬️ Deposit {} is already confirmed. Retrying the credit with its stored conversion.", deposit.txid);
            deposit
        };
        let txn = self.db.credit_deposit(deposit.id).await?;
        match &txn {
            Some(t) => info!(
                "📬️💳️ Credited {} USD / {} MXN to user #{} for invoice {invoice_id}",
                t.amount_usd, t.amount_mxn, t.user_id
            ),
            None => debug!("📬️ Deposit {} was credited by a concurrent delivery. Nothing to do.", deposit.txid),
        }
        Ok(txn)
    }
}
