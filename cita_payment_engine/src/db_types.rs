use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use cpg_common::{FiatAmount, FiatConversionError, Sats};
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid conversion: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------    DepositStatus    ---------------------------------------------------------
/// The lifecycle of an on-chain deposit. Transitions are strictly monotonic:
/// `Pending → Confirming → Confirmed → Credited`. The derived ordering matches the lifecycle order and is relied on
/// to prevent regressions from late webhook deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Type, Serialize, Deserialize)]
pub enum DepositStatus {
    /// The payment has been seen (possibly with 0 confirmations), but no confirmation progress has been reported.
    Pending,
    /// Confirmations have been observed, but the processor has not settled the invoice yet.
    Confirming,
    /// The settlement threshold was reached and fiat amounts have been computed and stored.
    Confirmed,
    /// Terminal. The user's balance has been credited for this deposit.
    Credited,
}

impl Display for DepositStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DepositStatus::Pending => write!(f, "Pending"),
            DepositStatus::Confirming => write!(f, "Confirming"),
            DepositStatus::Confirmed => write!(f, "Confirmed"),
            DepositStatus::Credited => write!(f, "Credited"),
        }
    }
}

impl FromStr for DepositStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Confirming" => Ok(Self::Confirming),
            "Confirmed" => Ok(Self::Confirmed),
            "Credited" => Ok(Self::Credited),
            s => Err(ConversionError(format!("Invalid deposit status: {s}"))),
        }
    }
}

impl From<String> for DepositStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid deposit status: {value}. But this conversion cannot fail. Defaulting to Pending");
            DepositStatus::Pending
        })
    }
}

//--------------------------------------       Deposit       ---------------------------------------------------------
/// A single on-chain payment, tracked from first sighting through crediting. The fiat columns are null until the
/// deposit settles; the rate columns snapshot the exchange rate that was used for the conversion.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Deposit {
    pub id: i64,
    /// The transaction id as reported by the payment processor. Unique per deposit.
    pub txid: String,
    pub user_id: i64,
    /// The destination address the payment was made to, if the processor reported one.
    pub address: Option<String>,
    pub amount_sats: Sats,
    pub amount_usd: Option<FiatAmount>,
    pub amount_mxn: Option<FiatAmount>,
    /// Exchange rate snapshot (cents per BTC) used to compute `amount_usd`.
    pub rate_usd: Option<FiatAmount>,
    pub rate_mxn: Option<FiatAmount>,
    pub confirmations: i64,
    pub status: DepositStatus,
    /// The processor's invoice id. Correlates the webhook events belonging to this payment.
    pub invoice_id: String,
    pub detected_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub credited_at: Option<DateTime<Utc>>,
}

//--------------------------------------      NewDeposit     ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewDeposit {
    pub txid: String,
    pub user_id: i64,
    pub address: Option<String>,
    pub amount_sats: Sats,
    pub confirmations: i64,
    pub invoice_id: String,
}

impl NewDeposit {
    pub fn new(txid: String, user_id: i64, amount_sats: Sats, invoice_id: String) -> Self {
        Self { txid, user_id, address: None, amount_sats, confirmations: 0, invoice_id }
    }

    pub fn with_address(mut self, address: String) -> Self {
        self.address = Some(address);
        self
    }

    pub fn with_confirmations(mut self, confirmations: i64) -> Self {
        self.confirmations = confirmations;
        self
    }
}

//--------------------------------------     UserBalance     ---------------------------------------------------------
/// One row per user. Only ever mutated by the ledger credit path, each mutation paired with exactly one
/// [`BalanceTransaction`] row whose delta matches the balance change.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserBalance {
    pub user_id: i64,
    pub balance_usd: FiatAmount,
    pub balance_mxn: FiatAmount,
    pub total_deposited_sats: Sats,
    pub total_deposited_usd: FiatAmount,
    pub total_deposited_mxn: FiatAmount,
    pub total_withdrawn_usd: FiatAmount,
    pub total_withdrawn_mxn: FiatAmount,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------   TransactionType   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Payment,
    Refund,
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::Deposit => write!(f, "Deposit"),
            TransactionType::Withdrawal => write!(f, "Withdrawal"),
            TransactionType::Payment => write!(f, "Payment"),
            TransactionType::Refund => write!(f, "Refund"),
        }
    }
}

impl FromStr for TransactionType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Deposit" => Ok(Self::Deposit),
            "Withdrawal" => Ok(Self::Withdrawal),
            "Payment" => Ok(Self::Payment),
            "Refund" => Ok(Self::Refund),
            s => Err(ConversionError(format!("Invalid transaction type: {s}"))),
        }
    }
}

//------------------------------------   BalanceTransaction   --------------------------------------------------------
/// An immutable ledger entry. Rows are append-only; the before/after snapshots make the ledger auditable without
/// replaying it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BalanceTransaction {
    pub id: i64,
    pub user_id: i64,
    pub txn_type: TransactionType,
    pub amount_usd: FiatAmount,
    pub amount_mxn: FiatAmount,
    pub currency: String,
    /// The deposit that caused this entry, when `txn_type` is `Deposit`.
    pub deposit_id: Option<i64>,
    pub balance_before_usd: FiatAmount,
    pub balance_after_usd: FiatAmount,
    pub balance_before_mxn: FiatAmount,
    pub balance_after_mxn: FiatAmount,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------      PriceQuote     ---------------------------------------------------------
/// A cached exchange rate sample. Rates are fiat cents per whole BTC. Quotes are never updated or deleted; the
/// newest row wins and the full history doubles as the fallback cache.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PriceQuote {
    pub id: i64,
    pub rate_usd: FiatAmount,
    pub rate_mxn: FiatAmount,
    pub source: String,
    pub fetched_at: DateTime<Utc>,
}

impl PriceQuote {
    /// Convert an on-chain amount into both fiat currencies at this quote's rates.
    pub fn convert(&self, amount: Sats) -> Result<(FiatAmount, FiatAmount), FiatConversionError> {
        let usd = self.rate_usd.convert_from_btc(amount)?;
        let mxn = self.rate_mxn.convert_from_btc(amount)?;
        Ok((usd, mxn))
    }
}

impl Display for PriceQuote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "1 BTC => {} USD / {} MXN (as of {})", self.rate_usd, self.rate_mxn, self.fetched_at)
    }
}

#[derive(Debug, Clone)]
pub struct NewPriceQuote {
    pub rate_usd: FiatAmount,
    pub rate_mxn: FiatAmount,
    pub source: String,
}

//------------------------------------   WebhookEventRecord   --------------------------------------------------------
/// The durable log row written for every inbound webhook before any side effect is attempted. `processed` is set
/// exactly once, after the dispatched handler has run; `error` holds the handler failure, if any, for operational
/// monitoring.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WebhookEventRecord {
    pub id: i64,
    pub event_type: String,
    pub invoice_id: Option<String>,
    pub store_id: Option<String>,
    pub payload: String,
    pub processed: bool,
    pub error: Option<String>,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}
