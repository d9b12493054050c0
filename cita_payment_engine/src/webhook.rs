//! Typed representations of the payment processor's webhook payloads.
//!
//! The processor pushes BTCPay-style invoice events. Deliveries are at-least-once and may arrive duplicated, out of
//! order, or concurrently, so nothing in here is trusted to be novel; the settlement flow derives all idempotency
//! from the database, not from the payload.

use cpg_common::Sats;
use serde::{Deserialize, Serialize};
use serde_json::Value;

//------------------------------------   WebhookEventKind   ----------------------------------------------------------
/// The closed set of event kinds this gateway reacts to. Anything else the processor sends deserializes as
/// [`WebhookEventKind::Unknown`] and is logged but otherwise ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookEventKind {
    /// A payment was seen for the invoice (possibly still in the mempool).
    InvoiceReceivedPayment,
    /// The invoice is processing; confirmations are accumulating.
    InvoiceProcessing,
    /// The invoice settled: the confirmation threshold was reached.
    InvoiceSettled,
    /// A specific payment on the invoice settled. Treated identically to `InvoiceSettled`.
    InvoicePaymentSettled,
    #[serde(other)]
    Unknown,
}

impl WebhookEventKind {
    /// Events that create or advance a deposit record without settling it.
    pub fn is_payment_update(&self) -> bool {
        matches!(self, Self::InvoiceReceivedPayment | Self::InvoiceProcessing)
    }

    /// Events that trigger settlement and crediting.
    pub fn is_settlement(&self) -> bool {
        matches!(self, Self::InvoiceSettled | Self::InvoicePaymentSettled)
    }
}

//--------------------------------------    InvoiceEvent    ----------------------------------------------------------
/// The inbound webhook body. Only the fields the settlement pipeline needs are modelled; the raw payload is kept
/// verbatim in the webhook event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceEvent {
    #[serde(rename = "type")]
    pub kind: WebhookEventKind,
    #[serde(default)]
    pub invoice_id: Option<String>,
    #[serde(default)]
    pub store_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<EventMetadata>,
    #[serde(default)]
    pub payment: Option<PaymentDetails>,
}

impl InvoiceEvent {
    pub fn user_id(&self) -> Option<i64> {
        self.metadata.as_ref().and_then(|m| m.user_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    #[serde(default)]
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    /// The on-chain transaction id.
    #[serde(default)]
    pub id: Option<String>,
    /// The paid amount in BTC. The processor sends this as a decimal string, but numeric payloads are accepted too.
    #[serde(default, deserialize_with = "de_btc_amount")]
    pub value: Option<Sats>,
    #[serde(default)]
    pub confirmations: i64,
    /// The destination address of the payment.
    #[serde(default)]
    pub destination: Option<String>,
}

fn de_btc_amount<'de, D>(deserializer: D) -> Result<Option<Sats>, D::Error>
where D: serde::Deserializer<'de> {
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Sats::from_btc_str(&s).map(Some).map_err(serde::de::Error::custom),
        Some(Value::Number(n)) => Sats::from_btc_str(&n.to_string()).map(Some).map_err(serde::de::Error::custom),
        Some(other) => Err(serde::de::Error::custom(format!("invalid BTC amount: {other}"))),
    }
}
