//! The BTCPay webhook endpoint.
//!
//! The processor delivers events at least once, in any order, possibly concurrently. The handler therefore:
//! * verifies the `BTCPay-Sig` HMAC header against the raw body before anything else,
//! * durably logs every delivery before acting on it,
//! * responds 200 to everything it could log, even when handling failed, so the processor does not retry
//!   deliveries that will never succeed. Handler errors are recorded on the event log row instead.
//!
//! The only non-200 responses are 401 for a bad signature and 500 for a body that is not JSON at all.

use actix_web::{web, HttpRequest, HttpResponse};
use cita_payment_engine::{
    traits::{DepositGatewayDatabase, PriceFeed, PriceStorage},
    webhook::InvoiceEvent,
    PriceOracle,
    SettlementApi,
};
use log::*;
use serde_json::Value;

use crate::{config::ServerConfig, data_objects::JsonResponse, errors::ServerError, helpers::validate_hmac};

pub const WEBHOOK_SIGNATURE_HEADER: &str = "BTCPay-Sig";

/// Route handler for BTCPay invoice events.
pub async fn btcpay_webhook<B, P, F>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<SettlementApi<B>>,
    oracle: web::Data<PriceOracle<P, F>>,
    config: web::Data<ServerConfig>,
) -> Result<HttpResponse, ServerError>
where
    B: DepositGatewayDatabase,
    P: PriceStorage,
    F: PriceFeed,
{
    trace!("📬️ Received webhook request: {}", req.uri());
    // Signature checks only apply when a secret is configured; an empty secret means the processor does not sign.
    if config.webhook_hmac_checks && !config.webhook_secret.reveal().is_empty() {
        let signature = req
            .headers()
            .get(WEBHOOK_SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                warn!("📬️ No webhook signature found in request. Denying access.");
                ServerError::InvalidSignature
            })?;
        if !validate_hmac(config.webhook_secret.reveal(), &body, signature) {
            warn!("📬️ Invalid webhook signature. Denying access.");
            return Err(ServerError::InvalidSignature);
        }
    }
    let payload = std::str::from_utf8(&body).map_err(|_| ServerError::CouldNotDeserializePayload)?;
    let raw: Value = serde_json::from_str(payload).map_err(|e| {
        error!("📬️ Webhook body is not JSON. {e}");
        ServerError::CouldNotDeserializePayload
    })?;
    let event_type = raw.get("type").and_then(Value::as_str).unwrap_or("unknown").to_string();
    let invoice_id = raw.get("invoiceId").and_then(Value::as_str).map(String::from);
    let store_id = raw.get("storeId").and_then(Value::as_str).map(String::from);
    info!("📬️ Received event {event_type} for invoice {}", invoice_id.as_deref().unwrap_or("<none>"));
    // The delivery is on record from this point on; every outcome below reports 200.
    let event_id = api.log_webhook_event(&event_type, invoice_id.as_deref(), store_id.as_deref(), payload).await?;

    let result = match serde_json::from_value::<InvoiceEvent>(raw) {
        Ok(event) => dispatch(&event, &api, &oracle).await,
        Err(e) => Err(format!("Could not deserialize the event: {e}")),
    };
    let response = match &result {
        Ok(message) => JsonResponse::success(message),
        Err(error) => {
            warn!("📬️ Event {event_type} for invoice {} failed: {error}", invoice_id.as_deref().unwrap_or("<none>"));
            JsonResponse::failure(error)
        },
    };
    // The bookkeeping update must not turn a handled delivery into a retryable failure.
    if let Err(e) = api.mark_webhook_event_processed(event_id, result.err().as_deref()).await {
        error!("📬️ Could not update the event log for event {event_id}: {e}");
    }
    Ok(HttpResponse::Ok().json(response))
}

async fn dispatch<B, P, F>(
    event: &InvoiceEvent,
    api: &SettlementApi<B>,
    oracle: &PriceOracle<P, F>,
) -> Result<String, String>
where
    B: DepositGatewayDatabase,
    P: PriceStorage,
    F: PriceFeed,
{
    if event.kind.is_payment_update() {
        let (deposit, created) = api.update_deposit(event).await.map_err(|e| e.to_string())?;
        let verb = if created { "recorded" } else { "updated" };
        Ok(format!("Deposit {} {verb} with {} confirmations", deposit.txid, deposit.confirmations))
    } else if event.kind.is_settlement() {
        match api.settle_invoice(event, oracle).await.map_err(|e| e.to_string())? {
            Some(txn) => Ok(format!("Credited {} USD / {} MXN to user {}", txn.amount_usd, txn.amount_mxn, txn.user_id)),
            None => Ok("Nothing to settle".to_string()),
        }
    } else {
        debug!("📬️ Ignoring event kind {:?}", event.kind);
        Ok("Event ignored".to_string())
    }
}
