#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use cita_payment_engine::{
    db_types::NewPriceQuote,
    test_utils::prepare_env::prepare_test_env,
    traits::{PriceFeed, PriceFeedError},
    webhook::{EventMetadata, InvoiceEvent, PaymentDetails, WebhookEventKind},
    SqliteDatabase,
};
use cpg_common::{FiatAmount, Sats};

pub async fn new_db(url: &str) -> SqliteDatabase {
    prepare_test_env(url).await;
    SqliteDatabase::new_with_url(url, 5).await.expect("Error creating database")
}

/// A feed that always returns the same rates and counts how often it is consulted.
#[derive(Clone)]
pub struct CannedFeed {
    rate_usd: FiatAmount,
    rate_mxn: FiatAmount,
    calls: Arc<AtomicUsize>,
}

impl CannedFeed {
    pub fn new(usd_per_btc: i64, mxn_per_btc: i64) -> Self {
        Self {
            rate_usd: FiatAmount::from_major(usd_per_btc),
            rate_mxn: FiatAmount::from_major(mxn_per_btc),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PriceFeed for CannedFeed {
    async fn fetch_price(&self) -> Result<NewPriceQuote, PriceFeedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(NewPriceQuote { rate_usd: self.rate_usd, rate_mxn: self.rate_mxn, source: "canned".to_string() })
    }
}

/// A feed that is always down.
#[derive(Clone)]
pub struct FailingFeed;

impl PriceFeed for FailingFeed {
    async fn fetch_price(&self) -> Result<NewPriceQuote, PriceFeedError> {
        Err(PriceFeedError::RequestFailed("connection refused".to_string()))
    }
}

pub fn payment_event(kind: WebhookEventKind, invoice_id: &str, txid: &str, user_id: i64, btc: &str, confirmations: i64) -> InvoiceEvent {
    InvoiceEvent {
        kind,
        invoice_id: Some(invoice_id.to_string()),
        store_id: Some("store-1".to_string()),
        metadata: Some(EventMetadata { user_id: Some(user_id) }),
        payment: Some(PaymentDetails {
            id: Some(txid.to_string()),
            value: Some(Sats::from_btc_str(btc).expect("valid BTC amount")),
            confirmations,
            destination: Some("bc1qtestaddress".to_string()),
        }),
    }
}

pub fn settlement_event(invoice_id: &str, txid: &str, user_id: i64, btc: &str, confirmations: i64) -> InvoiceEvent {
    payment_event(WebhookEventKind::InvoiceSettled, invoice_id, txid, user_id, btc, confirmations)
}
