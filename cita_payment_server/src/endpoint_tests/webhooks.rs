use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use cita_payment_engine::{
    db_types::{BalanceTransaction, Deposit, DepositStatus, NewDeposit, PriceQuote, UserBalance, WebhookEventRecord},
    traits::{
        BalanceManagement,
        DepositGatewayDatabase,
        DepositGatewayError,
        LedgerError,
        Pagination,
    },
    PriceOracle,
    SettlementApi,
    SqliteDatabase,
};
use serde_json::json;

use super::helpers::*;
use crate::{config::ServerConfig, helpers::calculate_hmac, webhook_routes::{btcpay_webhook, WEBHOOK_SIGNATURE_HEADER}};

#[actix_web::test]
async fn settlement_event_credits_the_balance() {
    let db = new_test_db().await;
    let config = test_config();

    let body = payment_event_body("inv-1", "tx-1", 7, "0.001", 1);
    let (status, _) = post_signed_webhook(&db, &config, &body).await;
    assert_eq!(status, StatusCode::OK);

    let body = settlement_event_body("inv-1", "tx-1", 7, "0.001", 3);
    let (status, response) = post_signed_webhook(&db, &config, &body).await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.contains("\"success\":true"), "was: {response}");

    let deposit = db.fetch_deposit_by_txid("tx-1").await.unwrap().unwrap();
    assert_eq!(deposit.status, DepositStatus::Credited);

    let (status, balance) = get_json(&db, &config, "/api/balance/7").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(balance["balance_usd"], json!(6000));
    assert_eq!(balance["balance_mxn"], json!(108_000));
}

#[actix_web::test]
async fn duplicate_settlement_deliveries_credit_once() {
    let db = new_test_db().await;
    let config = test_config();

    let body = settlement_event_body("inv-2", "tx-2", 3, "0.01", 4);
    let (status, _) = post_signed_webhook(&db, &config, &body).await;
    assert_eq!(status, StatusCode::OK);
    let (status, response) = post_signed_webhook(&db, &config, &body).await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.contains("Nothing to settle"), "was: {response}");

    let txns = db.fetch_transactions(3, Pagination::default()).await.unwrap();
    assert_eq!(txns.len(), 1);
    let balance = db.fetch_balance(3).await.unwrap().unwrap();
    assert_eq!(balance.balance_usd.value(), 60_000);
}

#[actix_web::test]
async fn invalid_signature_is_rejected() {
    let db = new_test_db().await;
    let config = test_config();

    let payload = settlement_event_body("inv-3", "tx-3", 1, "0.5", 6).to_string();
    let bad_sig = calculate_hmac("some-other-secret", payload.as_bytes());
    let (status, body) = post_webhook(&db, &config, payload, Some(&bad_sig)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("Invalid signature"), "was: {body}");
    // The delivery never made it into the pipeline.
    assert!(db.fetch_deposit_by_txid("tx-3").await.unwrap().is_none());
}

#[actix_web::test]
async fn missing_signature_is_rejected() {
    let db = new_test_db().await;
    let config = test_config();

    let payload = settlement_event_body("inv-4", "tx-4", 1, "0.5", 6).to_string();
    let (status, _) = post_webhook(&db, &config, payload, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn disabled_hmac_checks_allow_unsigned_deliveries() {
    let db = new_test_db().await;
    let mut config = test_config();
    config.webhook_hmac_checks = false;

    let payload = payment_event_body("inv-5", "tx-5", 2, "0.25", 1).to_string();
    let (status, _) = post_webhook(&db, &config, payload, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(db.fetch_deposit_by_txid("tx-5").await.unwrap().is_some());
}

#[actix_web::test]
async fn non_json_body_is_an_internal_error() {
    let db = new_test_db().await;
    let config = test_config();

    let payload = "this is not json".to_string();
    let sig = calculate_hmac(TEST_SECRET, payload.as_bytes());
    let (status, _) = post_webhook(&db, &config, payload, Some(&sig)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_web::test]
async fn unknown_event_kinds_are_logged_and_ignored() {
    let db = new_test_db().await;
    let config = test_config();

    let body = json!({ "type": "InvoiceExpired", "invoiceId": "inv-6" });
    let (status, response) = post_signed_webhook(&db, &config, &body).await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.contains("Event ignored"), "was: {response}");

    let event = db.fetch_webhook_event(1).await.unwrap().unwrap();
    assert_eq!(event.event_type, "InvoiceExpired");
    assert!(event.processed);
    assert!(event.error.is_none());
}

/// A backend whose event log bookkeeping always fails, while everything else works.
#[derive(Clone)]
struct BrokenEventLogDb(SqliteDatabase);

impl BalanceManagement for BrokenEventLogDb {
    async fn fetch_balance(&self, user_id: i64) -> Result<Option<UserBalance>, LedgerError> {
        self.0.fetch_balance(user_id).await
    }

    async fn fetch_or_create_balance(&self, user_id: i64) -> Result<UserBalance, LedgerError> {
        self.0.fetch_or_create_balance(user_id).await
    }

    async fn fetch_deposits(&self, user_id: i64, pagination: Pagination) -> Result<Vec<Deposit>, LedgerError> {
        self.0.fetch_deposits(user_id, pagination).await
    }

    async fn count_deposits(&self, user_id: i64) -> Result<i64, LedgerError> {
        self.0.count_deposits(user_id).await
    }

    async fn fetch_transactions(
        &self,
        user_id: i64,
        pagination: Pagination,
    ) -> Result<Vec<BalanceTransaction>, LedgerError> {
        self.0.fetch_transactions(user_id, pagination).await
    }
}

impl DepositGatewayDatabase for BrokenEventLogDb {
    fn url(&self) -> &str {
        self.0.url()
    }

    async fn upsert_deposit(&self, deposit: NewDeposit) -> Result<(Deposit, bool), DepositGatewayError> {
        self.0.upsert_deposit(deposit).await
    }

    async fn fetch_deposit_by_txid(&self, txid: &str) -> Result<Option<Deposit>, DepositGatewayError> {
        self.0.fetch_deposit_by_txid(txid).await
    }

    async fn fetch_settleable_deposit(&self, invoice_id: &str) -> Result<Option<Deposit>, DepositGatewayError> {
        self.0.fetch_settleable_deposit(invoice_id).await
    }

    async fn mark_deposit_confirmed(
        &self,
        deposit_id: i64,
        quote: &PriceQuote,
    ) -> Result<Deposit, DepositGatewayError> {
        self.0.mark_deposit_confirmed(deposit_id, quote).await
    }

    async fn credit_deposit(&self, deposit_id: i64) -> Result<Option<BalanceTransaction>, DepositGatewayError> {
        self.0.credit_deposit(deposit_id).await
    }

    async fn log_webhook_event(
        &self,
        event_type: &str,
        invoice_id: Option<&str>,
        store_id: Option<&str>,
        payload: &str,
    ) -> Result<i64, DepositGatewayError> {
        self.0.log_webhook_event(event_type, invoice_id, store_id, payload).await
    }

    async fn mark_webhook_event_processed(
        &self,
        _event_id: i64,
        _error: Option<&str>,
    ) -> Result<(), DepositGatewayError> {
        Err(DepositGatewayError::DatabaseError("event log unavailable".to_string()))
    }

    async fn fetch_webhook_event(&self, event_id: i64) -> Result<Option<WebhookEventRecord>, DepositGatewayError> {
        self.0.fetch_webhook_event(event_id).await
    }
}

#[actix_web::test]
async fn bookkeeping_failures_do_not_fail_the_delivery() {
    let db = new_test_db().await;
    let config: ServerConfig = test_config();

    let payload = payment_event_body("inv-8", "tx-8", 4, "0.1", 1).to_string();
    let sig = calculate_hmac(TEST_SECRET, payload.as_bytes());
    let app = App::new()
        .app_data(web::Data::new(SettlementApi::new(BrokenEventLogDb(db.clone()))))
        .app_data(web::Data::new(PriceOracle::new(db.clone(), CannedFeed, config.price_max_age)))
        .app_data(web::Data::new(config))
        .route("/api/webhooks/btcpay", web::post().to(btcpay_webhook::<BrokenEventLogDb, SqliteDatabase, CannedFeed>));
    let service = test::init_service(app).await;
    let req = TestRequest::post()
        .uri("/api/webhooks/btcpay")
        .insert_header(("Content-Type", "application/json"))
        .insert_header((WEBHOOK_SIGNATURE_HEADER, sig.as_str()))
        .set_payload(payload)
        .to_request();
    let res = test::call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    // The event itself was handled.
    assert!(db.fetch_deposit_by_txid("tx-8").await.unwrap().is_some());
}

#[actix_web::test]
async fn handler_failures_still_respond_200_and_record_the_error() {
    let db = new_test_db().await;
    let config = test_config();

    // A payment update with no payment section cannot be processed, but must not trigger a retry storm.
    let body = json!({ "type": "InvoiceProcessing", "invoiceId": "inv-7" });
    let (status, response) = post_signed_webhook(&db, &config, &body).await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.contains("\"success\":false"), "was: {response}");

    let event = db.fetch_webhook_event(1).await.unwrap().unwrap();
    assert!(event.processed);
    assert!(event.error.is_some());
}
