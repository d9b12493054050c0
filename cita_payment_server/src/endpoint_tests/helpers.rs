use actix_web::{http::StatusCode, test, test::TestRequest, web, web::ServiceConfig, App};
use cita_payment_engine::{
    db_types::NewPriceQuote,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    traits::{PriceFeed, PriceFeedError},
    BalanceApi,
    PriceOracle,
    SettlementApi,
    SqliteDatabase,
};
use cpg_common::{FiatAmount, Secret};
use serde_json::{json, Value};

use crate::{
    config::ServerConfig,
    helpers::calculate_hmac,
    routes::{balance, btc_price, deposit_history, health, transaction_history},
    webhook_routes::{btcpay_webhook, WEBHOOK_SIGNATURE_HEADER},
};

pub const TEST_SECRET: &str = "test-webhook-secret";

/// A feed serving the fixed rates 60,000 USD / 1,080,000 MXN per BTC.
#[derive(Debug, Clone)]
pub struct CannedFeed;

impl PriceFeed for CannedFeed {
    async fn fetch_price(&self) -> Result<NewPriceQuote, PriceFeedError> {
        Ok(NewPriceQuote {
            rate_usd: FiatAmount::from_major(60_000),
            rate_mxn: FiatAmount::from_major(1_080_000),
            source: "canned".to_string(),
        })
    }
}

pub fn test_config() -> ServerConfig {
    ServerConfig { webhook_secret: Secret::new(TEST_SECRET.to_string()), ..Default::default() }
}

pub async fn new_test_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

/// Register the same routes [`crate::server`] registers, against the given database and the canned feed.
fn configure(db: SqliteDatabase, config: ServerConfig) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let settlement_api = SettlementApi::new(db.clone());
        let balance_api = BalanceApi::new(db.clone());
        let oracle = PriceOracle::new(db.clone(), CannedFeed, config.price_max_age);
        cfg.app_data(web::Data::new(settlement_api))
            .app_data(web::Data::new(balance_api))
            .app_data(web::Data::new(oracle))
            .app_data(web::Data::new(config))
            .service(health)
            .service(
                web::scope("/api")
                    .route(
                        "/webhooks/btcpay",
                        web::post().to(btcpay_webhook::<SqliteDatabase, SqliteDatabase, CannedFeed>),
                    )
                    .route("/price", web::get().to(btc_price::<SqliteDatabase, CannedFeed>))
                    .route("/balance/{user_id}", web::get().to(balance::<SqliteDatabase>))
                    .route("/deposits/{user_id}", web::get().to(deposit_history::<SqliteDatabase>))
                    .route("/transactions/{user_id}", web::get().to(transaction_history::<SqliteDatabase>)),
            );
    }
}

async fn send(db: &SqliteDatabase, config: &ServerConfig, req: TestRequest) -> (StatusCode, String) {
    let _ = env_logger::try_init();
    let app = App::new().configure(configure(db.clone(), config.clone()));
    let service = test::init_service(app).await;
    let res = test::call_service(&service, req.to_request()).await;
    let status = res.status();
    let body = String::from_utf8_lossy(&test::read_body(res).await).into_owned();
    (status, body)
}

pub async fn get_json(db: &SqliteDatabase, config: &ServerConfig, uri: &str) -> (StatusCode, Value) {
    let (status, body) = send(db, config, TestRequest::get().uri(uri)).await;
    let value = serde_json::from_str(&body).unwrap_or(Value::Null);
    (status, value)
}

pub async fn get_raw(db: &SqliteDatabase, config: &ServerConfig, uri: &str) -> (StatusCode, String) {
    send(db, config, TestRequest::get().uri(uri)).await
}

pub async fn post_webhook(
    db: &SqliteDatabase,
    config: &ServerConfig,
    payload: String,
    signature: Option<&str>,
) -> (StatusCode, String) {
    let mut req = TestRequest::post()
        .uri("/api/webhooks/btcpay")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(payload);
    if let Some(sig) = signature {
        req = req.insert_header((WEBHOOK_SIGNATURE_HEADER, sig));
    }
    send(db, config, req).await
}

/// POST a webhook body signed with [`TEST_SECRET`].
pub async fn post_signed_webhook(db: &SqliteDatabase, config: &ServerConfig, body: &Value) -> (StatusCode, String) {
    let payload = body.to_string();
    let sig = calculate_hmac(TEST_SECRET, payload.as_bytes());
    post_webhook(db, config, payload, Some(&sig)).await
}

pub fn payment_event_body(invoice_id: &str, txid: &str, user_id: i64, btc: &str, confirmations: i64) -> Value {
    json!({
        "type": "InvoiceProcessing",
        "invoiceId": invoice_id,
        "storeId": "store-1",
        "metadata": { "userId": user_id },
        "payment": { "id": txid, "value": btc, "confirmations": confirmations, "destination": "bc1qtest" }
    })
}

pub fn settlement_event_body(invoice_id: &str, txid: &str, user_id: i64, btc: &str, confirmations: i64) -> Value {
    let mut body = payment_event_body(invoice_id, txid, user_id, btc, confirmations);
    body["type"] = json!("InvoiceSettled");
    body
}
