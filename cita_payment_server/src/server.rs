use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use cita_payment_engine::{BalanceApi, PriceOracle, SettlementApi, SqliteDatabase};
use log::info;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    integrations::price_feed::HttpPriceFeed,
    routes::{balance, btc_price, deposit_history, health, transaction_history},
    webhook_routes::btcpay_webhook,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let srv = create_server_instance(config, db)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(config: ServerConfig, db: SqliteDatabase) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let settlement_api = SettlementApi::new(db.clone());
        let balance_api = BalanceApi::new(db.clone());
        let feed = HttpPriceFeed::new(&config.price_feed_url);
        let oracle = PriceOracle::new(db.clone(), feed, config.price_max_age);
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("cpg::access_log"))
            .app_data(web::Data::new(settlement_api))
            .app_data(web::Data::new(balance_api))
            .app_data(web::Data::new(oracle))
            .app_data(web::Data::new(config.clone()))
            .service(health)
            .service(
                web::scope("/api")
                    .route(
                        "/webhooks/btcpay",
                        web::post().to(btcpay_webhook::<SqliteDatabase, SqliteDatabase, HttpPriceFeed>),
                    )
                    .route("/price", web::get().to(btc_price::<SqliteDatabase, HttpPriceFeed>))
                    .route("/balance/{user_id}", web::get().to(balance::<SqliteDatabase>))
                    .route("/deposits/{user_id}", web::get().to(deposit_history::<SqliteDatabase>))
                    .route("/transactions/{user_id}", web::get().to(transaction_history::<SqliteDatabase>)),
            )
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    info!("🚀️ Server bound to {host}:{port}");
    Ok(srv)
}
