//! Read-only route handlers: health, price, balances and histories.
//!
//! The handlers are generic over the engine's backend traits and are registered against the concrete
//! [`SqliteDatabase`](cita_payment_engine::SqliteDatabase) backend in [`crate::server`].

use actix_web::{get, web, HttpResponse, Responder};
use cita_payment_engine::{
    traits::{BalanceManagement, Pagination, PriceFeed, PriceStorage},
    BalanceApi,
    PriceOracle,
};
use log::trace;

use crate::{
    data_objects::{DepositHistoryResult, PriceResult},
    errors::ServerError,
};

/// Route handler for the health check endpoint
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

/// Route handler for the current BTC exchange rate.
///
/// Serves the cached quote when it is fresh; otherwise consults the live feed. Returns a 500 only when the feed is
/// down *and* nothing has ever been cached.
pub async fn btc_price<B, F>(oracle: web::Data<PriceOracle<B, F>>) -> Result<HttpResponse, ServerError>
where
    B: PriceStorage,
    F: PriceFeed,
{
    let quote = oracle.current_quote().await?;
    let result = PriceResult {
        rate_usd: quote.rate_usd,
        rate_mxn: quote.rate_mxn,
        source: quote.source,
        fetched_at: quote.fetched_at,
    };
    Ok(HttpResponse::Ok().json(result))
}

/// Route handler for a user's fiat balances. A user that has never deposited gets a zeroed balance row.
pub async fn balance<B>(path: web::Path<i64>, api: web::Data<BalanceApi<B>>) -> Result<HttpResponse, ServerError>
where B: BalanceManagement {
    let user_id = path.into_inner();
    trace!("💻️ Balance request for user {user_id}");
    let balance = api.balance_or_default(user_id).await?;
    Ok(HttpResponse::Ok().json(balance))
}

/// Route handler for a user's deposit history, newest first.
pub async fn deposit_history<B>(
    path: web::Path<i64>,
    pagination: web::Query<Pagination>,
    api: web::Data<BalanceApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: BalanceManagement,
{
    let user_id = path.into_inner();
    let (deposits, total) = api.deposit_history(user_id, pagination.into_inner()).await?;
    Ok(HttpResponse::Ok().json(DepositHistoryResult { user_id, total, deposits }))
}

/// Route handler for a user's ledger entries, newest first.
pub async fn transaction_history<B>(
    path: web::Path<i64>,
    pagination: web::Query<Pagination>,
    api: web::Data<BalanceApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: BalanceManagement,
{
    let user_id = path.into_inner();
    let txns = api.transaction_history(user_id, pagination.into_inner()).await?;
    Ok(HttpResponse::Ok().json(txns))
}
