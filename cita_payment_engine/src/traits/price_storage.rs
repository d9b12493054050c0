use thiserror::Error;

use crate::db_types::{NewPriceQuote, PriceQuote};

#[derive(Debug, Clone, Error)]
pub enum PriceOracleError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("No exchange rate is available: the live feed failed and no quote has ever been cached")]
    PriceUnavailable,
}

impl From<sqlx::Error> for PriceOracleError {
    fn from(e: sqlx::Error) -> Self {
        PriceOracleError::DatabaseError(e.to_string())
    }
}

/// Storage for the append-only price quote cache.
#[allow(async_fn_in_trait)]
pub trait PriceStorage {
    /// Fetch the most recently fetched quote, of any age. `None` if no quote has ever been stored.
    async fn fetch_latest_quote(&self) -> Result<Option<PriceQuote>, PriceOracleError>;

    /// Insert a freshly fetched quote. Quotes are never updated; reads always take the newest row, so a benign
    /// duplicate insert under a race does not corrupt anything.
    async fn insert_price_quote(&self, quote: &NewPriceQuote) -> Result<PriceQuote, PriceOracleError>;
}

#[derive(Debug, Clone, Error)]
pub enum PriceFeedError {
    #[error("The price feed request failed: {0}")]
    RequestFailed(String),
    #[error("The price feed returned an unusable response: {0}")]
    InvalidResponse(String),
}

/// A live source of BTC exchange rates. The production implementation is an HTTP client for a CoinGecko-shaped
/// endpoint; tests inject canned feeds. Feed failures are recoverable -- the oracle falls back to the cache.
#[allow(async_fn_in_trait)]
pub trait PriceFeed {
    async fn fetch_price(&self) -> Result<NewPriceQuote, PriceFeedError>;
}
