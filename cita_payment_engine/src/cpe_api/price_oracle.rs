//! The exchange rate oracle.
//!
//! Rates come from a live [`PriceFeed`] but are served from an append-only cache whenever the newest cached quote is
//! fresh enough. If the live feed fails, the newest cached quote is served regardless of age; only a cold cache plus
//! a dead feed produces an error.

use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;

use crate::{
    db_types::PriceQuote,
    traits::{PriceFeed, PriceOracleError, PriceStorage},
};

pub struct PriceOracle<B, F> {
    db: B,
    feed: F,
    max_age: Duration,
}

impl<B: Debug, F> Debug for PriceOracle<B, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PriceOracle ({:?}, max_age {}s)", self.db, self.max_age.num_seconds())
    }
}

impl<B, F> PriceOracle<B, F>
where
    B: PriceStorage,
    F: PriceFeed,
{
    /// A new oracle over the given quote storage and live feed. `max_age` is how old a cached quote may be before
    /// the live feed is consulted again.
    pub fn new(db: B, feed: F, max_age: Duration) -> Self {
        Self { db, feed, max_age }
    }

    /// The current exchange rate quote.
    ///
    /// A cached quote younger than `max_age` is returned without touching the live feed. Otherwise the feed is
    /// consulted and the fresh quote cached. If the feed fails, the newest cached quote is returned no matter how
    /// stale it is; [`PriceOracleError::PriceUnavailable`] is only possible when nothing has ever been cached.
    pub async fn current_quote(&self) -> Result<PriceQuote, PriceOracleError> {
        let cached = self.db.fetch_latest_quote().await?;
        if let Some(quote) = &cached {
            let age = Utc::now() - quote.fetched_at;
            if age <= self.max_age {
                trace!("💱️ Serving cached quote #{} ({}s old). {quote}", quote.id, age.num_seconds());
                return Ok(quote.clone());
            }
            debug!("💱️ Cached quote #{} is {}s old. Refreshing from the live feed.", quote.id, age.num_seconds());
        }
        match self.feed.fetch_price().await {
            Ok(fresh) => {
                let quote = self.db.insert_price_quote(&fresh).await?;
                info!("💱️ Fetched fresh quote from {}. {quote}", quote.source);
                Ok(quote)
            },
            Err(e) => match cached {
                Some(stale) => {
                    warn!("💱️ Price feed failed ({e}). Falling back to stale quote #{}. {stale}", stale.id);
                    Ok(stale)
                },
                None => {
                    error!("💱️ Price feed failed ({e}) and no quote has ever been cached.");
                    Err(PriceOracleError::PriceUnavailable)
                },
            },
        }
    }
}
