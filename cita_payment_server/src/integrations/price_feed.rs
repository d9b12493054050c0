//! HTTP client for a CoinGecko-shaped exchange rate endpoint.

use cita_payment_engine::{
    db_types::NewPriceQuote,
    traits::{PriceFeed, PriceFeedError},
};
use cpg_common::FiatAmount;
use log::debug;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct SimplePriceResponse {
    bitcoin: BitcoinRates,
}

#[derive(Debug, Deserialize)]
struct BitcoinRates {
    usd: f64,
    mxn: f64,
}

/// Fetches BTC rates from `{base_url}/simple/price`. The base URL is configurable so that tests and self-hosted
/// mirrors can stand in for the real API.
#[derive(Debug, Clone)]
pub struct HttpPriceFeed {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPriceFeed {
    pub fn new(base_url: &str) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.trim_end_matches('/').to_string() }
    }
}

impl PriceFeed for HttpPriceFeed {
    async fn fetch_price(&self) -> Result<NewPriceQuote, PriceFeedError> {
        let url = format!("{}/simple/price", self.base_url);
        debug!("💱️ Fetching BTC rates from {url}");
        let response = self
            .client
            .get(&url)
            .query(&[("ids", "bitcoin"), ("vs_currencies", "usd,mxn")])
            .send()
            .await
            .map_err(|e| PriceFeedError::RequestFailed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(PriceFeedError::RequestFailed(format!("{url} returned {}", response.status())));
        }
        let prices: SimplePriceResponse =
            response.json().await.map_err(|e| PriceFeedError::InvalidResponse(e.to_string()))?;
        let rate_usd = FiatAmount::from_major_f64(prices.bitcoin.usd)
            .map_err(|e| PriceFeedError::InvalidResponse(e.to_string()))?;
        let rate_mxn = FiatAmount::from_major_f64(prices.bitcoin.mxn)
            .map_err(|e| PriceFeedError::InvalidResponse(e.to_string()))?;
        Ok(NewPriceQuote { rate_usd, rate_mxn, source: "coingecko".to_string() })
    }
}
