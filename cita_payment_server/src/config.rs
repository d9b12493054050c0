use std::env;

use chrono::Duration;
use cpg_common::{helpers::parse_boolean_flag, Secret};
use log::*;

const DEFAULT_CPG_HOST: &str = "127.0.0.1";
const DEFAULT_CPG_PORT: u16 = 8360;
const DEFAULT_PRICE_FEED_URL: &str = "https://api.coingecko.com/api/v3";
const DEFAULT_PRICE_MAX_AGE: Duration = Duration::seconds(300);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Base URL of the exchange rate feed. The oracle appends `/simple/price` to it.
    pub price_feed_url: String,
    /// How old a cached exchange rate quote may be before the live feed is consulted again.
    pub price_max_age: Duration,
    /// The shared secret the payment processor signs webhook bodies with.
    pub webhook_secret: Secret<String>,
    /// If false, webhook signatures are not checked. Only ever disable this in test environments. **DANGER**
    pub webhook_hmac_checks: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_CPG_HOST.to_string(),
            port: DEFAULT_CPG_PORT,
            database_url: String::default(),
            price_feed_url: DEFAULT_PRICE_FEED_URL.to_string(),
            price_max_age: DEFAULT_PRICE_MAX_AGE,
            webhook_secret: Secret::new(String::default()),
            webhook_hmac_checks: true,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("CPG_HOST").ok().unwrap_or_else(|| DEFAULT_CPG_HOST.into());
        let port = env::var("CPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for CPG_PORT. {e} Using the default, {DEFAULT_CPG_PORT}, instead."
                    );
                    DEFAULT_CPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_CPG_PORT);
        let database_url = env::var("CPG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ CPG_DATABASE_URL is not set. Please set it to the URL for the gateway database.");
            String::default()
        });
        let price_feed_url = env::var("CPG_PRICE_FEED_URL").ok().unwrap_or_else(|| {
            info!("🪛️ CPG_PRICE_FEED_URL is not set. Using the default, {DEFAULT_PRICE_FEED_URL}.");
            DEFAULT_PRICE_FEED_URL.into()
        });
        let price_max_age = env::var("CPG_PRICE_MAX_AGE")
            .map(|s| {
                s.parse::<i64>().map(Duration::seconds).unwrap_or_else(|e| {
                    error!("🪛️ {s} is not a valid number of seconds for CPG_PRICE_MAX_AGE. {e} Using the default.");
                    DEFAULT_PRICE_MAX_AGE
                })
            })
            .ok()
            .unwrap_or(DEFAULT_PRICE_MAX_AGE);
        let webhook_secret = env::var("CPG_WEBHOOK_SECRET").ok().unwrap_or_else(|| {
            error!(
                "🪛️ CPG_WEBHOOK_SECRET is not set. Please set it to the signing secret configured on the payment \
                 processor."
            );
            String::default()
        });
        let webhook_secret = Secret::new(webhook_secret);
        let webhook_hmac_checks = parse_boolean_flag(env::var("CPG_WEBHOOK_HMAC_CHECKS").ok(), true);
        if !webhook_hmac_checks {
            warn!("🪛️ Webhook HMAC checks are DISABLED. Anyone can submit deposit events to this server.");
        }
        Self { host, port, database_url, price_feed_url, price_max_age, webhook_secret, webhook_hmac_checks }
    }
}
