//! # Cita Payment Server
//! The HTTP face of the deposit settlement pipeline. It is responsible for:
//! * Listening for incoming webhook notifications from the BTCPay payment processor.
//! * Verifying webhook signatures and durably logging every delivery.
//! * Driving the settlement engine in response to payment and settlement events.
//! * Serving the read-only price, balance and history endpoints.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/webhooks/btcpay`: The webhook route for BTCPay invoice events.
//! * `/api/price`: The current BTC exchange rate quote.
//! * `/api/balance/{user_id}`: The user's fiat balances.
//! * `/api/deposits/{user_id}`: The user's deposit history.
//! * `/api/transactions/{user_id}`: The user's ledger history.

pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod routes;
pub mod server;
pub mod webhook_routes;

#[cfg(test)]
mod endpoint_tests;
