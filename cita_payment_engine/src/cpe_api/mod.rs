//! The high-level APIs of the payment engine.
//!
//! These structs are generic over the backend traits in [`crate::traits`], so the server (and the tests) can wire in
//! any conforming backend. [`SettlementApi`] drives the deposit lifecycle, [`PriceOracle`] owns the exchange rate
//! cache, and [`BalanceApi`] serves the read-only balance queries.

mod balance_api;
mod errors;
mod price_oracle;
mod settlement_api;

pub use balance_api::BalanceApi;
pub use errors::SettlementError;
pub use price_oracle::PriceOracle;
pub use settlement_api::SettlementApi;
