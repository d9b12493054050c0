//! The backend trait definitions for the payment engine.
//!
//! Backends (SQLite is the only one shipped) implement these traits to drive the settlement pipeline. The split
//! follows the concerns of the system: [`DepositGatewayDatabase`] owns the deposit lifecycle and the ledger credit,
//! [`BalanceManagement`] provides the read projections, and [`PriceStorage`]/[`PriceFeed`] back the price oracle.

mod balance_management;
mod data_objects;
mod deposit_gateway_database;
mod price_storage;

pub use balance_management::{BalanceManagement, LedgerError};
pub use data_objects::Pagination;
pub use deposit_gateway_database::{DepositGatewayDatabase, DepositGatewayError};
pub use price_storage::{PriceFeed, PriceFeedError, PriceOracleError, PriceStorage};
