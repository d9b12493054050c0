//! Cita Payment Engine
//!
//! The core logic of the Bitcoin deposit settlement pipeline. The engine tracks on-chain deposits through their
//! confirmation lifecycle, converts them to fiat at a cached exchange rate, and credits user balances through an
//! append-only ledger. It is transport-agnostic: the HTTP server that feeds it processor webhooks lives in a
//! separate crate.
//!
//! The library is divided into three main sections:
//! 1. Database management and control ([`mod@sqlite`]). SQLite is the only backend shipped. You should never need
//!    to access the database directly; use the public API instead. The exception is the data types, which are
//!    defined in the [`mod@db_types`] module and are public.
//! 2. The backend trait definitions ([`mod@traits`]). A backend implements these to drive the settlement pipeline.
//! 3. The engine public API ([`mod@cpe_api`]): the settlement flow, the price oracle and the balance queries.
//!
//! The lifecycle guarantees live at the database layer, so every API entry point is safe to call with duplicated,
//! out-of-order or concurrent webhook deliveries.

mod cpe_api;
pub mod db_types;
#[cfg(feature = "sqlite")]
mod sqlite;
pub mod traits;
pub mod webhook;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use cpe_api::{BalanceApi, PriceOracle, SettlementApi, SettlementError};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
