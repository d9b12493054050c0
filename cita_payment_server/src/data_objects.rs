use std::fmt::Display;

use chrono::{DateTime, Utc};
use cita_payment_engine::db_types::Deposit;
use cpg_common::FiatAmount;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// The current exchange rate, as served by the price endpoint. Rates are cents per whole BTC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceResult {
    pub rate_usd: FiatAmount,
    pub rate_mxn: FiatAmount,
    pub source: String,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositHistoryResult {
    pub user_id: i64,
    /// Total number of deposits for the user, independent of pagination.
    pub total: i64,
    pub deposits: Vec<Deposit>,
}
