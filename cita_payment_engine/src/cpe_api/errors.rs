use thiserror::Error;

use crate::traits::{DepositGatewayError, PriceOracleError};

#[derive(Debug, Clone, Error)]
pub enum SettlementError {
    #[error("{0}")]
    DatabaseError(#[from] DepositGatewayError),
    #[error("{0}")]
    PriceOracleError(#[from] PriceOracleError),
    #[error("The event does not carry an invoice id")]
    MissingInvoiceId,
    #[error("The event for invoice {0} does not carry payment details")]
    MissingPaymentDetails(String),
    #[error("The event for invoice {0} does not identify the paying user")]
    MissingUserId(String),
}
