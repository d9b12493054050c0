mod fiat;
pub mod helpers;
pub mod op;
mod sats;
mod secret;

pub use fiat::{FiatAmount, FiatConversionError};
pub use sats::{Sats, SatsConversionError, BTC_CURRENCY_CODE, SATS_PER_BTC};
pub use secret::Secret;
