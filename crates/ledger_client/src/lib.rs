//! HTTP collaborators of the import engine.
//!
//! [`LedgerClient`] talks to the budgeting service and implements
//! [`engine::LedgerSource`]; [`ExchangeRatesClient`] implements
//! [`engine::RateProvider`].

use std::time::Duration;

pub use error::ClientError;
pub use ledger::{DEFAULT_LEDGER_URL, LedgerClient};
pub use rates::{DEFAULT_RATES_URL, ExchangeRatesClient};

mod error;
mod ledger;
mod rates;

/// Build the shared HTTP client with a per-request timeout.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, ClientError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}
