//! The module contains the errors an import run can throw.
//!
//! The errors are:
//!
//! - [`SourceFetch`] thrown when the ledger service or the rate provider fails.
//! - [`ConversionUnavailable`] thrown when a currency pair is missing from the
//!   rate provider response.
//! - [`MalformedDate`] thrown when a transaction or month date cannot be parsed.
//! - [`SinkWrite`] thrown when a batch upsert fails; carries the batch offset.
//!
//! A reconstructed balance that disagrees with the ledger is not an error: see
//! [`ReconciliationMismatch`].
//!
//!  [`SourceFetch`]: EngineError::SourceFetch
//!  [`ConversionUnavailable`]: EngineError::ConversionUnavailable
//!  [`MalformedDate`]: EngineError::MalformedDate
//!  [`SinkWrite`]: EngineError::SinkWrite
//!  [`ReconciliationMismatch`]: crate::ReconciliationMismatch
use chrono::NaiveDate;
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to fetch from source: {0}")]
    SourceFetch(String),
    #[error("conversion from {from} to {to} unavailable")]
    ConversionUnavailable { from: String, to: String },
    #[error("malformed date: \"{0}\"")]
    MalformedDate(String),
    #[error("failed writing {table} batch starting at offset {offset}: {source}")]
    SinkWrite {
        table: &'static str,
        offset: usize,
        #[source]
        source: DbErr,
    },
    #[error("unable to find ID for ledger: {0}")]
    LedgerNotFound(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("malformed record: {0}")]
    MalformedRecord(String),
    #[error("events out of order: {next} comes after {previous}")]
    OutOfOrder {
        previous: NaiveDate,
        next: NaiveDate,
    },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::SourceFetch(a), Self::SourceFetch(b)) => a == b,
            (
                Self::ConversionUnavailable { from: a, to: b },
                Self::ConversionUnavailable { from: c, to: d },
            ) => a == c && b == d,
            (Self::MalformedDate(a), Self::MalformedDate(b)) => a == b,
            (
                Self::SinkWrite {
                    table: a,
                    offset: b,
                    ..
                },
                Self::SinkWrite {
                    table: c,
                    offset: d,
                    ..
                },
            ) => a == c && b == d,
            (Self::LedgerNotFound(a), Self::LedgerNotFound(b)) => a == b,
            (Self::InvalidConfig(a), Self::InvalidConfig(b)) => a == b,
            (Self::MalformedRecord(a), Self::MalformedRecord(b)) => a == b,
            (
                Self::OutOfOrder {
                    previous: a,
                    next: b,
                },
                Self::OutOfOrder {
                    previous: c,
                    next: d,
                },
            ) => a == c && b == d,
            (Self::Csv(a), Self::Csv(b)) => a.to_string() == b.to_string(),
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
