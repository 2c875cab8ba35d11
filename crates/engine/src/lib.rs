//! Re-materializes ledger data as daily, idempotent SQL rows.
//!
//! An [`Engine`] pulls accounts, transactions and budget months out of a
//! [`LedgerSource`], converts every amount with rates from a
//! [`RateProvider`] and upserts four tables: `transactions`, `accounts`,
//! `budgets` and `networth`.

pub use accounts::{AccountRow, AccountTimeline, ReconciliationMismatch, account_key};
pub use budgets::BudgetRow;
pub use config::{
    BudgetConfig, CalculatedField, CsvImportConfig, DEFAULT_BATCH_SIZE, ImportConfig, TagConfig,
};
pub use csv_source::{CsvSource, CsvTransaction};
pub use currency::{CurrencyConversion, CurrencyConverter, RateProvider, RateSnapshot};
pub use error::EngineError;
pub use ledger::{
    Account, Category, CategoryGroup, CategoryIndex, CategoryInfo, LedgerEntry, LedgerSource,
    LedgerSummary, MonthDetail, SubTransaction, TransactionDetail,
};
pub use money::Milliunits;
pub use networth::{NetWorthRow, aggregate_net_worth};
pub use ops::{AccountRows, Engine, EngineBuilder, ImportContext, Ledger, reconstruct_accounts};
pub use summary::{LedgerReport, RunSummary};
pub use timeline::{DailyRow, Timeline, reconstruct};
pub use transactions::{
    DEFAULT_TAG_PATTERN, TagMatcher, Transaction, TransactionRow, TransactionType,
};

pub mod accounts;
pub mod budgets;
mod config;
mod csv_source;
mod currency;
mod error;
pub mod ledger;
mod money;
pub mod networth;
mod ops;
mod summary;
mod timeline;
pub mod transactions;
mod util;

pub type ResultEngine<T> = Result<T, EngineError>;
