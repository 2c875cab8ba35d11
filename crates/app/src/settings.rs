//! Settings of the `ledger_sync` binary.
//!
//! Values come from an optional config file (`config/ledger_sync.{toml,yaml,json}`
//! by default), then from `LEDGER_SYNC_*` environment variables (nested keys
//! joined with `__`, e.g. `LEDGER_SYNC_LEDGER__TOKEN`), then from the command
//! line.

use std::{path::PathBuf, time::Duration};

use clap::{Parser, Subcommand};
use serde::Deserialize;

use engine::{CsvImportConfig, ImportConfig};
use ledger_client::{DEFAULT_LEDGER_URL, DEFAULT_RATES_URL};

use crate::{
    error::{AppError, Result},
    retry::RetryPolicy,
};

const DEFAULT_CONFIG_PATH: &str = "config/ledger_sync";
const ENV_PREFIX: &str = "LEDGER_SYNC";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
    Postgres(String),
}

impl Database {
    pub fn url(&self) -> String {
        match self {
            Database::Memory => String::from("sqlite::memory:"),
            Database::Sqlite(path) => format!("sqlite:{path}?mode=rwc"),
            Database::Postgres(url) => url.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct App {
    pub level: String,
    pub update_every_minutes: u64,
    pub single_run: bool,
    pub max_attempts: u32,
    pub backoff_seconds: u64,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            update_every_minutes: 60,
            single_run: false,
            max_attempts: 3,
            backoff_seconds: 0,
        }
    }
}

impl App {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: Duration::from_secs(self.backoff_seconds),
        }
    }

    pub fn update_every(&self) -> Duration {
        Duration::from_secs(self.update_every_minutes.max(1) * 60)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Ledger {
    pub url: String,
    pub token: String,
    pub timeout_seconds: u64,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            url: DEFAULT_LEDGER_URL.to_string(),
            token: String::new(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Rates {
    pub endpoint: String,
    pub access_key: String,
}

impl Default for Rates {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_RATES_URL.to_string(),
            access_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    pub database: Database,
    #[serde(default)]
    pub ledger: Ledger,
    #[serde(default)]
    pub rates: Rates,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub csv: CsvImportConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Task {
    /// Import every configured ledger from the budgeting service.
    Ledger,
    /// Replace the transactions table with a CSV export.
    Csv { file: PathBuf },
}

#[derive(Debug, Parser)]
#[command(name = "ledger_sync", version)]
pub struct Args {
    /// Optional config file path (extension picks the format).
    #[arg(long)]
    config: Option<String>,
    /// Run once and exit instead of every `update_every_minutes`.
    #[arg(long)]
    single_run: bool,
    /// Override the log level.
    #[arg(long)]
    level: Option<String>,
    #[command(subcommand)]
    task: Option<Task>,
}

impl Settings {
    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        let settings: Settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.app.level.trim().is_empty() {
            return Err(AppError::Settings("app.level must not be empty".to_string()));
        }
        if self.import.currencies.is_empty() {
            return Err(AppError::Settings(
                "import.currencies must list at least one currency".to_string(),
            ));
        }
        Ok(())
    }

    fn apply(mut self, args: &Args) -> Self {
        if args.single_run {
            self.app.single_run = true;
        }
        if let Some(level) = &args.level {
            self.app.level = level.clone();
        }
        self
    }
}

/// Parse the command line and load the settings it points at.
pub fn load() -> Result<(Settings, Task)> {
    let args = Args::parse();
    let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    let builder = config::Config::builder()
        .add_source(config::File::with_name(config_path).required(args.config.is_some()));
    let settings = Settings::from_builder(builder)?.apply(&args);
    Ok((settings, args.task.clone().unwrap_or(Task::Ledger)))
}
