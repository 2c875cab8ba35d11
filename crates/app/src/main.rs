use std::time::Duration;

use engine::{CsvSource, Engine};
use ledger_client::{ExchangeRatesClient, LedgerClient};
use migration::{Migrator, MigratorTrait};
use settings::{Settings, Task};

use crate::error::Result;

mod error;
mod retry;
mod settings;

#[tokio::main]
async fn main() -> Result<()> {
    let (settings, task) = settings::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "ledger_sync={level},engine={level},ledger_client={level}",
            level = settings.app.level
        ))
        .init();

    let result = run(&settings, &task).await;
    if let Err(err) = &result {
        tracing::error!("ledger_sync failed: {err}");
    }
    result
}

async fn run(settings: &Settings, task: &Task) -> Result<()> {
    let db = connect(&settings.database).await?;
    let engine = Engine::builder()
        .database(db)
        .config(settings.import.clone())
        .build()
        .await?;

    let http = ledger_client::http_client(Duration::from_secs(settings.ledger.timeout_seconds))?;
    let rates = ExchangeRatesClient::new(
        http.clone(),
        &settings.rates.endpoint,
        &settings.rates.access_key,
    );

    match task {
        Task::Ledger => {
            let ledger = LedgerClient::new(http, &settings.ledger.url, &settings.ledger.token);
            sync_ledgers(settings, &engine, &ledger, &rates).await
        }
        Task::Csv { file } => {
            let source = CsvSource::from_path(file, &settings.csv)?;
            let (engine, source, rates) = (&engine, &source, &rates);
            let written = settings
                .app
                .retry_policy()
                .run(move |_| engine.import_csv(source, &settings.csv, rates))
                .await?;
            println!("Wrote {written} transactions from csv file {}", file.display());
            Ok(())
        }
    }
}

/// Import now, then every `update_every_minutes` unless running once.
///
/// The next run is only scheduled after the previous one finished, so runs
/// never overlap.
async fn sync_ledgers(
    settings: &Settings,
    engine: &Engine,
    ledger: &LedgerClient,
    rates: &ExchangeRatesClient,
) -> Result<()> {
    let policy = settings.app.retry_policy();
    loop {
        let outcome = policy
            .run(move |attempt| {
                tracing::info!("starting import (attempt {attempt})");
                engine.run(ledger, rates)
            })
            .await;

        match outcome {
            Ok(summary) => println!("{summary}"),
            Err(err) if !settings.app.single_run => {
                tracing::error!("import failed, waiting for next run: {err}");
            }
            Err(err) => return Err(err.into()),
        }

        if settings.app.single_run {
            return Ok(());
        }
        tokio::time::sleep(settings.app.update_every()).await;
    }
}

async fn connect(database: &settings::Database) -> Result<sea_orm::DatabaseConnection> {
    let db = sea_orm::Database::connect(database.url()).await?;
    Migrator::up(&db, None).await?;
    tracing::info!("database ready");
    Ok(db)
}
