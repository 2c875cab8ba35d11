use chrono::{NaiveDate, Utc};
use sea_orm::DatabaseConnection;

use crate::{
    AccountRow, BudgetConfig, CategoryIndex, CurrencyConversion, CurrencyConverter, EngineError,
    ImportConfig, LedgerEntry, LedgerReport, LedgerSource, RateProvider, ResultEngine,
    RunSummary, TagMatcher,
};

mod accounts;
mod budgets;
mod networth;
mod sink;
mod transactions;

pub use accounts::{AccountRows, reconstruct_accounts};
pub use transactions::ImportContext;

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    config: ImportConfig,
    tags: TagMatcher,
}

/// A configured budget with its ledger id and currency resolved.
#[derive(Clone, Debug)]
pub struct Ledger {
    pub id: String,
    pub name: String,
    pub currency: String,
    pub budget: BudgetConfig,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Import every configured ledger, then net worth.
    pub async fn run<S, P>(&self, source: &S, rates: P) -> ResultEngine<RunSummary>
    where
        S: LedgerSource + Sync,
        P: RateProvider,
    {
        self.run_as_of(source, rates, Utc::now().date_naive()).await
    }

    /// Same as [`run`](Self::run) with open accounts extended through `today`.
    pub async fn run_as_of<S, P>(
        &self,
        source: &S,
        rates: P,
        today: NaiveDate,
    ) -> ResultEngine<RunSummary>
    where
        S: LedgerSource + Sync,
        P: RateProvider,
    {
        let converter = CurrencyConverter::new(rates);
        let ledgers = self.resolve_ledgers(source).await?;
        self.reset_tables().await?;

        let mut summary = RunSummary::default();
        let mut account_rows = Vec::new();
        for ledger in &ledgers {
            let conversions = self.ledger_conversions(&converter, ledger).await?;
            let (report, rows) = self
                .import_ledger(source, ledger, &conversions, today)
                .await?;
            tracing::info!("{report}");
            summary.ledgers.push(report);
            account_rows.extend(rows);
        }

        summary.networth = self.import_net_worth(account_rows).await?;
        tracing::info!("wrote {} networth rows", summary.networth);
        Ok(summary)
    }

    /// Fill in missing ledger ids and currencies from the ledger listing.
    pub async fn resolve_ledgers<S: LedgerSource>(&self, source: &S) -> ResultEngine<Vec<Ledger>> {
        let incomplete = self
            .config
            .budgets
            .iter()
            .any(|budget| budget.id.is_none() || budget.currency.is_none());
        let listed = if incomplete {
            source.list_ledgers().await?
        } else {
            Vec::new()
        };

        self.config
            .budgets
            .iter()
            .map(|budget| {
                let found = listed.iter().find(|summary| match &budget.id {
                    Some(id) => summary.id == *id,
                    None => summary.name == budget.name,
                });
                let id = budget
                    .id
                    .clone()
                    .or_else(|| found.map(|summary| summary.id.clone()))
                    .ok_or_else(|| EngineError::LedgerNotFound(budget.name.clone()))?;
                let currency = budget
                    .currency
                    .clone()
                    .or_else(|| found.map(|summary| summary.currency.clone()))
                    .ok_or_else(|| EngineError::LedgerNotFound(budget.name.clone()))?;
                Ok(Ledger {
                    id,
                    name: budget.name.clone(),
                    currency: currency.to_ascii_uppercase(),
                    budget: budget.clone(),
                })
            })
            .collect()
    }

    /// Configured rates win; the rest are fetched from the provider.
    async fn ledger_conversions<P: RateProvider>(
        &self,
        converter: &CurrencyConverter<P>,
        ledger: &Ledger,
    ) -> ResultEngine<CurrencyConversion> {
        let configured = &ledger.budget.conversions;
        let missing: Vec<String> = self
            .config
            .currencies
            .iter()
            .filter(|currency| configured.get(currency).is_none())
            .cloned()
            .collect();

        let mut conversions = converter
            .generate_currency_conversions(&ledger.currency, &missing)
            .await?;
        for (currency, rate) in configured.iter() {
            conversions.insert(currency, rate);
        }
        Ok(conversions)
    }

    /// Tables rebuilt from scratch every run; `budgets` is kept.
    async fn reset_tables(&self) -> ResultEngine<()> {
        sink::recreate_table(&self.database, crate::transactions::Entity).await?;
        sink::recreate_table(&self.database, crate::accounts::Entity).await?;
        sink::recreate_table(&self.database, crate::networth::Entity).await?;
        Ok(())
    }

    async fn import_ledger<S: LedgerSource>(
        &self,
        source: &S,
        ledger: &Ledger,
        conversions: &CurrencyConversion,
        today: NaiveDate,
    ) -> ResultEngine<(LedgerReport, Vec<AccountRow>)> {
        let categories = CategoryIndex::new(&source.list_categories(&ledger.id).await?);
        let details = source.list_transactions(&ledger.id).await?;
        let accounts = source.list_accounts(&ledger.id).await?;

        let context = ImportContext {
            currency: &ledger.currency,
            conversions,
            import_after: ledger.budget.import_after,
            calculated_fields: &ledger.budget.calculated_fields,
        };
        let entries = details
            .iter()
            .filter(|detail| !detail.deleted)
            .map(|detail| LedgerEntry::new(detail, &categories));
        let transactions = self.import_transactions(entries, &context).await?;

        let reconstructed = reconstruct_accounts(
            &ledger.name,
            &ledger.currency,
            conversions,
            &accounts,
            &details,
            today,
        )?;
        let account_count = self.write_accounts(&reconstructed.rows).await?;

        let budget_count = self
            .import_budgets(source, ledger, &categories, conversions)
            .await?;

        let report = LedgerReport {
            name: ledger.name.clone(),
            transactions,
            accounts: account_count,
            budgets: budget_count,
            reconciliation_warnings: reconstructed.mismatches.len(),
        };
        Ok((report, reconstructed.rows))
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    config: ImportConfig,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    pub fn config(mut self, config: ImportConfig) -> EngineBuilder {
        self.config = config;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        if let Some(budget) = self.config.budgets.iter().find(|b| b.name.trim().is_empty()) {
            return Err(EngineError::InvalidConfig(format!(
                "budget without a name (id {:?})",
                budget.id
            )));
        }
        let tags = if self.config.tags.enabled {
            TagMatcher::new(self.config.tags.regex_match.as_deref())?
        } else {
            TagMatcher::disabled()
        };
        Ok(Engine {
            database: self.database,
            config: self.config,
            tags,
        })
    }
}
