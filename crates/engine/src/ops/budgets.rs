use crate::{
    BudgetRow, CurrencyConversion, LedgerSource, ResultEngine, budgets,
    budgets::budget_rows,
    ledger::CategoryIndex,
};

use super::{Engine, Ledger, sink};

impl Engine {
    /// Upsert the category-month rows of one ledger.
    ///
    /// The `budgets` table is kept between runs, so months the ledger no
    /// longer reports stay in place.
    pub(crate) async fn import_budgets<S: LedgerSource>(
        &self,
        source: &S,
        ledger: &Ledger,
        categories: &CategoryIndex,
        conversions: &CurrencyConversion,
    ) -> ResultEngine<usize> {
        let months = source.list_months(&ledger.id).await?;
        let rows: Vec<BudgetRow> = budget_rows(
            &ledger.name,
            &ledger.currency,
            conversions,
            &ledger.budget.calculated_fields,
            categories,
            &months,
        )?;

        sink::ensure_table(&self.database, budgets::Entity).await?;
        sink::upsert_batched::<budgets::Entity, budgets::ActiveModel, _>(
            &self.database,
            "budgets",
            budgets::Column::Key,
            &rows,
            self.config.effective_batch_size(),
        )
        .await
    }
}
