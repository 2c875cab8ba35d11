use chrono::{DateTime, NaiveDate, Utc};

use crate::{
    CalculatedField, CsvImportConfig, CsvSource, CurrencyConversion, CurrencyConverter,
    RateProvider, ResultEngine, TagMatcher, Transaction, TransactionRow, transactions,
    util::{month_start, parse_date},
};

use super::{Engine, sink};

/// Per-source settings of a transaction import.
#[derive(Clone, Copy, Debug)]
pub struct ImportContext<'a> {
    /// Currency the source amounts are expressed in.
    pub currency: &'a str,
    pub conversions: &'a CurrencyConversion,
    /// Transactions dated strictly before this day are skipped.
    pub import_after: Option<NaiveDate>,
    pub calculated_fields: &'a [CalculatedField],
}

impl Engine {
    /// Normalize `transactions` and upsert them into the `transactions` table.
    ///
    /// Returns the number of rows written. Splits are flattened into one row
    /// per child, so the count can exceed the number of inputs.
    pub async fn import_transactions<T: Transaction>(
        &self,
        transactions: impl IntoIterator<Item = T>,
        context: &ImportContext<'_>,
    ) -> ResultEngine<usize> {
        let rows = normalize(transactions, context, &self.tags, Utc::now())?;
        sink::upsert_batched::<transactions::Entity, transactions::ActiveModel, _>(
            &self.database,
            "transactions",
            transactions::Column::Key,
            &rows,
            self.config.effective_batch_size(),
        )
        .await
    }

    /// Replace the `transactions` table with the content of a CSV export.
    pub async fn import_csv<P: RateProvider>(
        &self,
        source: &CsvSource,
        config: &CsvImportConfig,
        rates: P,
    ) -> ResultEngine<usize> {
        let converter = CurrencyConverter::new(rates);
        let conversions = converter
            .generate_currency_conversions(&config.currency, &self.config.currencies)
            .await?;

        sink::recreate_table(&self.database, transactions::Entity).await?;
        let context = ImportContext {
            currency: &config.currency,
            conversions: &conversions,
            import_after: config.import_after,
            calculated_fields: &config.calculated_fields,
        };
        let written = self.import_transactions(source.transactions(), &context).await?;
        tracing::info!("wrote {written} transactions from csv");
        Ok(written)
    }
}

/// Map every transaction (and split child) onto a [`TransactionRow`].
pub(crate) fn normalize<T: Transaction>(
    transactions: impl IntoIterator<Item = T>,
    context: &ImportContext<'_>,
    tags: &TagMatcher,
    updated_at: DateTime<Utc>,
) -> ResultEngine<Vec<TransactionRow>> {
    let mut rows = Vec::new();
    for transaction in transactions {
        normalize_into(&transaction, context, tags, updated_at, &mut rows)?;
    }
    Ok(rows)
}

fn normalize_into(
    transaction: &dyn Transaction,
    context: &ImportContext<'_>,
    tags: &TagMatcher,
    updated_at: DateTime<Utc>,
    rows: &mut Vec<TransactionRow>,
) -> ResultEngine<()> {
    let date = parse_date(transaction.date())?;
    if context.import_after.is_some_and(|cutoff| date < cutoff) {
        return Ok(());
    }

    if transaction.has_sub_transactions() {
        for split in transaction.sub_transactions() {
            normalize_into(split.as_ref(), context, tags, updated_at, rows)?;
        }
        return Ok(());
    }

    let category = transaction.category();
    let category_group = transaction.category_group();
    let payee = transaction.payee();
    let amount = transaction.amount();

    rows.push(TransactionRow {
        key: transaction.index_key(),
        transaction_date: date,
        transaction_month: month_start(date),
        category: category.to_string(),
        category_group: category_group.to_string(),
        payee: payee.to_string(),
        account: transaction.account().to_string(),
        memo: transaction.memo().to_string(),
        currency: context.currency.to_string(),
        amount,
        conversions: context.conversions.convert(amount),
        transaction_type: transaction.transaction_type(),
        tags: transaction.tags(tags),
        fields: context
            .calculated_fields
            .iter()
            .map(|field| {
                let value = field.evaluate(category, category_group, Some(payee));
                (field.name.clone(), value)
            })
            .collect(),
        updated_at,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        CategoryIndex, EngineError, LedgerEntry, TransactionType, ledger::TransactionDetail,
    };

    fn details() -> Vec<TransactionDetail> {
        serde_json::from_value(serde_json::json!([
            { "id": "t-old", "date": "2022-12-31", "amount": -1000, "account_id": "a",
              "account_name": "Checking", "payee_name": "Cafe" },
            { "id": "t-rent", "date": "2023-01-01", "amount": -1200000, "account_id": "a",
              "account_name": "Checking", "payee_name": "Landlord", "category_name": "Rent",
              "memo": "home, Fixed" },
            { "id": "t-split", "date": "2023-01-15", "amount": -30000, "account_id": "a",
              "account_name": "Checking", "payee_name": "Market",
              "subtransactions": [
                  { "id": "s-1", "amount": -20000, "category_name": "Groceries" },
                  { "id": "s-2", "amount": -10000, "category_name": "Rent" }
              ] }
        ]))
        .unwrap()
    }

    fn conversions() -> CurrencyConversion {
        [("USD".to_string(), 1.0), ("CAD".to_string(), 1.35)]
            .into_iter()
            .collect()
    }

    fn rent_field() -> Vec<CalculatedField> {
        vec![CalculatedField {
            name: "fixed_cost".to_string(),
            category: vec!["Rent".to_string()],
            ..Default::default()
        }]
    }

    #[test]
    fn skips_before_cutoff_and_flattens_splits() {
        let details = details();
        let index = CategoryIndex::default();
        let conversions = conversions();
        let fields = rent_field();
        let context = ImportContext {
            currency: "USD",
            conversions: &conversions,
            import_after: NaiveDate::from_ymd_opt(2023, 1, 1),
            calculated_fields: &fields,
        };

        let rows = normalize(
            details.iter().map(|d| LedgerEntry::new(d, &index)),
            &context,
            &TagMatcher::default(),
            Utc::now(),
        )
        .unwrap();

        let keys: Vec<_> = rows.iter().map(|row| row.key.as_str()).collect();
        assert_eq!(keys, vec!["t-rent", "s-1", "s-2"]);

        let rent = &rows[0];
        assert_eq!(rent.transaction_month, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        assert_eq!(rent.amount, -1200.0);
        assert_eq!(rent.conversions["CAD"], -1620.0);
        assert_eq!(rent.transaction_type, TransactionType::Expense);
        assert_eq!(rent.tags, vec!["home", "fixed"]);
        assert_eq!(rent.fields["fixed_cost"], true);

        let groceries = &rows[1];
        assert_eq!(groceries.payee, "Market");
        assert_eq!(groceries.transaction_date, NaiveDate::from_ymd_opt(2023, 1, 15).unwrap());
        assert_eq!(groceries.fields["fixed_cost"], false);
        assert_eq!(rows[2].fields["fixed_cost"], true);
    }

    #[test]
    fn malformed_date_aborts() {
        let mut details = details();
        details[1].date = "01/01/2023".to_string();
        let index = CategoryIndex::default();
        let conversions = conversions();
        let context = ImportContext {
            currency: "USD",
            conversions: &conversions,
            import_after: None,
            calculated_fields: &[],
        };

        let err = normalize(
            details.iter().map(|d| LedgerEntry::new(d, &index)),
            &context,
            &TagMatcher::disabled(),
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, EngineError::MalformedDate("01/01/2023".to_string()));
    }
}
