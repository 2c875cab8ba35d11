//! Transactions exported to a CSV file.
//!
//! Header names are matched case-insensitively, after applying the
//! configured column translation. Expected logical columns: `date`, `payee`,
//! `category`, `category group` (or `master group`), `memo`, `amount`,
//! `account` and the optional `tags`.

use std::{collections::HashMap, io, path::Path};

use crate::{
    CsvImportConfig, EngineError, ResultEngine, TagMatcher, Transaction, TransactionType,
};

/// A loaded CSV export.
#[derive(Clone, Debug)]
pub struct CsvSource {
    headers: HashMap<String, usize>,
    translation: HashMap<String, String>,
    records: Vec<csv::StringRecord>,
    amounts: Vec<f64>,
    keys: Vec<String>,
}

impl CsvSource {
    pub fn from_path(path: impl AsRef<Path>, config: &CsvImportConfig) -> ResultEngine<Self> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)?;
        Self::load(reader, config)
    }

    pub fn from_reader<R: io::Read>(reader: R, config: &CsvImportConfig) -> ResultEngine<Self> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        Self::load(reader, config)
    }

    fn load<R: io::Read>(
        mut reader: csv::Reader<R>,
        config: &CsvImportConfig,
    ) -> ResultEngine<Self> {
        let headers = reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(index, name)| (name.to_lowercase(), index))
            .collect();
        let translation = config
            .column_translation
            .iter()
            .map(|(logical, header)| (logical.to_lowercase(), header.to_lowercase()))
            .collect();

        let mut source = Self {
            headers,
            translation,
            records: Vec::new(),
            amounts: Vec::new(),
            keys: Vec::new(),
        };
        if source.column_index("amount").is_none() {
            return Err(EngineError::MalformedRecord(
                "missing amount column".to_string(),
            ));
        }

        let mut seen: HashMap<String, usize> = HashMap::new();
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            let raw = source.field(&record, "amount").unwrap_or_default();
            let amount = raw.parse::<f64>().map_err(|_| {
                // Header is line 1.
                EngineError::MalformedRecord(format!("line {}: invalid amount \"{raw}\"", line + 2))
            })?;
            let key = source.natural_key(&record);
            let occurrence = seen.entry(key.clone()).or_default();
            *occurrence += 1;
            // Identical lines are distinct purchases; later ones get a suffix.
            source.keys.push(if *occurrence == 1 {
                key
            } else {
                format!("{key}::{occurrence}")
            });
            source.amounts.push(amount);
            source.records.push(record);
        }

        tracing::debug!("loaded {} csv records", source.records.len());
        Ok(source)
    }

    fn column_index(&self, column: &str) -> Option<usize> {
        let header = self
            .translation
            .get(column)
            .map(String::as_str)
            .unwrap_or(column);
        self.headers.get(header).copied()
    }

    fn natural_key(&self, record: &csv::StringRecord) -> String {
        let get = |column: &str| self.field(record, column).unwrap_or_default();
        format!(
            "csv::{}::{}::{}::{}",
            get("date"),
            get("account"),
            get("amount"),
            get("payee")
        )
    }

    fn field<'r>(&self, record: &'r csv::StringRecord, column: &str) -> Option<&'r str> {
        self.column_index(column).and_then(|index| record.get(index))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn transactions(&self) -> impl Iterator<Item = CsvTransaction<'_>> {
        (0..self.records.len()).map(|index| CsvTransaction {
            source: self,
            index,
        })
    }
}

/// One record of a [`CsvSource`].
#[derive(Clone, Copy, Debug)]
pub struct CsvTransaction<'a> {
    source: &'a CsvSource,
    index: usize,
}

impl<'a> CsvTransaction<'a> {
    fn get(&self, column: &str) -> &'a str {
        self.source
            .field(&self.source.records[self.index], column)
            .unwrap_or_default()
    }
}

impl Transaction for CsvTransaction<'_> {
    fn date(&self) -> &str {
        self.get("date")
    }

    fn payee(&self) -> &str {
        self.get("payee")
    }

    fn category(&self) -> &str {
        self.get("category")
    }

    fn category_group(&self) -> &str {
        if self.source.column_index("category group").is_some() {
            self.get("category group")
        } else {
            self.get("master group")
        }
    }

    fn memo(&self) -> &str {
        self.get("memo")
    }

    fn amount(&self) -> f64 {
        self.source.amounts[self.index]
    }

    fn transaction_type(&self) -> TransactionType {
        let is_transfer = self.payee().to_lowercase().contains("transfer");
        TransactionType::classify(is_transfer, self.amount())
    }

    /// An explicit `tags` column wins over memo tags.
    fn tags(&self, matcher: &TagMatcher) -> Vec<String> {
        let explicit = self.get("tags");
        if explicit.is_empty() {
            return matcher.extract(self.memo());
        }
        explicit
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(ToString::to_string)
            .collect()
    }

    fn account(&self) -> &str {
        self.get("account")
    }

    fn index_key(&self) -> String {
        self.source.keys[self.index].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "\
Date,Payee,Category,Master Group,Memo,Amount,Account,Tags
2024-01-03,Grocer,Groceries,Food,\"weekly, Food\",-54.20,Visa,
2024-01-04,Transfer : Savings,,,,250,Checking,
2024-01-05,Employer,Salary,Income,,3000,Checking,\"work, monthly\"
";

    fn load(data: &str, config: &CsvImportConfig) -> CsvSource {
        CsvSource::from_reader(data.as_bytes(), config).unwrap()
    }

    #[test]
    fn reads_case_insensitive_headers() {
        let source = load(EXPORT, &CsvImportConfig::default());
        let rows: Vec<_> = source.transactions().collect();

        assert_eq!(source.len(), 3);
        let grocer = &rows[0];
        assert_eq!(grocer.date(), "2024-01-03");
        assert_eq!(grocer.category(), "Groceries");
        assert_eq!(grocer.category_group(), "Food");
        assert_eq!(grocer.amount(), -54.2);
        assert_eq!(grocer.transaction_type(), TransactionType::Expense);
        assert_eq!(grocer.index_key(), "csv::2024-01-03::Visa::-54.20::Grocer");
    }

    #[test]
    fn repeated_lines_get_distinct_keys() {
        let data = "\
date,payee,amount,account
2024-01-02,Cafe,-4.5,Visa
2024-01-02,Cafe,-4.5,Visa
2024-01-02,Cafe,-4.5,Visa
2024-01-03,Cafe,-4.5,Visa
";
        let source = load(data, &CsvImportConfig::default());
        let keys: Vec<_> = source.transactions().map(|row| row.index_key()).collect();

        assert_eq!(
            keys,
            vec![
                "csv::2024-01-02::Visa::-4.5::Cafe",
                "csv::2024-01-02::Visa::-4.5::Cafe::2",
                "csv::2024-01-02::Visa::-4.5::Cafe::3",
                "csv::2024-01-03::Visa::-4.5::Cafe",
            ]
        );
    }

    #[test]
    fn tags_column_overrides_memo() {
        let source = load(EXPORT, &CsvImportConfig::default());
        let rows: Vec<_> = source.transactions().collect();
        let matcher = TagMatcher::default();

        assert_eq!(rows[0].tags(&matcher), vec!["weekly", "food"]);
        assert_eq!(rows[2].tags(&matcher), vec!["work", "monthly"]);
    }

    #[test]
    fn transfer_payee_wins_over_sign() {
        let source = load(EXPORT, &CsvImportConfig::default());
        let transfer = source.transactions().nth(1).unwrap();

        assert_eq!(transfer.transaction_type(), TransactionType::Transfer);
    }

    #[test]
    fn translated_columns() {
        let data = "When,Who,Value,Wallet\n2024-02-01,Cafe,-3.5,Cash\n";
        let config = CsvImportConfig {
            column_translation: HashMap::from([
                ("date".to_string(), "When".to_string()),
                ("payee".to_string(), "Who".to_string()),
                ("amount".to_string(), "Value".to_string()),
                ("account".to_string(), "wallet".to_string()),
            ]),
            ..Default::default()
        };
        let source = load(data, &config);
        let row = source.transactions().next().unwrap();

        assert_eq!(row.date(), "2024-02-01");
        assert_eq!(row.payee(), "Cafe");
        assert_eq!(row.account(), "Cash");
        assert_eq!(row.amount(), -3.5);
        assert_eq!(row.category_group(), "");
    }

    #[test]
    fn rejects_unparsable_amount() {
        let data = "date,amount\n2024-02-01,12.00\n2024-02-02,twelve\n";
        let err = CsvSource::from_reader(data.as_bytes(), &CsvImportConfig::default()).unwrap_err();

        assert_eq!(
            err,
            EngineError::MalformedRecord("line 3: invalid amount \"twelve\"".to_string())
        );
    }

    #[test]
    fn rejects_missing_amount_column() {
        let data = "date,payee\n2024-02-01,Cafe\n";
        assert!(CsvSource::from_reader(data.as_bytes(), &CsvImportConfig::default()).is_err());
    }
}
