//! Import configuration.
//!
//! The configuration is built once at startup (see the `ledger_sync` binary)
//! and handed to [`Engine::builder`](crate::Engine::builder); nothing in the
//! engine reads global state.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::{CurrencyConversion, util::contains};

/// Default number of rows per upsert statement.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Settings shared by every ledger of a run.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Target currencies every amount is converted into.
    pub currencies: Vec<String>,
    pub budgets: Vec<BudgetConfig>,
    pub tags: TagConfig,
    pub batch_size: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            currencies: vec!["USD".to_string(), "CAD".to_string()],
            budgets: Vec::new(),
            tags: TagConfig::default(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl ImportConfig {
    /// Batch size with `0` meaning "use the default".
    pub fn effective_batch_size(&self) -> usize {
        if self.batch_size == 0 {
            DEFAULT_BATCH_SIZE
        } else {
            self.batch_size
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TagConfig {
    pub enabled: bool,
    /// Overrides [`DEFAULT_TAG_PATTERN`](crate::DEFAULT_TAG_PATTERN).
    pub regex_match: Option<String>,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            regex_match: None,
        }
    }
}

/// One ledger to import.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub name: String,
    /// Resolved by name through the ledger service when absent.
    pub id: Option<String>,
    /// Defaults to the ledger's own currency.
    pub currency: Option<String>,
    /// Transactions dated strictly before this day are skipped.
    pub import_after: Option<NaiveDate>,
    /// Fixed rates that take precedence over the rate provider.
    pub conversions: CurrencyConversion,
    pub calculated_fields: Vec<CalculatedField>,
}

/// A derived boolean column.
///
/// The field is `true` when the category, the category group or the payee
/// is listed, then flipped when `inverted` is set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CalculatedField {
    pub name: String,
    pub category: Vec<String>,
    pub category_group: Vec<String>,
    pub payee: Vec<String>,
    pub inverted: bool,
}

impl CalculatedField {
    /// Evaluate the field. Budget rows have no payee and pass `None`.
    pub fn evaluate(&self, category: &str, category_group: &str, payee: Option<&str>) -> bool {
        let matched = contains(&self.category, category)
            || contains(&self.category_group, category_group)
            || payee.is_some_and(|payee| contains(&self.payee, payee));

        matched != self.inverted
    }
}

/// Settings for importing a CSV export instead of the ledger service.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CsvImportConfig {
    /// Currency the CSV amounts are expressed in.
    pub currency: String,
    pub import_after: Option<NaiveDate>,
    pub calculated_fields: Vec<CalculatedField>,
    /// Maps logical column names (`date`, `payee`, ...) to CSV header names.
    pub column_translation: HashMap<String, String>,
}

impl Default for CsvImportConfig {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
            import_after: None,
            calculated_fields: Vec::new(),
            column_translation: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rent(inverted: bool) -> CalculatedField {
        CalculatedField {
            name: "fixed_cost".to_string(),
            category: vec!["Rent".to_string()],
            inverted,
            ..Default::default()
        }
    }

    #[test]
    fn matches_any_list() {
        let field = CalculatedField {
            name: "fun".to_string(),
            category_group: vec!["Wants".to_string()],
            payee: vec!["Cinema".to_string()],
            ..Default::default()
        };

        assert!(field.evaluate("Movies", "Wants", Some("Somewhere")));
        assert!(field.evaluate("Other", "Needs", Some("Cinema")));
        assert!(!field.evaluate("Other", "Needs", Some("Grocer")));
        assert!(!field.evaluate("Other", "Needs", None));
    }

    #[test]
    fn inverted_field_flips_membership() {
        assert!(!rent(true).evaluate("Rent", "Housing", Some("Landlord")));
        assert!(rent(true).evaluate("Groceries", "Food", Some("Grocer")));
        assert!(rent(false).evaluate("Rent", "Housing", None));
    }

    #[test]
    fn zero_batch_size_uses_default() {
        let config = ImportConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert_eq!(config.effective_batch_size(), DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn deserializes_budget_with_cutoff() {
        let budget: BudgetConfig = serde_json::from_value(serde_json::json!({
            "name": "Household",
            "import_after": "2023-01-01",
            "conversions": { "USD": 1.0 },
            "calculated_fields": [{ "name": "fixed_cost", "category": ["Rent"] }]
        }))
        .unwrap();

        assert_eq!(budget.import_after, NaiveDate::from_ymd_opt(2023, 1, 1));
        assert_eq!(budget.conversions.get("USD"), Some(1.0));
        assert_eq!(budget.calculated_fields[0].category, vec!["Rent".to_string()]);
    }
}
