//! Transaction capability set and the `transactions` table.
//!
//! Every source (ledger service, CSV export) implements [`Transaction`]; the
//! normalizer in `ops::transactions` only ever sees the trait.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

/// Memo segments matching this pattern are treated as tags.
pub const DEFAULT_TAG_PATTERN: &str = r"^[A-Za-z0-9]([A-Za-z0-9_-]+)?$";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Expense,
    Income,
    Transfer,
}

impl TransactionType {
    /// A transfer reference always wins; otherwise the sign decides.
    pub fn classify(is_transfer: bool, amount: f64) -> Self {
        if is_transfer {
            Self::Transfer
        } else if amount >= 0.0 {
            Self::Income
        } else {
            Self::Expense
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::Income => "income",
            Self::Transfer => "transfer",
        }
    }
}

impl TryFrom<&str> for TransactionType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "expense" => Ok(Self::Expense),
            "income" => Ok(Self::Income),
            "transfer" => Ok(Self::Transfer),
            other => Err(EngineError::MalformedRecord(format!(
                "invalid transaction type: {other}"
            ))),
        }
    }
}

/// Extracts tags from free-text memos.
#[derive(Clone, Debug)]
pub struct TagMatcher {
    regex: Option<Regex>,
}

impl TagMatcher {
    /// Build a matcher; `None` uses [`DEFAULT_TAG_PATTERN`].
    pub fn new(pattern: Option<&str>) -> ResultEngine<Self> {
        let pattern = pattern.unwrap_or(DEFAULT_TAG_PATTERN);
        let regex = Regex::new(pattern)
            .map_err(|err| EngineError::InvalidConfig(format!("tag regex: {err}")))?;
        Ok(Self { regex: Some(regex) })
    }

    /// A matcher that never yields tags.
    pub fn disabled() -> Self {
        Self { regex: None }
    }

    /// Split on commas, trim and lowercase, keep identifier-like segments.
    pub fn extract(&self, memo: &str) -> Vec<String> {
        let Some(regex) = &self.regex else {
            return Vec::new();
        };
        memo.split(',')
            .map(|segment| segment.trim().to_lowercase())
            .filter(|segment| regex.is_match(segment))
            .collect()
    }
}

impl Default for TagMatcher {
    fn default() -> Self {
        Self {
            regex: Regex::new(DEFAULT_TAG_PATTERN).ok(),
        }
    }
}

/// A financial transaction as exposed by any source.
pub trait Transaction {
    /// Raw `YYYY-MM-DD` date as reported by the source.
    fn date(&self) -> &str;
    fn payee(&self) -> &str;
    fn category(&self) -> &str;
    fn category_group(&self) -> &str;
    fn memo(&self) -> &str;
    /// Signed amount in major units of the ledger currency.
    fn amount(&self) -> f64;
    fn transaction_type(&self) -> TransactionType;

    fn tags(&self, matcher: &TagMatcher) -> Vec<String> {
        matcher.extract(self.memo())
    }

    /// Split children; they inherit date and account from their parent.
    fn sub_transactions(&self) -> Vec<Box<dyn Transaction + '_>> {
        Vec::new()
    }

    fn has_sub_transactions(&self) -> bool {
        !self.sub_transactions().is_empty()
    }

    fn account(&self) -> &str;

    /// Stable natural key: importing the same logical transaction twice
    /// yields the same key.
    fn index_key(&self) -> String;
}

/// One normalized row of the `transactions` table.
#[derive(Clone, Debug, PartialEq)]
pub struct TransactionRow {
    pub key: String,
    pub transaction_date: NaiveDate,
    pub transaction_month: NaiveDate,
    pub category: String,
    pub category_group: String,
    pub payee: String,
    pub account: String,
    pub memo: String,
    pub currency: String,
    pub amount: f64,
    pub conversions: BTreeMap<String, f64>,
    pub transaction_type: TransactionType,
    pub tags: Vec<String>,
    pub fields: BTreeMap<String, bool>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,
    pub transaction_date: Date,
    pub transaction_month: Date,
    pub category: String,
    pub category_group: String,
    pub payee: String,
    pub account: String,
    #[sea_orm(column_type = "Text")]
    pub memo: String,
    pub currency: String,
    #[sea_orm(column_type = "Double")]
    pub amount: f64,
    pub conversions: Json,
    pub transaction_type: String,
    pub tags: Json,
    pub fields: Json,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&TransactionRow> for ActiveModel {
    fn from(row: &TransactionRow) -> Self {
        Self {
            key: ActiveValue::Set(row.key.clone()),
            transaction_date: ActiveValue::Set(row.transaction_date),
            transaction_month: ActiveValue::Set(row.transaction_month),
            category: ActiveValue::Set(row.category.clone()),
            category_group: ActiveValue::Set(row.category_group.clone()),
            payee: ActiveValue::Set(row.payee.clone()),
            account: ActiveValue::Set(row.account.clone()),
            memo: ActiveValue::Set(row.memo.clone()),
            currency: ActiveValue::Set(row.currency.clone()),
            amount: ActiveValue::Set(row.amount),
            conversions: ActiveValue::Set(serde_json::json!(row.conversions)),
            transaction_type: ActiveValue::Set(row.transaction_type.as_str().to_string()),
            tags: ActiveValue::Set(serde_json::json!(row.tags)),
            fields: ActiveValue::Set(serde_json::json!(row.fields)),
            updated_at: ActiveValue::Set(row.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_reference_wins_over_sign() {
        assert_eq!(TransactionType::classify(true, -42.0), TransactionType::Transfer);
        assert_eq!(TransactionType::classify(true, 42.0), TransactionType::Transfer);
        assert_eq!(TransactionType::classify(false, 0.0), TransactionType::Income);
        assert_eq!(TransactionType::classify(false, -0.01), TransactionType::Expense);
    }

    #[test]
    fn extracts_identifier_tags_only() {
        let matcher = TagMatcher::new(None).unwrap();

        assert_eq!(
            matcher.extract("Coffee, NOT-A-TAG!!, valid_tag"),
            vec!["coffee".to_string(), "valid_tag".to_string()]
        );
        assert!(matcher.extract("").is_empty());
        assert!(matcher.extract("dinner with friends").is_empty());
    }

    #[test]
    fn custom_and_disabled_matchers() {
        let matcher = TagMatcher::new(Some("^#?[a-z]+$")).unwrap();
        assert_eq!(matcher.extract("#trip, Work"), vec!["#trip", "work"]);

        assert!(TagMatcher::disabled().extract("coffee").is_empty());
        assert!(TagMatcher::new(Some("(")).is_err());
    }
}
