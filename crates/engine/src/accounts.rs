//! Daily account balances and the `accounts` table.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use sea_orm::{ActiveValue, entity::prelude::*};

use crate::{
    CurrencyConversion, Milliunits, ResultEngine,
    ledger::Account,
    timeline::{DailyRow, Timeline},
    util::{CENT, round_to},
};

/// Balance of one account at the end of one day.
#[derive(Clone, Debug, PartialEq)]
pub struct AccountRow {
    /// `MM-DD-YYYY::budgetName::accountName`, with `::accountId` appended
    /// when the ledger has several accounts of that name.
    pub key: String,
    pub date: NaiveDate,
    pub name: String,
    pub currency: String,
    pub budget_name: String,
    pub on_budget: bool,
    pub account_type: String,
    pub balance: Milliunits,
    pub conversions: BTreeMap<String, f64>,
}

impl DailyRow for AccountRow {
    fn day(&self) -> NaiveDate {
        self.date
    }
}

pub fn account_key(date: NaiveDate, budget_name: &str, account_name: &str) -> String {
    format!("{}::{budget_name}::{account_name}", date.format("%m-%d-%Y"))
}

/// Reconstructed balance disagreeing with the ledger's reported balance.
///
/// Logged as a warning; it never blocks the write.
#[derive(Clone, Debug, PartialEq)]
pub struct ReconciliationMismatch {
    pub budget_name: String,
    pub account: String,
    pub expected: f64,
    pub actual: f64,
}

/// Columns shared by every row of one account.
#[derive(Clone, Debug)]
struct RowTemplate {
    name: String,
    key_name: String,
    account_type: String,
    on_budget: bool,
    currency: String,
    budget_name: String,
    conversions: CurrencyConversion,
}

impl RowTemplate {
    /// Start `day` with the previous day's closing balance.
    fn next(&self, day: NaiveDate, last: Option<&AccountRow>) -> AccountRow {
        let balance = last.map_or(Milliunits::ZERO, |row| row.balance);
        AccountRow {
            key: account_key(day, &self.budget_name, &self.key_name),
            date: day,
            name: self.name.clone(),
            currency: self.currency.clone(),
            budget_name: self.budget_name.clone(),
            on_budget: self.on_budget,
            account_type: self.account_type.clone(),
            balance,
            conversions: self.conversions.convert(balance.to_major()),
        }
    }
}

/// Builds the daily rows of one account from its transactions.
#[derive(Clone, Debug)]
pub struct AccountTimeline {
    id: String,
    template: RowTemplate,
    closed: bool,
    reported_balance: Milliunits,
    timeline: Timeline<AccountRow>,
}

impl AccountTimeline {
    pub fn new(
        account: &Account,
        budget_name: &str,
        currency: &str,
        conversions: &CurrencyConversion,
    ) -> Self {
        Self {
            id: account.id.clone(),
            template: RowTemplate {
                name: account.name.clone(),
                key_name: account.name.clone(),
                account_type: account.account_type.clone(),
                on_budget: account.on_budget,
                currency: currency.to_string(),
                budget_name: budget_name.to_string(),
                conversions: conversions.clone(),
            },
            closed: account.closed,
            reported_balance: account.balance,
            timeline: Timeline::new(),
        }
    }

    /// Key the rows by name and account id, for ledgers that reuse a name.
    ///
    /// Must be called before the first [`append`](Self::append).
    pub fn keyed_by_id(mut self) -> Self {
        self.template.key_name = format!("{}::{}", self.template.name, self.id);
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Apply a transaction amount to the row of `date`.
    ///
    /// Dates must not go backwards between calls.
    pub fn append(&mut self, date: NaiveDate, amount: Milliunits) -> ResultEngine<()> {
        let template = &self.template;
        let row = self
            .timeline
            .day_mut(date, |day, last| template.next(day, last))?;
        row.balance += amount;
        row.conversions = template.conversions.convert(row.balance.to_major());
        Ok(())
    }

    /// Carry the final balance forward through `end`.
    pub fn extend_through(&mut self, end: NaiveDate) -> ResultEngine<()> {
        let template = &self.template;
        self.timeline
            .extend_through(end, |day, last| template.next(day, last))
    }

    /// Compare the last synthesized balance with the reported one.
    pub fn reconcile(&self) -> Option<ReconciliationMismatch> {
        let last = self
            .timeline
            .last()
            .map_or(Milliunits::ZERO, |row| row.balance);
        let actual = round_to(last.to_major(), CENT);
        let expected = round_to(self.reported_balance.to_major(), CENT);
        if (actual - expected).abs() < CENT / 2.0 {
            return None;
        }
        Some(ReconciliationMismatch {
            budget_name: self.template.budget_name.clone(),
            account: self.template.name.clone(),
            expected,
            actual,
        })
    }

    pub fn rows(&self) -> &[AccountRow] {
        self.timeline.rows()
    }

    pub fn into_rows(self) -> Vec<AccountRow> {
        self.timeline.into_rows()
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,
    pub date: Date,
    pub name: String,
    pub currency: String,
    pub budget_name: String,
    pub on_budget: bool,
    #[sea_orm(column_name = "type")]
    pub account_type: String,
    #[sea_orm(column_type = "Double")]
    pub balance: f64,
    pub conversions: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&AccountRow> for ActiveModel {
    fn from(row: &AccountRow) -> Self {
        Self {
            key: ActiveValue::Set(row.key.clone()),
            date: ActiveValue::Set(row.date),
            name: ActiveValue::Set(row.name.clone()),
            currency: ActiveValue::Set(row.currency.clone()),
            budget_name: ActiveValue::Set(row.budget_name.clone()),
            on_budget: ActiveValue::Set(row.on_budget),
            account_type: ActiveValue::Set(row.account_type.clone()),
            balance: ActiveValue::Set(round_to(row.balance.to_major(), CENT)),
            conversions: ActiveValue::Set(serde_json::json!(row.conversions)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(balance: i64, closed: bool) -> Account {
        Account {
            id: "acc-1".to_string(),
            name: "testing".to_string(),
            account_type: "checking".to_string(),
            on_budget: true,
            closed,
            balance: Milliunits::new(balance),
            deleted: false,
        }
    }

    fn conversions() -> CurrencyConversion {
        [("USD".to_string(), 1.0), ("CAD".to_string(), 1.3)]
            .into_iter()
            .collect()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn timeline(balance: i64) -> AccountTimeline {
        let mut timeline = AccountTimeline::new(&account(balance, false), "main", "USD", &conversions());
        timeline.append(day(1), Milliunits::new(100_000)).unwrap();
        timeline.append(day(10), Milliunits::new(500_000)).unwrap();
        timeline.append(day(15), Milliunits::new(400_000)).unwrap();
        timeline
    }

    #[test]
    fn conserves_balance_between_events() {
        let timeline = timeline(1_000_000);
        let rows = timeline.rows();

        assert_eq!(rows.len(), 15);
        assert_eq!(rows[0].balance.to_major(), 100.0);
        assert_eq!(rows[2].balance.to_major(), 100.0);
        assert_eq!(rows[9].balance.to_major(), 600.0);
        assert_eq!(rows[11].balance.to_major(), 600.0);
        assert_eq!(rows[14].balance.to_major(), 1000.0);
        assert_eq!(rows[14].conversions["CAD"], 1300.0);
        assert_eq!(rows[2].key, "01-03-2024::main::testing");
    }

    #[test]
    fn extends_to_end_date_and_reconciles() {
        let mut timeline = timeline(1_000_000);
        timeline.extend_through(day(20)).unwrap();

        assert_eq!(timeline.rows().len(), 20);
        assert_eq!(timeline.rows()[19].balance.to_major(), 1000.0);
        assert_eq!(timeline.reconcile(), None);
    }

    #[test]
    fn reports_divergent_balance() {
        let timeline = timeline(990_000);

        assert_eq!(
            timeline.reconcile(),
            Some(ReconciliationMismatch {
                budget_name: "main".to_string(),
                account: "testing".to_string(),
                expected: 990.0,
                actual: 1000.0,
            })
        );
    }

    #[test]
    fn account_without_events_has_no_rows() {
        let mut timeline = AccountTimeline::new(&account(0, true), "main", "USD", &conversions());
        timeline.extend_through(day(20)).unwrap();

        assert!(timeline.rows().is_empty());
        assert!(timeline.is_closed());
        assert_eq!(timeline.reconcile(), None);
    }
}
