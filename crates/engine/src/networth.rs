//! Daily net worth and the `networth` table.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use sea_orm::{ActiveValue, entity::prelude::*};

use crate::{
    AccountRow, ResultEngine,
    timeline::{DailyRow, Timeline},
    util::{CENT, round_to},
};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NetWorthRow {
    pub date: NaiveDate,
    /// Currency → sum over every ledger.
    pub totals: BTreeMap<String, f64>,
    /// Ledger name → currency → sum over that ledger's accounts.
    pub budget_breakdown: BTreeMap<String, BTreeMap<String, f64>>,
}

impl DailyRow for NetWorthRow {
    fn day(&self) -> NaiveDate {
        self.date
    }
}

impl NetWorthRow {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            ..Default::default()
        }
    }

    fn accumulate(&mut self, account: &AccountRow) {
        let breakdown = self
            .budget_breakdown
            .entry(account.budget_name.clone())
            .or_default();
        for (currency, value) in &account.conversions {
            *self.totals.entry(currency.clone()).or_default() += value;
            *breakdown.entry(currency.clone()).or_default() += value;
        }
    }

    fn round(&mut self) {
        for value in self.totals.values_mut() {
            *value = round_to(*value, CENT);
        }
        for value in self.budget_breakdown.values_mut().flat_map(|b| b.values_mut()) {
            *value = round_to(*value, CENT);
        }
    }
}

/// Roll the account rows of every ledger into one row per day.
///
/// Account rows are already dense, so every day between the first and the
/// last account row gets a net-worth row; a day no account covers stays at
/// zero instead of inheriting the previous day.
pub fn aggregate_net_worth(mut accounts: Vec<AccountRow>) -> ResultEngine<Vec<NetWorthRow>> {
    accounts.sort_by_key(|row| row.date);

    let mut timeline = Timeline::new();
    for account in &accounts {
        timeline
            .day_mut(account.date, |day, _| NetWorthRow::empty(day))?
            .accumulate(account);
    }
    timeline.rows_mut().iter_mut().for_each(NetWorthRow::round);
    Ok(timeline.into_rows())
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "networth")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub date: Date,
    pub totals: Json,
    pub budget_breakdown: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&NetWorthRow> for ActiveModel {
    fn from(row: &NetWorthRow) -> Self {
        Self {
            date: ActiveValue::Set(row.date),
            totals: ActiveValue::Set(serde_json::json!(row.totals)),
            budget_breakdown: ActiveValue::Set(serde_json::json!(row.budget_breakdown)),
        }
    }
}
