//! Monthly category budgets and the `budgets` table.
//!
//! Unlike the other tables, `budgets` is never dropped: it is created by the
//! migrations and every run upserts the months the ledger still reports.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use sea_orm::{ActiveValue, entity::prelude::*};

use crate::{
    CalculatedField, CurrencyConversion, ResultEngine,
    ledger::{CategoryIndex, MonthDetail},
    util::{CENT, parse_date, round_to},
};

/// One category of one month.
#[derive(Clone, Debug, PartialEq)]
pub struct BudgetRow {
    /// `{month}-{categoryId}`
    pub key: String,
    pub category: String,
    pub category_group: String,
    pub month: NaiveDate,
    /// Ledger name.
    pub name: String,
    pub currency: String,
    pub budgeted: f64,
    pub activity: f64,
    pub balance: f64,
    /// `budgeted` in every target currency.
    pub conversions: BTreeMap<String, f64>,
    pub activity_conversions: BTreeMap<String, f64>,
    pub balance_conversions: BTreeMap<String, f64>,
    pub fields: BTreeMap<String, bool>,
}

/// Flatten the ledger months into budget rows, skipping hidden categories.
pub fn budget_rows(
    ledger_name: &str,
    currency: &str,
    conversions: &CurrencyConversion,
    calculated_fields: &[CalculatedField],
    categories: &CategoryIndex,
    months: &[MonthDetail],
) -> ResultEngine<Vec<BudgetRow>> {
    let mut rows = Vec::new();
    for month in months {
        let first_day = parse_date(&month.month)?;
        for category in month.categories.iter().filter(|c| !c.hidden && !c.deleted) {
            let category_group = categories
                .group_name(&category.category_group_id)
                .or_else(|| categories.get(&category.id).map(|info| info.group.as_str()))
                .unwrap_or_default()
                .to_string();

            let budgeted = round_to(category.budgeted.to_major(), CENT);
            let activity = round_to(category.activity.to_major(), CENT);
            let balance = round_to(category.balance.to_major(), CENT);

            let fields = calculated_fields
                .iter()
                .map(|field| {
                    let value = field.evaluate(&category.name, &category_group, None);
                    (field.name.clone(), value)
                })
                .collect();

            rows.push(BudgetRow {
                key: format!("{}-{}", month.month, category.id),
                category: category.name.clone(),
                category_group,
                month: first_day,
                name: ledger_name.to_string(),
                currency: currency.to_string(),
                budgeted,
                activity,
                balance,
                conversions: conversions.convert(budgeted),
                activity_conversions: conversions.convert(activity),
                balance_conversions: conversions.convert(balance),
                fields,
            });
        }
    }
    Ok(rows)
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "budgets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,
    pub category: String,
    pub category_group: String,
    pub month: Date,
    pub name: String,
    pub currency: String,
    #[sea_orm(column_type = "Double")]
    pub budgeted: f64,
    #[sea_orm(column_type = "Double")]
    pub activity: f64,
    #[sea_orm(column_type = "Double")]
    pub balance: f64,
    pub conversions: Json,
    pub activity_conversions: Json,
    pub balance_conversions: Json,
    pub fields: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&BudgetRow> for ActiveModel {
    fn from(row: &BudgetRow) -> Self {
        Self {
            key: ActiveValue::Set(row.key.clone()),
            category: ActiveValue::Set(row.category.clone()),
            category_group: ActiveValue::Set(row.category_group.clone()),
            month: ActiveValue::Set(row.month),
            name: ActiveValue::Set(row.name.clone()),
            currency: ActiveValue::Set(row.currency.clone()),
            budgeted: ActiveValue::Set(row.budgeted),
            activity: ActiveValue::Set(row.activity),
            balance: ActiveValue::Set(row.balance),
            conversions: ActiveValue::Set(serde_json::json!(row.conversions)),
            activity_conversions: ActiveValue::Set(serde_json::json!(row.activity_conversions)),
            balance_conversions: ActiveValue::Set(serde_json::json!(row.balance_conversions)),
            fields: ActiveValue::Set(serde_json::json!(row.fields)),
        }
    }
}
