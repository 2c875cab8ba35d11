//! Ledger service collaborator.
//!
//! The engine never talks HTTP itself. It consumes a [`LedgerSource`] (the
//! `ledger_client` crate provides the real one) and maps the raw transaction
//! payloads onto the [`Transaction`] capability set.

use std::{collections::HashMap, future::Future};

use serde::Deserialize;

use crate::{Milliunits, ResultEngine, Transaction, TransactionType};

/// A ledger as listed by the service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerSummary {
    pub id: String,
    pub name: String,
    /// ISO code of the ledger's base currency.
    pub currency: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: String,
    pub on_budget: bool,
    #[serde(default)]
    pub closed: bool,
    /// Current balance as reported by the ledger.
    pub balance: Milliunits,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct TransactionDetail {
    pub id: String,
    pub date: String,
    pub amount: Milliunits,
    #[serde(default)]
    pub memo: Option<String>,
    pub account_id: String,
    #[serde(default)]
    pub account_name: String,
    #[serde(default)]
    pub payee_name: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub transfer_account_id: Option<String>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub subtransactions: Vec<SubTransaction>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct SubTransaction {
    pub id: String,
    pub amount: Milliunits,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub payee_name: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub transfer_account_id: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CategoryGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub categories: Vec<Category>,
}

/// A category, either as listed or as a month snapshot.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub category_group_id: String,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub budgeted: Milliunits,
    #[serde(default)]
    pub activity: Milliunits,
    #[serde(default)]
    pub balance: Milliunits,
}

/// Per-category figures of one budget month.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct MonthDetail {
    /// First day of the month, `YYYY-MM-DD`.
    pub month: String,
    #[serde(default)]
    pub categories: Vec<Category>,
}

/// External ledger service.
pub trait LedgerSource {
    fn list_ledgers(&self) -> impl Future<Output = ResultEngine<Vec<LedgerSummary>>> + Send;

    fn list_accounts(
        &self,
        ledger_id: &str,
    ) -> impl Future<Output = ResultEngine<Vec<Account>>> + Send;

    /// Transactions including their nested split children.
    fn list_transactions(
        &self,
        ledger_id: &str,
    ) -> impl Future<Output = ResultEngine<Vec<TransactionDetail>>> + Send;

    fn list_categories(
        &self,
        ledger_id: &str,
    ) -> impl Future<Output = ResultEngine<Vec<CategoryGroup>>> + Send;

    fn list_months(
        &self,
        ledger_id: &str,
    ) -> impl Future<Output = ResultEngine<Vec<MonthDetail>>> + Send;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CategoryInfo {
    pub name: String,
    pub group: String,
}

/// Category id → name and group name of one ledger.
#[derive(Clone, Debug, Default)]
pub struct CategoryIndex {
    categories: HashMap<String, CategoryInfo>,
    groups: HashMap<String, String>,
}

impl CategoryIndex {
    pub fn new(groups: &[CategoryGroup]) -> Self {
        let mut index = Self::default();
        for group in groups {
            index.groups.insert(group.id.clone(), group.name.clone());
            for category in &group.categories {
                index.categories.insert(
                    category.id.clone(),
                    CategoryInfo {
                        name: category.name.clone(),
                        group: group.name.clone(),
                    },
                );
            }
        }
        index
    }

    pub fn get(&self, category_id: &str) -> Option<&CategoryInfo> {
        self.categories.get(category_id)
    }

    pub fn group_name(&self, group_id: &str) -> Option<&str> {
        self.groups.get(group_id).map(String::as_str)
    }
}

/// A ledger transaction viewed through the [`Transaction`] capability set.
#[derive(Clone, Copy, Debug)]
pub struct LedgerEntry<'a> {
    detail: &'a TransactionDetail,
    categories: &'a CategoryIndex,
}

impl<'a> LedgerEntry<'a> {
    pub fn new(detail: &'a TransactionDetail, categories: &'a CategoryIndex) -> Self {
        Self { detail, categories }
    }
}

impl Transaction for LedgerEntry<'_> {
    fn date(&self) -> &str {
        &self.detail.date
    }

    fn payee(&self) -> &str {
        self.detail.payee_name.as_deref().unwrap_or_default()
    }

    fn category(&self) -> &str {
        self.detail.category_name.as_deref().unwrap_or_default()
    }

    fn category_group(&self) -> &str {
        self.detail
            .category_id
            .as_deref()
            .and_then(|id| self.categories.get(id))
            .map(|info| info.group.as_str())
            .unwrap_or_default()
    }

    fn memo(&self) -> &str {
        self.detail.memo.as_deref().unwrap_or_default()
    }

    fn amount(&self) -> f64 {
        self.detail.amount.to_major()
    }

    fn transaction_type(&self) -> TransactionType {
        // Checked first so incoming transfers are not reported as income.
        TransactionType::classify(self.detail.transfer_account_id.is_some(), self.amount())
    }

    fn sub_transactions(&self) -> Vec<Box<dyn Transaction + '_>> {
        self.detail
            .subtransactions
            .iter()
            .filter(|split| !split.deleted)
            .map(|split| Box::new(LedgerSplit { split, parent: *self }) as Box<dyn Transaction + '_>)
            .collect()
    }

    fn has_sub_transactions(&self) -> bool {
        self.detail.subtransactions.iter().any(|split| !split.deleted)
    }

    fn account(&self) -> &str {
        &self.detail.account_name
    }

    fn index_key(&self) -> String {
        self.detail.id.clone()
    }
}

/// Split child of a [`LedgerEntry`].
#[derive(Clone, Copy, Debug)]
struct LedgerSplit<'a> {
    split: &'a SubTransaction,
    parent: LedgerEntry<'a>,
}

impl Transaction for LedgerSplit<'_> {
    fn date(&self) -> &str {
        self.parent.date()
    }

    fn payee(&self) -> &str {
        match self.split.payee_name.as_deref() {
            Some(payee) if !payee.is_empty() => payee,
            _ => self.parent.payee(),
        }
    }

    fn category(&self) -> &str {
        self.split
            .category_id
            .as_deref()
            .and_then(|id| self.parent.categories.get(id))
            .map(|info| info.name.as_str())
            .or(self.split.category_name.as_deref())
            .unwrap_or_default()
    }

    fn category_group(&self) -> &str {
        self.split
            .category_id
            .as_deref()
            .and_then(|id| self.parent.categories.get(id))
            .map(|info| info.group.as_str())
            .unwrap_or_default()
    }

    fn memo(&self) -> &str {
        match self.split.memo.as_deref() {
            Some(memo) if !memo.is_empty() => memo,
            _ => self.parent.memo(),
        }
    }

    fn amount(&self) -> f64 {
        self.split.amount.to_major()
    }

    fn transaction_type(&self) -> TransactionType {
        TransactionType::classify(self.split.transfer_account_id.is_some(), self.amount())
    }

    fn account(&self) -> &str {
        self.parent.account()
    }

    fn index_key(&self) -> String {
        self.split.id.clone()
    }
}
