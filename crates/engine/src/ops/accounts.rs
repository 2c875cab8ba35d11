use std::collections::HashMap;

use chrono::NaiveDate;

use crate::{
    AccountRow, AccountTimeline, CurrencyConversion, ReconciliationMismatch, ResultEngine,
    accounts,
    ledger::{Account, TransactionDetail},
    util::parse_date,
};

use super::{Engine, sink};

/// Dense account rows of one ledger and the accounts that did not reconcile.
#[derive(Clone, Debug, Default)]
pub struct AccountRows {
    pub rows: Vec<AccountRow>,
    pub mismatches: Vec<ReconciliationMismatch>,
}

impl Engine {
    pub(crate) async fn write_accounts(&self, rows: &[AccountRow]) -> ResultEngine<usize> {
        sink::upsert_batched::<accounts::Entity, accounts::ActiveModel, _>(
            &self.database,
            "accounts",
            accounts::Column::Key,
            rows,
            self.config.effective_batch_size(),
        )
        .await
    }
}

/// Replay the ledger's transactions onto its accounts.
///
/// Open accounts are carried forward through `today` and compared with the
/// balance the ledger reports; closed accounts only keep the days they moved.
pub fn reconstruct_accounts(
    budget_name: &str,
    currency: &str,
    conversions: &CurrencyConversion,
    accounts: &[Account],
    transactions: &[TransactionDetail],
    today: NaiveDate,
) -> ResultEngine<AccountRows> {
    let live: Vec<&Account> = accounts.iter().filter(|account| !account.deleted).collect();
    let mut name_count: HashMap<&str, usize> = HashMap::new();
    for account in live.iter().copied() {
        *name_count.entry(account.name.as_str()).or_default() += 1;
    }

    let mut timelines: Vec<AccountTimeline> = Vec::new();
    let mut by_id: HashMap<&str, usize> = HashMap::new();
    for account in live {
        by_id.insert(&account.id, timelines.len());
        let timeline = AccountTimeline::new(account, budget_name, currency, conversions);
        timelines.push(if name_count[account.name.as_str()] > 1 {
            timeline.keyed_by_id()
        } else {
            timeline
        });
    }

    let mut dated = transactions
        .iter()
        .filter(|detail| !detail.deleted)
        .map(|detail| Ok((parse_date(&detail.date)?, detail)))
        .collect::<ResultEngine<Vec<_>>>()?;
    dated.sort_by_key(|(date, _)| *date);

    for (date, detail) in dated {
        let Some(&index) = by_id.get(detail.account_id.as_str()) else {
            tracing::debug!("transaction {} references unknown account", detail.id);
            continue;
        };
        timelines[index].append(date, detail.amount)?;
    }

    let mut result = AccountRows::default();
    for mut timeline in timelines {
        if !timeline.is_closed() {
            timeline.extend_through(today)?;
            if let Some(mismatch) = timeline.reconcile() {
                tracing::warn!(
                    "account {} of {} does not reconcile: expected {}, actual {}",
                    mismatch.account,
                    mismatch.budget_name,
                    mismatch.expected,
                    mismatch.actual
                );
                result.mismatches.push(mismatch);
            }
        }
        result.rows.extend(timeline.into_rows());
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn accounts() -> Vec<Account> {
        serde_json::from_value(serde_json::json!([
            { "id": "chk", "name": "Checking", "type": "checking", "on_budget": true,
              "balance": 1000000 },
            { "id": "old", "name": "Old Card", "type": "creditCard", "on_budget": true,
              "closed": true, "balance": 0 }
        ]))
        .unwrap()
    }

    fn transactions() -> Vec<TransactionDetail> {
        serde_json::from_value(serde_json::json!([
            { "id": "3", "date": "2024-03-15", "amount": 400000, "account_id": "chk" },
            { "id": "1", "date": "2024-03-01", "amount": 100000, "account_id": "chk" },
            { "id": "2", "date": "2024-03-10", "amount": 500000, "account_id": "chk" },
            { "id": "4", "date": "2024-03-02", "amount": -5000, "account_id": "old" },
            { "id": "5", "date": "2024-03-03", "amount": 5000, "account_id": "old" },
            { "id": "6", "date": "2024-03-04", "amount": 999, "account_id": "chk",
              "deleted": true },
            { "id": "7", "date": "2024-03-05", "amount": 1, "account_id": "gone" }
        ]))
        .unwrap()
    }

    #[test]
    fn sorts_events_and_extends_open_accounts() {
        let result = reconstruct_accounts(
            "Household",
            "USD",
            &CurrencyConversion::default(),
            &accounts(),
            &transactions(),
            day(20),
        )
        .unwrap();

        let checking: Vec<_> = result.rows.iter().filter(|r| r.name == "Checking").collect();
        assert_eq!(checking.len(), 20);
        assert_eq!(checking[2].balance.to_major(), 100.0);
        assert_eq!(checking[9].balance.to_major(), 600.0);
        assert_eq!(checking[19].balance.to_major(), 1000.0);
        assert!(result.mismatches.is_empty());

        let closed: Vec<_> = result.rows.iter().filter(|r| r.name == "Old Card").collect();
        assert_eq!(closed.len(), 2);
        assert_eq!(closed[1].date, day(3));
    }

    #[test]
    fn collects_reconciliation_mismatches() {
        let mut accounts = accounts();
        accounts[0].balance = crate::Milliunits::new(1_200_000);

        let result = reconstruct_accounts(
            "Household",
            "USD",
            &CurrencyConversion::default(),
            &accounts,
            &transactions(),
            day(20),
        )
        .unwrap();

        assert_eq!(result.mismatches.len(), 1);
        assert_eq!(result.mismatches[0].expected, 1200.0);
        assert_eq!(result.mismatches[0].actual, 1000.0);
        assert_eq!(result.rows.iter().filter(|r| r.name == "Checking").count(), 20);
    }

    #[test]
    fn accounts_sharing_a_name_keep_distinct_keys() {
        let accounts: Vec<Account> = serde_json::from_value(serde_json::json!([
            { "id": "visa-old", "name": "Visa", "type": "creditCard", "on_budget": true,
              "closed": true, "balance": 0 },
            { "id": "visa-new", "name": "Visa", "type": "creditCard", "on_budget": true,
              "balance": -20000 },
            { "id": "chk", "name": "Checking", "type": "checking", "on_budget": true,
              "balance": 0 }
        ]))
        .unwrap();
        let transactions: Vec<TransactionDetail> = serde_json::from_value(serde_json::json!([
            { "id": "1", "date": "2024-03-01", "amount": -10000, "account_id": "visa-old" },
            { "id": "2", "date": "2024-03-01", "amount": 10000, "account_id": "visa-old" },
            { "id": "3", "date": "2024-03-01", "amount": -20000, "account_id": "visa-new" },
            { "id": "4", "date": "2024-03-01", "amount": 0, "account_id": "chk" }
        ]))
        .unwrap();

        let result = reconstruct_accounts(
            "Household",
            "USD",
            &CurrencyConversion::default(),
            &accounts,
            &transactions,
            day(1),
        )
        .unwrap();

        let keys: Vec<_> = result.rows.iter().map(|row| row.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "03-01-2024::Household::Visa::visa-old",
                "03-01-2024::Household::Visa::visa-new",
                "03-01-2024::Household::Checking",
            ]
        );
        assert!(result.rows.iter().take(2).all(|row| row.name == "Visa"));
        assert!(result.mismatches.is_empty());
    }
}
