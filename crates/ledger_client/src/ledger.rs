use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};

use engine::{
    Account, CategoryGroup, LedgerSource, LedgerSummary, MonthDetail, ResultEngine,
    TransactionDetail,
};

use crate::{ClientError, error::server_error};

pub const DEFAULT_LEDGER_URL: &str = "https://api.ynab.com/v1";

/// Client of the budgeting service REST API.
#[derive(Clone, Debug)]
pub struct LedgerClient {
    client: Client,
    base_url: String,
    token: String,
}

/// Every response wraps its payload in `{"data": ...}`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct BudgetsData {
    budgets: Vec<BudgetSummary>,
}

#[derive(Debug, Deserialize)]
struct BudgetSummary {
    id: String,
    name: String,
    #[serde(default)]
    currency_format: Option<CurrencyFormat>,
}

#[derive(Debug, Deserialize)]
struct CurrencyFormat {
    iso_code: String,
}

#[derive(Debug, Deserialize)]
struct AccountsData {
    accounts: Vec<Account>,
}

#[derive(Debug, Deserialize)]
struct TransactionsData {
    transactions: Vec<TransactionDetail>,
}

#[derive(Debug, Deserialize)]
struct CategoriesData {
    category_groups: Vec<CategoryGroup>,
}

#[derive(Debug, Deserialize)]
struct MonthsData {
    months: Vec<MonthSummary>,
}

#[derive(Debug, Deserialize)]
struct MonthSummary {
    month: String,
    #[serde(default)]
    deleted: bool,
}

#[derive(Debug, Deserialize)]
struct MonthData {
    month: MonthDetail,
}

impl LedgerClient {
    pub fn new(client: Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        tracing::debug!("GET {path}");
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(server_error(resp).await);
        }
        Ok(resp.json::<Envelope<T>>().await?.data)
    }

    pub async fn budgets(&self) -> Result<Vec<LedgerSummary>, ClientError> {
        let data: BudgetsData = self.get("/budgets").await?;
        Ok(ledger_summaries(data))
    }

    pub async fn accounts(&self, ledger_id: &str) -> Result<Vec<Account>, ClientError> {
        let data: AccountsData = self.get(&format!("/budgets/{ledger_id}/accounts")).await?;
        Ok(data.accounts.into_iter().filter(|a| !a.deleted).collect())
    }

    pub async fn transactions(
        &self,
        ledger_id: &str,
    ) -> Result<Vec<TransactionDetail>, ClientError> {
        let data: TransactionsData = self
            .get(&format!("/budgets/{ledger_id}/transactions"))
            .await?;
        Ok(data.transactions.into_iter().filter(|t| !t.deleted).collect())
    }

    pub async fn categories(&self, ledger_id: &str) -> Result<Vec<CategoryGroup>, ClientError> {
        let data: CategoriesData = self
            .get(&format!("/budgets/{ledger_id}/categories"))
            .await?;
        Ok(visible_groups(data))
    }

    /// Month summaries carry no categories, so every month is fetched again.
    pub async fn months(&self, ledger_id: &str) -> Result<Vec<MonthDetail>, ClientError> {
        let data: MonthsData = self.get(&format!("/budgets/{ledger_id}/months")).await?;

        let mut months = Vec::new();
        for summary in data.months.iter().filter(|m| !m.deleted) {
            let detail: MonthData = self
                .get(&format!("/budgets/{ledger_id}/months/{}", summary.month))
                .await?;
            months.push(detail.month);
        }
        Ok(months)
    }
}

fn ledger_summaries(data: BudgetsData) -> Vec<LedgerSummary> {
    data.budgets
        .into_iter()
        .map(|budget| LedgerSummary {
            id: budget.id,
            name: budget.name,
            currency: budget
                .currency_format
                .map(|format| format.iso_code)
                .unwrap_or_default(),
        })
        .collect()
}

fn visible_groups(data: CategoriesData) -> Vec<CategoryGroup> {
    data.category_groups
        .into_iter()
        .filter(|group| !group.deleted)
        .map(|mut group| {
            group.categories.retain(|category| !category.deleted);
            group
        })
        .collect()
}

impl LedgerSource for LedgerClient {
    async fn list_ledgers(&self) -> ResultEngine<Vec<LedgerSummary>> {
        Ok(self.budgets().await?)
    }

    async fn list_accounts(&self, ledger_id: &str) -> ResultEngine<Vec<Account>> {
        Ok(self.accounts(ledger_id).await?)
    }

    async fn list_transactions(&self, ledger_id: &str) -> ResultEngine<Vec<TransactionDetail>> {
        Ok(self.transactions(ledger_id).await?)
    }

    async fn list_categories(&self, ledger_id: &str) -> ResultEngine<Vec<CategoryGroup>> {
        Ok(self.categories(ledger_id).await?)
    }

    async fn list_months(&self, ledger_id: &str) -> ResultEngine<Vec<MonthDetail>> {
        Ok(self.months(ledger_id).await?)
    }
}
