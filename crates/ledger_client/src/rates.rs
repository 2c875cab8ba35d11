use std::collections::HashMap;

use reqwest::Client;
use serde::Deserialize;

use engine::{RateProvider, RateSnapshot, ResultEngine};

use crate::{ClientError, error::server_error};

pub const DEFAULT_RATES_URL: &str = "https://api.exchangeratesapi.io/v1";

/// Client of an exchangeratesapi-style provider.
#[derive(Clone, Debug)]
pub struct ExchangeRatesClient {
    client: Client,
    endpoint: String,
    access_key: String,
}

/// `{"success": true, "base": "EUR", "date": "2024-03-01", "rates": {...}}`
/// or `{"success": false, "error": {"code": 101, "info": "..."}}`.
#[derive(Debug, Deserialize)]
struct LatestResponse {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    base: String,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    rates: HashMap<String, f64>,
    #[serde(default)]
    error: Option<ProviderError>,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    info: String,
}

fn default_success() -> bool {
    true
}

impl ExchangeRatesClient {
    pub fn new(client: Client, endpoint: impl Into<String>, access_key: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            access_key: access_key.into(),
        }
    }

    pub async fn latest(&self) -> Result<RateSnapshot, ClientError> {
        let url = format!("{}/latest", self.endpoint.trim_end_matches('/'));
        tracing::debug!("GET {url}");
        let resp = self
            .client
            .get(url)
            .query(&[("access_key", self.access_key.as_str())])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(server_error(resp).await);
        }
        snapshot(resp.json().await?)
    }
}

fn snapshot(body: LatestResponse) -> Result<RateSnapshot, ClientError> {
    if !body.success {
        let message = body
            .error
            .map(|err| if err.info.is_empty() { err.kind } else { err.info })
            .unwrap_or_else(|| "request failed".to_string());
        return Err(ClientError::Provider(message));
    }
    if body.base.is_empty() {
        return Err(ClientError::Provider("response without base currency".to_string()));
    }
    Ok(RateSnapshot {
        base: body.base,
        date: body.date,
        rates: body.rates,
    })
}

impl RateProvider for ExchangeRatesClient {
    async fn latest_rates(&self) -> ResultEngine<RateSnapshot> {
        Ok(self.latest().await?)
    }
}
