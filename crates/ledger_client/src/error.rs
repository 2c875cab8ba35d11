use reqwest::StatusCode;
use serde::Deserialize;

use engine::EngineError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("{status}: {message}")]
    Server { status: StatusCode, message: String },
    #[error("rate provider error: {0}")]
    Provider(String),
}

impl From<ClientError> for EngineError {
    fn from(err: ClientError) -> Self {
        EngineError::SourceFetch(err.to_string())
    }
}

/// `{"error": {"id": "401", "name": "unauthorized", "detail": "..."}}`
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    name: String,
    #[serde(default)]
    detail: String,
}

impl ErrorBody {
    pub(crate) fn message(&self) -> String {
        match (self.error.name.is_empty(), self.error.detail.is_empty()) {
            (_, true) => self.error.name.clone(),
            (true, false) => self.error.detail.clone(),
            (false, false) => format!("{}: {}", self.error.name, self.error.detail),
        }
    }
}

/// Turn a non-2xx response into [`ClientError::Server`].
pub(crate) async fn server_error(resp: reqwest::Response) -> ClientError {
    let status = resp.status();
    let message = match resp.json::<ErrorBody>().await {
        Ok(body) => body.message(),
        Err(_) => "server error".to_string(),
    };
    ClientError::Server { status, message }
}
