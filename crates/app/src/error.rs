use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("import error: {0}")]
    Engine(#[from] engine::EngineError),
    #[error("http error: {0}")]
    Client(#[from] ledger_client::ClientError),
    #[error("invalid settings: {0}")]
    Settings(String),
}
