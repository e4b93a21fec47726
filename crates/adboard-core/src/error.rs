use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdboardError {
    #[error("an ad is already awaiting confirmation")]
    AlreadyPending,

    #[error("no ad is awaiting confirmation")]
    NoPending,

    #[error("review entry not found: {0}")]
    ReviewEntryNotFound(i64),

    #[error("config not found: {0}")]
    ConfigNotFound(String),

    #[error("store failure: {0}")]
    Store(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<sqlx::Error> for AdboardError {
    fn from(e: sqlx::Error) -> Self {
        AdboardError::Store(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AdboardError>;
