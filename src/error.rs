use thiserror::Error;

#[derive(Error, Debug)]
pub enum PriceWatchError {
    #[error("asset configuration is empty")]
    EmptyConfig,

    #[error("duplicate asset id: {0}")]
    DuplicateAsset(String),

    #[error("invalid value for {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
