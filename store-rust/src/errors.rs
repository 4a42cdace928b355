use thiserror::Error;
use veemee_sdk::ApiError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
