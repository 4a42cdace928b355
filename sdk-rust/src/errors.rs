use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// The request to the API failed or the parsing of the response
    /// failed.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The request returns a non-OK status code
    #[error("Status error: {1} (Status {0})")]
    StatusCode(reqwest::StatusCode, String),
    /// The response from the API did not have the expected shape. (e.g.
    /// `contexts` is not an array)
    #[error("Invariant from {0}: {1}")]
    Invariant(&'static str, String),
    /// An auth endpoint rejected the request with an explanation.
    #[error("Auth error: {0}")]
    Auth(String),
    /// The credential store could not be read or written.
    #[error("Credential store error: {0}")]
    Credential(String),
}

impl ApiError {
    /// Whether the API rejected the bearer credential. Callers usually clear
    /// the stored token and ask the user to sign in again.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Self::StatusCode(status, _) => *status == reqwest::StatusCode::UNAUTHORIZED,
            Self::Transport(error) => error.status() == Some(reqwest::StatusCode::UNAUTHORIZED),
            _ => false,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
