use scour_core::QueryError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Compile(#[from] QueryError),
    #[error("field capabilities fetch failed: {0}")]
    Capabilities(String),
    #[error("search failed: {0}")]
    Search(String),
    #[error("request throttled by the search backend")]
    Throttled,
    #[error("wait cancelled")]
    Cancelled,
    #[error("gave up after {0} throttled attempts")]
    RetriesExhausted(u32),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;
