use thiserror::Error;

/// One malformed filter token, reported with the field it named.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ParseError {
    pub field: String,
    pub message: String,
}

impl ParseError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("size cannot be negative")]
    NegativeSize,
    /// Aggregate of every failed filter token, position-indexed and joined
    /// with "; ". Compilation is all-or-nothing.
    #[error("{0}")]
    Filters(String),
    #[error("invalid timeframe: {0}")]
    Timeframe(String),
}

impl QueryError {
    /// Join positional parse failures into one aggregate error.
    pub fn from_parse_errors(errors: Vec<(usize, ParseError)>) -> Self {
        let joined = errors
            .iter()
            .map(|(i, e)| format!("filter[{}]: {}", i, e))
            .collect::<Vec<_>>()
            .join("; ");
        QueryError::Filters(joined)
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;
