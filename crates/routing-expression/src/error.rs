use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("routing expression is empty")]
    Empty,

    #[error("failed to compile `{statement}`: {reason}")]
    Compile { statement: String, reason: String },

    #[error("failed to evaluate `{statement}`: {reason}")]
    Execute { statement: String, reason: String },

    #[error("invalid variable `{name}`: {reason}")]
    InvalidVariable { name: String, reason: String },

    #[error("message payload is not valid JSON: {0}")]
    InvalidMessage(String),
}

pub type ExpressionResult<T> = Result<T, ExpressionError>;
