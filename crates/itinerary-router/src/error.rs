use routing_expression::ExpressionError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RoutingError {
    #[error("activity `{0}` is not part of itinerary `{1}`")]
    UnknownActivity(String, String),

    #[error("routing expression of `{activity}` failed: {source}")]
    Expression {
        activity: String,
        #[source]
        source: ExpressionError,
    },

    #[error("activity `{0}` has no host")]
    MissingHost(String),

    #[error("unresolved placeholder `{placeholder}` in host of `{activity}`")]
    UnresolvedPlaceholder { activity: String, placeholder: String },
}

pub type RoutingResult<T> = Result<T, RoutingError>;
