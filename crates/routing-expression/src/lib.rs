//! Conditional routing expressions.
//!
//! Expressions are evaluated with an embedded CEL interpreter. It has no
//! access to the host, the file system or the network. The statement form
//! used by itinerary designers is accepted:
//!
//! ```text
//! var limit = 10; var route = message.value > limit;
//! ```
//!
//! Each `[var] name = expr` statement binds `name` for the statements that
//! follow. The result is the final value of `route`, or the value of the
//! last bare expression when nothing assigns `route`.

mod bindings;
mod error;
mod expression;

pub use bindings::Bindings;
pub use error::{ExpressionError, ExpressionResult};
pub use expression::{evaluate_route, RoutingExpression};
