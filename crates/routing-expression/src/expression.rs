use crate::bindings::is_identifier;
use crate::{Bindings, ExpressionError, ExpressionResult};
use cel_interpreter::{Context, Program, Value as CelValue};
use itinerary_types::MessageEnvelope;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

const ROUTE: &str = "route";

struct Statement {
    source: String,
    target: Option<String>,
    program: Program,
}

/// A compiled routing expression.
pub struct RoutingExpression {
    statements: Vec<Statement>,
}

impl std::fmt::Debug for RoutingExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sources: Vec<_> = self.statements.iter().map(|s| s.source.as_str()).collect();
        f.debug_struct("RoutingExpression")
            .field("statements", &sources)
            .finish()
    }
}

impl RoutingExpression {
    pub fn compile(source: &str) -> ExpressionResult<Self> {
        let mut statements = Vec::new();
        for raw in split_statements(source) {
            let (target, body) = split_assignment(&raw);
            let program = Program::compile(body).map_err(|e| ExpressionError::Compile {
                statement: raw.clone(),
                reason: e.to_string(),
            })?;
            statements.push(Statement {
                source: raw.clone(),
                target: target.map(str::to_string),
                program,
            });
        }

        if statements.is_empty() {
            return Err(ExpressionError::Empty);
        }
        Ok(Self { statements })
    }

    /// Run every statement in order and return the truthiness of `route`.
    ///
    /// Without a `route` assignment the last bare expression decides; an
    /// expression that produces neither rejects the target.
    pub fn evaluate(&self, bindings: &Bindings) -> ExpressionResult<bool> {
        let mut context = Context::default();
        bindings.apply(&mut context);

        let mut route: Option<CelValue> = None;
        let mut last: Option<CelValue> = None;

        for statement in &self.statements {
            let value = execute(statement, &context)?;

            match &statement.target {
                Some(name) => {
                    if name == ROUTE {
                        route = Some(value.clone());
                    }
                    context.add_variable_from_value(name.clone(), value);
                }
                None => last = Some(value),
            }
        }

        Ok(route.or(last).map(|value| truthy(&value)).unwrap_or(false))
    }
}

/// Integer overflow and division by zero panic inside the interpreter.
fn execute(statement: &Statement, context: &Context) -> ExpressionResult<CelValue> {
    let outcome = catch_unwind(AssertUnwindSafe(|| statement.program.execute(context)));
    match outcome {
        Ok(result) => result.map_err(|e| ExpressionError::Execute {
            statement: statement.source.clone(),
            reason: e.to_string(),
        }),
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "evaluation panicked".to_string());
            warn!(statement = %statement.source, reason = %reason, "routing expression panicked");
            Err(ExpressionError::Execute {
                statement: statement.source.clone(),
                reason,
            })
        }
    }
}

/// Compile and evaluate `source` against an envelope.
pub fn evaluate_route(source: &str, envelope: &MessageEnvelope) -> ExpressionResult<bool> {
    let expression = RoutingExpression::compile(source)?;
    let bindings = Bindings::from_envelope(envelope)?;
    let route = expression.evaluate(&bindings)?;
    debug!(
        itinerary_id = %envelope.itinerary_id,
        expression = source,
        route,
        "evaluated routing expression"
    );
    Ok(route)
}

fn truthy(value: &CelValue) -> bool {
    match value {
        CelValue::Bool(b) => *b,
        CelValue::Null => false,
        CelValue::Int(i) => *i != 0,
        CelValue::UInt(u) => *u != 0,
        CelValue::Float(f) => *f != 0.0 && !f.is_nan(),
        CelValue::String(s) => !s.is_empty(),
        CelValue::Bytes(b) => !b.is_empty(),
        CelValue::List(l) => !l.is_empty(),
        CelValue::Map(m) => !m.map.is_empty(),
        _ => true,
    }
}

/// Split on `;` outside string literals, normalizing `===`/`!==` to
/// `==`/`!=`. Empty statements are dropped.
fn split_statements(source: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' => {
                quote = Some(c);
                current.push(c);
            }
            ';' => {
                statements.push(std::mem::take(&mut current));
            }
            '=' | '!' if chars.peek() == Some(&'=') => {
                current.push(c);
                current.push('=');
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                }
            }
            _ => current.push(c),
        }
    }
    statements.push(current);

    statements
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// `[var|let|const] name = body` → `(Some(name), body)`; anything else is a
/// bare expression.
fn split_assignment(statement: &str) -> (Option<&str>, &str) {
    let mut rest = statement.trim_start();
    for keyword in ["var ", "let ", "const "] {
        if let Some(stripped) = rest.strip_prefix(keyword) {
            rest = stripped.trim_start();
            break;
        }
    }

    let name_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    let (name, after) = rest.split_at(name_len);
    let after = after.trim_start();

    if is_identifier(name) && after.starts_with('=') && !after.starts_with("==") {
        (Some(name), after[1..].trim())
    } else {
        (None, statement)
    }
}
