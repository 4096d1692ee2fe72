use crate::{ExpressionError, ExpressionResult};
use cel_interpreter::objects::{Key, Map};
use cel_interpreter::{Context, Value as CelValue};
use itinerary_types::{MessageEnvelope, Variable, VariableType};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;

/// Names visible to a routing expression.
///
/// `message` is bound first and variables after it, so a variable named
/// `message` shadows the payload.
#[derive(Debug, Clone)]
pub struct Bindings {
    values: Vec<(String, CelValue)>,
}

impl Bindings {
    /// Bind `message` to the given JSON value and nothing else.
    pub fn with_message(message: JsonValue) -> Self {
        Self {
            values: vec![("message".to_string(), json_to_cel_value(message))],
        }
    }

    /// Bindings for an envelope: the JSON payload (or `{}` for non-JSON
    /// content) plus one binding per variable.
    pub fn from_envelope(envelope: &MessageEnvelope) -> ExpressionResult<Self> {
        let message = if envelope.is_json() {
            serde_json::from_slice(envelope.payload.as_bytes())
                .map_err(|e| ExpressionError::InvalidMessage(e.to_string()))?
        } else {
            JsonValue::Object(serde_json::Map::new())
        };

        let mut bindings = Self::with_message(message);
        for variable in &envelope.variables {
            bindings.bind_variable(variable)?;
        }
        Ok(bindings)
    }

    /// Materialize a variable according to its declared type.
    pub fn bind_variable(&mut self, variable: &Variable) -> ExpressionResult<()> {
        if !is_identifier(&variable.name) {
            return Err(ExpressionError::InvalidVariable {
                name: variable.name.clone(),
                reason: "not a valid identifier".to_string(),
            });
        }

        let value = match variable.kind {
            VariableType::String | VariableType::DateTime => {
                let text = match &variable.value {
                    JsonValue::String(s) => s.clone(),
                    JsonValue::Null => String::new(),
                    other => other.to_string(),
                };
                CelValue::String(Arc::new(text))
            }
            VariableType::Number | VariableType::Decimal => numeric_value(variable)?,
            VariableType::Message => json_to_cel_value(variable.value.clone()),
        };

        self.values.push((variable.name.clone(), value));
        Ok(())
    }

    pub(crate) fn apply(&self, context: &mut Context) {
        for (name, value) in &self.values {
            context.add_variable_from_value(name.clone(), value.clone());
        }
    }
}

fn numeric_value(variable: &Variable) -> ExpressionResult<CelValue> {
    let invalid = |reason: &str| ExpressionError::InvalidVariable {
        name: variable.name.clone(),
        reason: reason.to_string(),
    };

    match &variable.value {
        JsonValue::Number(n) => Ok(number_to_cel(n)),
        JsonValue::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                Ok(CelValue::Int(i))
            } else if let Ok(f) = s.parse::<f64>() {
                Ok(CelValue::Float(f))
            } else {
                Err(invalid("not a number"))
            }
        }
        _ => Err(invalid("not a number")),
    }
}

fn number_to_cel(n: &serde_json::Number) -> CelValue {
    if let Some(i) = n.as_i64() {
        CelValue::Int(i)
    } else if let Some(u) = n.as_u64() {
        CelValue::UInt(u)
    } else {
        CelValue::Float(n.as_f64().unwrap_or(f64::NAN))
    }
}

pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Convert a JSON value into the interpreter's value model.
pub(crate) fn json_to_cel_value(json: JsonValue) -> CelValue {
    match json {
        JsonValue::Null => CelValue::Null,
        JsonValue::Bool(b) => CelValue::Bool(b),
        JsonValue::Number(n) => number_to_cel(&n),
        JsonValue::String(s) => CelValue::String(Arc::new(s)),
        JsonValue::Array(items) => {
            CelValue::List(Arc::new(items.into_iter().map(json_to_cel_value).collect()))
        }
        JsonValue::Object(obj) => {
            let map: HashMap<Key, CelValue> = obj
                .into_iter()
                .map(|(k, v)| (Key::String(Arc::new(k)), json_to_cel_value(v)))
                .collect();
            CelValue::Map(Map { map: Arc::new(map) })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn var(name: &str, kind: VariableType, value: JsonValue) -> Variable {
        Variable {
            name: name.to_string(),
            kind,
            value,
        }
    }

    fn bound(bindings: &Bindings, name: &str) -> CelValue {
        bindings
            .values
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .unwrap()
    }

    #[test]
    fn test_number_variables() {
        let mut bindings = Bindings::with_message(json!({}));
        bindings.bind_variable(&var("a", VariableType::Number, json!(12))).unwrap();
        bindings.bind_variable(&var("b", VariableType::Decimal, json!("2.5"))).unwrap();
        bindings.bind_variable(&var("c", VariableType::Number, json!(" 7 "))).unwrap();

        assert_eq!(bound(&bindings, "a"), CelValue::Int(12));
        assert_eq!(bound(&bindings, "b"), CelValue::Float(2.5));
        assert_eq!(bound(&bindings, "c"), CelValue::Int(7));
    }

    #[test]
    fn test_non_numeric_number_is_rejected() {
        let mut bindings = Bindings::with_message(json!({}));
        let err = bindings
            .bind_variable(&var("a", VariableType::Number, json!("twelve")))
            .unwrap_err();
        assert!(matches!(err, ExpressionError::InvalidVariable { .. }));
    }

    #[test]
    fn test_text_variables() {
        let mut bindings = Bindings::with_message(json!({}));
        bindings.bind_variable(&var("s", VariableType::String, json!("abc"))).unwrap();
        bindings
            .bind_variable(&var("d", VariableType::DateTime, json!("2024-01-01T00:00:00Z")))
            .unwrap();
        bindings.bind_variable(&var("n", VariableType::String, json!(5))).unwrap();

        assert_eq!(bound(&bindings, "s"), CelValue::String(Arc::new("abc".into())));
        assert_eq!(
            bound(&bindings, "d"),
            CelValue::String(Arc::new("2024-01-01T00:00:00Z".into()))
        );
        assert_eq!(bound(&bindings, "n"), CelValue::String(Arc::new("5".into())));
    }

    #[test]
    fn test_invalid_identifier_is_rejected() {
        let mut bindings = Bindings::with_message(json!({}));
        let err = bindings
            .bind_variable(&var("my-var", VariableType::String, json!("x")))
            .unwrap_err();
        assert!(matches!(err, ExpressionError::InvalidVariable { .. }));
    }

    #[test]
    fn test_non_json_message_binds_empty_object() {
        let envelope = MessageEnvelope::new("it-1", "not json", "text/plain");
        let bindings = Bindings::from_envelope(&envelope).unwrap();
        assert_eq!(bound(&bindings, "message"), json_to_cel_value(json!({})));
    }

    #[test]
    fn test_malformed_json_message_is_an_error() {
        let envelope = MessageEnvelope::new("it-1", "{oops", "application/json");
        assert!(matches!(
            Bindings::from_envelope(&envelope),
            Err(ExpressionError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_identifier_rules() {
        assert!(is_identifier("route"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1x"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("a.b"));
    }
}
