use crate::{RoutingError, RoutingResult};
use itinerary_types::{Activity, MessageEnvelope};
use serde_json::Value;

/// Render an activity's `host` against the envelope.
///
/// `{name}` is looked up in the envelope variables first, then as a dotted
/// path into the JSON payload (`{device.site}`, `{gateways.0}`). Only scalar
/// values render. Text outside placeholders is copied as-is, and an unclosed
/// `{` is kept literally.
pub fn render_host(activity: &Activity, envelope: &MessageEnvelope) -> RoutingResult<String> {
    let host = activity
        .host()
        .ok_or_else(|| RoutingError::MissingHost(activity.name().to_string()))?;
    if !host.contains('{') {
        return Ok(host.to_string());
    }

    let payload = if envelope.is_json() {
        serde_json::from_slice::<Value>(envelope.payload.as_bytes()).ok()
    } else {
        None
    };

    let mut rendered = String::with_capacity(host.len());
    let mut rest = host;
    while let Some(open) = rest.find('{') {
        let Some(len) = rest[open..].find('}') else {
            break;
        };
        rendered.push_str(&rest[..open]);
        let placeholder = rest[open + 1..open + len].trim();
        let value = lookup(placeholder, envelope, payload.as_ref()).ok_or_else(|| {
            RoutingError::UnresolvedPlaceholder {
                activity: activity.name().to_string(),
                placeholder: placeholder.to_string(),
            }
        })?;
        rendered.push_str(&value);
        rest = &rest[open + len + 1..];
    }
    rendered.push_str(rest);

    Ok(rendered)
}

/// Concrete node names for a successor: the rendered host split on `,`.
pub fn resolve_destinations(activity: &Activity, envelope: &MessageEnvelope) -> RoutingResult<Vec<String>> {
    render_host(activity, envelope).map(|rendered| split_destinations(&rendered))
}

pub fn split_destinations(rendered: &str) -> Vec<String> {
    rendered
        .split(',')
        .map(str::trim)
        .filter(|node| !node.is_empty())
        .map(str::to_string)
        .collect()
}

fn lookup(placeholder: &str, envelope: &MessageEnvelope, payload: Option<&Value>) -> Option<String> {
    if placeholder.is_empty() {
        return None;
    }
    if let Some(variable) = envelope.variable(placeholder) {
        return scalar(&variable.value);
    }

    let mut current = payload?;
    for segment in placeholder.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    scalar(current)
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itinerary_types::{Itinerary, Variable, VariableType};
    use serde_json::json;

    fn activity(host: &str) -> Activity {
        let it: Itinerary = serde_json::from_value(json!({
            "itineraryId": "it-1",
            "activities": [{
                "id": "n2",
                "userData": {
                    "id": "B",
                    "baseType": "onewayactivity",
                    "config": {"generalConfig": [{"id": "host", "value": host}]}
                }
            }]
        }))
        .unwrap();
        it.activities[0].clone()
    }

    fn envelope(payload: &str) -> MessageEnvelope {
        MessageEnvelope::new("it-1", payload, "application/json")
    }

    #[test]
    fn test_literal_host() {
        let nodes = resolve_destinations(&activity("Node2"), &envelope("{}")).unwrap();
        assert_eq!(nodes, vec!["Node2"]);
    }

    #[test]
    fn test_comma_list_fans_out() {
        let nodes = resolve_destinations(&activity(" node-a, node-b ,,node-c"), &envelope("{}")).unwrap();
        assert_eq!(nodes, vec!["node-a", "node-b", "node-c"]);
    }

    #[test]
    fn test_placeholder_from_payload_path() {
        let env = envelope(r#"{"device": {"site": "plant-7"}, "gateways": ["gw-1", "gw-2"]}"#);
        assert_eq!(
            render_host(&activity("{device.site}"), &env).unwrap(),
            "plant-7"
        );
        assert_eq!(
            resolve_destinations(&activity("{gateways.1},edge-{device.site}"), &env).unwrap(),
            vec!["gw-2", "edge-plant-7"]
        );
    }

    #[test]
    fn test_variable_wins_over_payload() {
        let mut env = envelope(r#"{"target": "from-payload"}"#);
        env.variables.push(Variable {
            name: "target".to_string(),
            kind: VariableType::String,
            value: json!("from-variable"),
        });
        assert_eq!(
            render_host(&activity("{target}"), &env).unwrap(),
            "from-variable"
        );
    }

    #[test]
    fn test_unresolved_placeholder() {
        let err = render_host(&activity("{device.site}"), &envelope(r#"{"device": {}}"#)).unwrap_err();
        assert!(matches!(
            err,
            RoutingError::UnresolvedPlaceholder { placeholder, .. } if placeholder == "device.site"
        ));

        let text = MessageEnvelope::new("it-1", "device", "text/plain");
        assert!(render_host(&activity("{device}"), &text).is_err());
    }

    #[test]
    fn test_object_values_do_not_render() {
        let env = envelope(r#"{"device": {"site": "x"}}"#);
        assert!(render_host(&activity("{device}"), &env).is_err());
    }

    #[test]
    fn test_unclosed_brace_is_literal() {
        assert_eq!(
            render_host(&activity("node-{1"), &envelope("{}")).unwrap(),
            "node-{1"
        );
    }

    #[test]
    fn test_missing_host() {
        let it: Itinerary = serde_json::from_value(json!({
            "itineraryId": "it-1",
            "activities": [{"id": "n1", "userData": {"id": "A"}}]
        }))
        .unwrap();
        assert!(matches!(
            render_host(&it.activities[0], &envelope("{}")),
            Err(RoutingError::MissingHost(name)) if name == "A"
        ));
    }
}
