use crate::{RoutingError, RoutingResult};
use itinerary_types::{Activity, Itinerary, MessageEnvelope};
use routing_expression::evaluate_route;
use tracing::debug;

/// Activities that should receive `envelope` next, in connection order.
///
/// A target without a routing expression is always accepted. Duplicate
/// edges produce duplicate successors and cycles are followed as declared.
/// The first failing expression aborts the whole walk.
pub fn successors<'a>(itinerary: &'a Itinerary, envelope: &MessageEnvelope) -> RoutingResult<Vec<&'a Activity>> {
    let last = itinerary
        .activity_by_name(&envelope.last_activity)
        .ok_or_else(|| RoutingError::UnknownActivity(envelope.last_activity.clone(), itinerary.itinerary_id.clone()))?;

    let mut next = Vec::new();
    for connection in itinerary.outgoing(&last.id) {
        let target = itinerary.activity_by_node(&connection.target.node).ok_or_else(|| {
            RoutingError::UnknownActivity(connection.target.node.clone(), itinerary.itinerary_id.clone())
        })?;

        let accepted = match target.routing_expression() {
            None => true,
            Some(source) => evaluate_route(source, envelope).map_err(|source| RoutingError::Expression {
                activity: target.name().to_string(),
                source,
            })?,
        };

        debug!(
            itinerary_id = %itinerary.itinerary_id,
            from = %last.name(),
            to = %target.name(),
            accepted,
            "evaluated connection"
        );
        if accepted {
            next.push(target);
        }
    }

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use itinerary_types::{Variable, VariableType};
    use serde_json::{json, Value};

    fn activity(node: &str, name: &str, host: &str, expression: Option<&str>) -> Value {
        let static_config = match expression {
            Some(e) => json!([{"id": "routingExpression", "value": e}]),
            None => json!([]),
        };
        json!({
            "id": node,
            "type": "normal",
            "userData": {
                "id": name,
                "baseType": "onewayactivity",
                "config": {
                    "generalConfig": [
                        {"id": "host", "value": host},
                        {"id": "enabled", "value": true}
                    ],
                    "staticConfig": static_config
                }
            }
        })
    }

    fn itinerary(activities: Vec<Value>, edges: &[(&str, &str)]) -> Itinerary {
        let connections: Vec<Value> = edges
            .iter()
            .map(|(s, t)| json!({"source": {"node": s}, "target": {"node": t}}))
            .collect();
        serde_json::from_value(json!({
            "itineraryId": "it-1",
            "integrationName": "Telemetry",
            "activities": activities,
            "connections": connections
        }))
        .unwrap()
    }

    fn completed(last: &str, payload: &str) -> MessageEnvelope {
        let mut envelope = MessageEnvelope::new("it-1", payload, "application/json");
        envelope.last_activity = last.to_string();
        envelope
    }

    fn names(activities: Vec<&Activity>) -> Vec<&str> {
        activities.into_iter().map(Activity::name).collect()
    }

    #[test]
    fn test_single_successor_without_expression() {
        let it = itinerary(
            vec![
                activity("n1", "A", "Node1", None),
                activity("n2", "B", "Node2", None),
            ],
            &[("n1", "n2")],
        );

        let next = successors(&it, &completed("A", r#"{"value":5}"#)).unwrap();
        assert_eq!(names(next), vec!["B"]);
    }

    #[test]
    fn test_expression_rejects_successor() {
        let it = itinerary(
            vec![
                activity("n1", "A", "Node1", None),
                activity("n2", "B", "Node2", Some("var route = message.value > 10;")),
            ],
            &[("n1", "n2")],
        );

        assert!(successors(&it, &completed("A", r#"{"value":5}"#))
            .unwrap()
            .is_empty());
        assert_eq!(
            names(successors(&it, &completed("A", r#"{"value":50}"#)).unwrap()),
            vec!["B"]
        );
    }

    #[test]
    fn test_fan_out_keeps_edge_order_and_duplicates() {
        let it = itinerary(
            vec![
                activity("n1", "A", "Node1", None),
                activity("n2", "B", "Node1", None),
                activity("n3", "C", "Node1", None),
            ],
            &[("n1", "n3"), ("n1", "n2"), ("n2", "n3"), ("n1", "n3")],
        );

        let next = successors(&it, &completed("A", "{}")).unwrap();
        assert_eq!(names(next), vec!["C", "B", "C"]);
    }

    #[test]
    fn test_variables_are_visible_to_expressions() {
        let it = itinerary(
            vec![
                activity("n1", "A", "Node1", None),
                activity("n2", "B", "Node1", Some("route = site == 'north'")),
                activity("n3", "C", "Node1", Some("route = site == 'south'")),
            ],
            &[("n1", "n2"), ("n1", "n3")],
        );
        let mut envelope = completed("A", "{}");
        envelope.variables.push(Variable {
            name: "site".to_string(),
            kind: VariableType::String,
            value: json!("south"),
        });

        assert_eq!(names(successors(&it, &envelope).unwrap()), vec!["C"]);
    }

    #[test]
    fn test_expression_without_route_rejects_only_its_target() {
        let it = itinerary(
            vec![
                activity("n1", "A", "Node1", None),
                activity("n2", "B", "Node1", None),
                activity("n3", "C", "Node1", Some("var limit = 3;")),
            ],
            &[("n1", "n2"), ("n1", "n3")],
        );

        let next = successors(&it, &completed("A", r#"{"value":1}"#)).unwrap();
        assert_eq!(names(next), vec!["B"]);
    }

    #[test]
    fn test_failing_expression_aborts_the_walk() {
        let it = itinerary(
            vec![
                activity("n1", "A", "Node1", None),
                activity("n2", "B", "Node1", None),
                activity("n3", "C", "Node1", Some("var route = message.value >")),
            ],
            &[("n1", "n2"), ("n1", "n3")],
        );

        let err = successors(&it, &completed("A", r#"{"value":1}"#)).unwrap_err();
        assert!(matches!(err, RoutingError::Expression { activity, .. } if activity == "C"));
    }

    #[test]
    fn test_unknown_last_activity() {
        let it = itinerary(vec![activity("n1", "A", "Node1", None)], &[]);
        assert!(matches!(
            successors(&it, &completed("Z", "{}")),
            Err(RoutingError::UnknownActivity(name, _)) if name == "Z"
        ));
    }

    #[test]
    fn test_dangling_connection_target() {
        let it = itinerary(vec![activity("n1", "A", "Node1", None)], &[("n1", "n9")]);
        assert!(matches!(
            successors(&it, &completed("A", "{}")),
            Err(RoutingError::UnknownActivity(node, _)) if node == "n9"
        ));
    }

    #[test]
    fn test_terminal_activity_has_no_successors() {
        let it = itinerary(
            vec![
                activity("n1", "A", "Node1", None),
                activity("n2", "B", "Node1", None),
            ],
            &[("n1", "n2")],
        );
        assert!(successors(&it, &completed("B", "{}")).unwrap().is_empty());
    }
}
