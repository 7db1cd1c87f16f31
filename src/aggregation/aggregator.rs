//! # Aggregator
//!
//! Derives a parent command's response from its children.
//!
//! While any child is still running the parent is `Started`. Once every child
//! is terminal the parent resolves with fixed precedence
//! `Error` > `Cancelled` > `Locked` > `Completed`, independent of the order in
//! which child updates arrived.

use crate::models::{CommandId, ResponseKind};
use serde_json::Value;

#[derive(Debug, Default, Clone, Copy)]
pub struct Aggregator;

impl Aggregator {
    /// Compute the parent response from `(child, response)` pairs in declared order
    pub fn compute(children: &[(CommandId, ResponseKind)]) -> ResponseKind {
        if children.iter().any(|(_, kind)| !kind.is_terminal()) {
            return ResponseKind::Started;
        }

        let failures: Vec<String> = children
            .iter()
            .filter_map(|(id, kind)| kind.error_message().map(|msg| format!("child {id}: {msg}")))
            .collect();
        if !failures.is_empty() {
            return ResponseKind::Error(failures.join("; "));
        }

        if children
            .iter()
            .any(|(_, kind)| matches!(kind, ResponseKind::Cancelled))
        {
            return ResponseKind::Cancelled;
        }

        if children
            .iter()
            .any(|(_, kind)| matches!(kind, ResponseKind::Locked))
        {
            return ResponseKind::Locked;
        }

        let results = children
            .iter()
            .map(|(_, kind)| kind.result().cloned().unwrap_or(Value::Null))
            .collect();
        ResponseKind::Completed(Value::Array(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn ids(n: usize) -> Vec<CommandId> {
        (0..n).map(|_| CommandId::from_uuid(Uuid::new_v4())).collect()
    }

    #[test]
    fn test_running_child_keeps_parent_started() {
        let c = ids(2);
        let kind = Aggregator::compute(&[
            (c[0], ResponseKind::Error("x".into())),
            (c[1], ResponseKind::Accepted),
        ]);
        assert_eq!(kind, ResponseKind::Started);
    }

    #[test]
    fn test_error_message_names_failing_children() {
        let c = ids(3);
        let kind = Aggregator::compute(&[
            (c[0], ResponseKind::Completed(json!(1))),
            (c[1], ResponseKind::Error("fail".into())),
            (c[2], ResponseKind::Error("worse".into())),
        ]);
        let msg = kind.error_message().unwrap();
        assert!(msg.contains(&c[1].to_string()));
        assert!(msg.contains("fail"));
        assert!(msg.contains(&c[2].to_string()));
        assert!(!msg.contains(&c[0].to_string()));
    }

    #[test]
    fn test_precedence() {
        let c = ids(3);
        assert!(matches!(
            Aggregator::compute(&[
                (c[0], ResponseKind::Cancelled),
                (c[1], ResponseKind::Error("e".into())),
            ]),
            ResponseKind::Error(_)
        ));
        assert_eq!(
            Aggregator::compute(&[
                (c[0], ResponseKind::Locked),
                (c[1], ResponseKind::Cancelled),
                (c[2], ResponseKind::Completed(json!(null))),
            ]),
            ResponseKind::Cancelled
        );
        assert_eq!(
            Aggregator::compute(&[
                (c[0], ResponseKind::Completed(json!(1))),
                (c[1], ResponseKind::Locked),
            ]),
            ResponseKind::Locked
        );
    }

    #[test]
    fn test_all_completed_collects_results_in_child_order() {
        let c = ids(2);
        let kind = Aggregator::compute(&[
            (c[0], ResponseKind::Completed(json!("a"))),
            (c[1], ResponseKind::Completed(json!({"b": 2}))),
        ]);
        assert_eq!(kind, ResponseKind::Completed(json!(["a", {"b": 2}])));
    }
}
