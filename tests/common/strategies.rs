use command_response_manager::ResponseKind;
use proptest::prelude::*;

/// Strategy for generating any terminal response
pub fn terminal_kind_strategy() -> impl Strategy<Value = ResponseKind> {
    prop_oneof![
        any::<i64>().prop_map(|n| ResponseKind::Completed(serde_json::json!(n))),
        "[a-z]{1,12}".prop_map(ResponseKind::Error),
        Just(ResponseKind::Cancelled),
        Just(ResponseKind::Locked),
    ]
}

/// Strategy for generating child outcomes plus an arrival order over them
pub fn children_with_order_strategy() -> impl Strategy<Value = (Vec<ResponseKind>, Vec<usize>)> {
    prop::collection::vec(terminal_kind_strategy(), 1..8).prop_flat_map(|kinds| {
        let order: Vec<usize> = (0..kinds.len()).collect();
        (Just(kinds), Just(order).prop_shuffle())
    })
}

/// Expected parent outcome class under Error > Cancelled > Locked > Completed
pub fn expected_parent_kind_name(kinds: &[ResponseKind]) -> &'static str {
    if kinds.iter().any(|k| matches!(k, ResponseKind::Error(_))) {
        "error"
    } else if kinds.iter().any(|k| matches!(k, ResponseKind::Cancelled)) {
        "cancelled"
    } else if kinds.iter().any(|k| matches!(k, ResponseKind::Locked)) {
        "locked"
    } else {
        "completed"
    }
}
