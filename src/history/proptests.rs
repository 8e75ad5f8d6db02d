//! Property-based tests for the history window and the turn wire format

use super::{ContentBlock, History, ResultItem, Role, Turn};
use proptest::prelude::*;
use serde_json::json;

fn arb_role() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::User), Just(Role::Assistant)]
}

fn arb_block() -> impl Strategy<Value = ContentBlock> {
    prop_oneof![
        "[a-zA-Z0-9 _.!?,]{0,60}".prop_map(ContentBlock::text),
        ("[a-z0-9_]{3,12}", "[a-z]{1,8}::[a-z_]{1,12}", "[a-z/]{1,20}").prop_map(
            |(id, name, path)| ContentBlock::tool_use(id, name, json!({ "path": path }))
        ),
        ("[a-z0-9_]{3,12}", proptest::collection::vec("[a-zA-Z0-9 .]{0,30}", 0..4)).prop_map(
            |(id, texts)| ContentBlock::tool_result(
                id,
                texts.into_iter().map(ResultItem::text).collect()
            )
        ),
        ("[a-z0-9_]{3,12}", "[a-zA-Z ]{1,30}")
            .prop_map(|(id, message)| ContentBlock::tool_error(id, message)),
    ]
}

fn arb_turn() -> impl Strategy<Value = Turn> {
    (arb_role(), proptest::collection::vec(arb_block(), 0..5))
        .prop_map(|(role, content)| Turn { role, content })
}

proptest! {
    #[test]
    fn prop_window_returns_most_recent_in_order(
        turns in proptest::collection::vec(arb_turn(), 0..30),
        n in 0usize..40,
    ) {
        let mut history = History::new();
        history.append(turns.clone());

        let window = history.recent_window(n);
        prop_assert_eq!(window.len(), n.min(turns.len()));
        prop_assert_eq!(window, &turns[turns.len() - window.len()..]);
    }

    #[test]
    fn prop_append_is_additive(
        first in proptest::collection::vec(arb_turn(), 0..10),
        second in proptest::collection::vec(arb_turn(), 0..10),
    ) {
        let mut history = History::new();
        history.append(first.clone());
        history.append(second.clone());

        prop_assert_eq!(history.len(), first.len() + second.len());
        prop_assert_eq!(history.recent_window(second.len()), second.as_slice());
    }

    #[test]
    fn prop_turn_survives_wire_format(turn in arb_turn()) {
        let encoded = serde_json::to_string(&turn).unwrap();
        let decoded: Turn = serde_json::from_str(&encoded).unwrap();
        prop_assert_eq!(decoded, turn);
    }
}
