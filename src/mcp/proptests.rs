//! Property tests for namespaced routing

use super::*;
use crate::runtime::testing::FakeLauncher;
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

fn arb_ident() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,12}"
}

proptest! {
    #[test]
    fn namespace_splits_back(server in arb_ident(), local in arb_ident()) {
        let name = namespace(&server, &local);
        let (s, t) = split_namespaced(&name).unwrap();
        prop_assert_eq!(s, server.as_str());
        prop_assert_eq!(t, local.as_str());
    }

    #[test]
    fn extra_separators_rejected(parts in prop::collection::vec(arb_ident(), 3..6)) {
        let name = parts.join(SEPARATOR);
        prop_assert!(matches!(split_namespaced(&name), Err(McpError::MalformedName(_))));
    }

    #[test]
    fn names_without_separator_rejected(name in arb_ident()) {
        prop_assert!(matches!(split_namespaced(&name), Err(McpError::MalformedName(_))));
    }

    #[test]
    fn invoke_reaches_owning_server(
        servers in prop::collection::btree_set(arb_ident(), 1..5),
        local in arb_ident(),
        pick in any::<prop::sample::Index>(),
    ) {
        let servers: Vec<String> = servers.into_iter().collect();
        let target = pick.get(&servers).clone();

        let launcher = servers
            .iter()
            .fold(FakeLauncher::new(), |l, id| l.with_server(id, &[local.as_str()]));
        let launcher = Arc::new(launcher);
        let specs: BTreeMap<String, ServerSpec> = servers
            .iter()
            .map(|id| (id.clone(), ServerSpec { command: id.clone(), ..Default::default() }))
            .collect();

        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let registry = McpRegistry::new(launcher.clone(), Duration::from_secs(5));
            registry.register_all(&specs).await.unwrap();
            registry.invoke(&namespace(&target, &local), serde_json::json!({})).await.unwrap();
        });

        let calls = launcher.calls();
        prop_assert_eq!(calls.len(), 1);
        prop_assert_eq!(&calls[0].0, &target);
        prop_assert_eq!(&calls[0].1, &local);
    }
}
