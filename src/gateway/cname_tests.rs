// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Tests for CNAME chain resolution.

#[cfg(test)]
mod tests {
    use crate::errors::ChainError;
    use crate::gateway::cname::{resolve_chain, ChainOutcome, ResolvedAddresses};
    use crate::resources::{RecordSets, ResourceKind, ResourceTable, StaticTable};
    use std::collections::HashSet;
    use std::sync::Arc;

    const ZONE: &str = "example.com.";

    fn tables(entries: &[(&str, RecordSets)]) -> Vec<Arc<dyn ResourceTable>> {
        let mut table = StaticTable::new(ResourceKind::Ingress);
        for (key, sets) in entries {
            table = table.with_entry(*key, sets.clone());
        }
        vec![Arc::new(table)]
    }

    fn cname_to(target: &str) -> RecordSets {
        RecordSets::default().with_cname(target)
    }

    #[test]
    fn test_chain_resolves_to_final_addresses() {
        let tables = tables(&[
            ("app.example.com", cname_to("service.example.com.")),
            ("service.example.com", cname_to("api.example.com.")),
            (
                "api.example.com",
                RecordSets::default()
                    .with_address("10.0.1.100".parse().unwrap())
                    .with_address("10.0.1.101".parse().unwrap()),
            ),
        ]);
        let mut visited = HashSet::new();
        let outcome =
            resolve_chain(&tables, ZONE, "app.example.com.", 10, &mut visited).expect("resolve");
        assert_eq!(
            outcome,
            ChainOutcome::Resolved(ResolvedAddresses {
                owner: "api.example.com.".to_string(),
                addresses: vec![
                    "10.0.1.100".parse().unwrap(),
                    "10.0.1.101".parse().unwrap()
                ],
            })
        );
    }

    #[test]
    fn test_loop_is_detected() {
        let tables = tables(&[
            ("loop1.example.com", cname_to("loop2.example.com.")),
            ("loop2.example.com", cname_to("loop1.example.com.")),
        ]);
        let mut visited = HashSet::new();
        let err = resolve_chain(&tables, ZONE, "loop2.example.com.", 10, &mut visited)
            .expect_err("loop must fail");
        assert!(matches!(err, ChainError::LoopDetected { target } if target == "loop2.example.com."));
    }

    #[test]
    fn test_self_referential_target_is_a_loop() {
        let tables = tables(&[("me.example.com", cname_to("me.example.com."))]);
        let mut visited = HashSet::new();
        let err = resolve_chain(&tables, ZONE, "me.example.com.", 10, &mut visited)
            .expect_err("self loop must fail");
        assert!(matches!(err, ChainError::LoopDetected { .. }));
    }

    #[test]
    fn test_depth_limit_is_enforced() {
        let mut entries = Vec::new();
        for hop in 0..12 {
            entries.push((
                format!("c{hop}.example.com"),
                cname_to(&format!("c{}.example.com.", hop + 1)),
            ));
        }
        entries.push((
            "c12.example.com".to_string(),
            RecordSets::default().with_address("192.0.2.1".parse().unwrap()),
        ));
        let borrowed: Vec<(&str, RecordSets)> = entries
            .iter()
            .map(|(key, sets)| (key.as_str(), sets.clone()))
            .collect();
        let tables = tables(&borrowed);

        let mut visited = HashSet::new();
        let err = resolve_chain(&tables, ZONE, "c0.example.com.", 10, &mut visited)
            .expect_err("depth must be exhausted");
        assert!(matches!(err, ChainError::DepthExhausted { limit: 10, .. }));
    }

    #[test]
    fn test_external_target_is_not_an_error() {
        let tables = tables(&[("alias.example.com", cname_to("cdn.provider.net."))]);
        let mut visited = HashSet::new();
        let outcome = resolve_chain(&tables, ZONE, "alias.example.com.", 10, &mut visited)
            .expect("external is a success");
        assert_eq!(outcome, ChainOutcome::External);
    }

    #[test]
    fn test_in_zone_dead_end_fails() {
        let tables = tables(&[("alias.example.com", cname_to("missing.example.com."))]);
        let mut visited = HashSet::new();
        let err = resolve_chain(&tables, ZONE, "alias.example.com.", 10, &mut visited)
            .expect_err("dead end must fail");
        assert!(
            matches!(err, ChainError::DeadEnd { target, .. } if target == "missing.example.com.")
        );
    }

    #[test]
    fn test_target_case_is_canonicalized() {
        let tables = tables(&[(
            "api.example.com",
            RecordSets::default().with_address("192.0.2.9".parse().unwrap()),
        )]);
        let mut visited = HashSet::new();
        let outcome = resolve_chain(&tables, ZONE, "API.Example.COM", 10, &mut visited)
            .expect("mixed case resolves");
        assert!(matches!(outcome, ChainOutcome::Resolved(resolved) if resolved.owner == "api.example.com."));
    }

    #[test]
    fn test_visited_names_accumulate_across_the_chain() {
        let tables = tables(&[
            ("a.example.com", cname_to("b.example.com.")),
            (
                "b.example.com",
                RecordSets::default().with_address("192.0.2.1".parse().unwrap()),
            ),
        ]);
        let mut visited = HashSet::new();
        resolve_chain(&tables, ZONE, "a.example.com.", 10, &mut visited).expect("resolve");
        assert!(visited.contains("a.example.com."));
        assert!(visited.contains("b.example.com."));
    }
}
