// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Tests for index key construction and pipeline ordering.

#[cfg(test)]
mod tests {
    use crate::gateway::lookup::{
        build_key_sets, canonical, is_in_zone, longest_zone, pipeline_lookup,
    };
    use crate::resources::{RecordSets, ResourceKind, ResourceTable, StaticTable};
    use std::sync::Arc;

    #[test]
    fn test_canonical_lowercases_and_appends_dot() {
        assert_eq!(canonical("SVC1.Example.COM"), "svc1.example.com.");
        assert_eq!(canonical("svc1.example.com."), "svc1.example.com.");
    }

    #[test]
    fn test_is_in_zone_requires_label_boundary() {
        assert!(is_in_zone("svc1.example.com.", "example.com."));
        assert!(is_in_zone("example.com.", "example.com."));
        assert!(!is_in_zone("notexample.com.", "example.com."));
        assert!(!is_in_zone("example.org.", "example.com."));
    }

    #[test]
    fn test_longest_zone_wins() {
        let zones = vec!["example.com.".to_string(), "sub.example.com.".to_string()];
        assert_eq!(
            longest_zone(&zones, "a.sub.example.com."),
            Some("sub.example.com.")
        );
        assert_eq!(longest_zone(&zones, "a.example.com."), Some("example.com."));
        assert_eq!(longest_zone(&zones, "a.example.org."), None);
    }

    #[test]
    fn test_key_sets_specific_then_wildcard() {
        let sets = build_key_sets("svc1.ns1.example.com.", "example.com.");
        assert_eq!(
            sets,
            vec![
                vec!["svc1.ns1.example.com".to_string(), "svc1.ns1".to_string()],
                vec!["*.ns1.example.com".to_string(), "*.ns1".to_string()],
            ]
        );
    }

    #[test]
    fn test_key_sets_single_label_wildcards_to_star() {
        let sets = build_key_sets("svc1.example.com.", "example.com.");
        assert_eq!(
            sets,
            vec![
                vec!["svc1.example.com".to_string(), "svc1".to_string()],
                vec!["*.example.com".to_string(), "*".to_string()],
            ]
        );
    }

    #[test]
    fn test_key_sets_at_apex_have_no_wildcard() {
        let sets = build_key_sets("example.com.", "example.com.");
        assert_eq!(sets, vec![vec!["example.com".to_string()]]);
    }

    #[test]
    fn test_key_sets_outside_zone_keep_full_form_only() {
        let sets = build_key_sets("ext.example.org.", "example.com.");
        assert_eq!(sets, vec![vec!["ext.example.org".to_string()]]);
    }

    fn addr_sets(ip: &str) -> RecordSets {
        RecordSets::default().with_address(ip.parse().unwrap())
    }

    #[test]
    fn test_pipeline_respects_table_order() {
        let first: Arc<dyn ResourceTable> = Arc::new(
            StaticTable::new(ResourceKind::HTTPRoute).with_entry("web.example.com", addr_sets("192.0.2.1")),
        );
        let second: Arc<dyn ResourceTable> = Arc::new(
            StaticTable::new(ResourceKind::Ingress).with_entry("web.example.com", addr_sets("192.0.2.2")),
        );
        let sets = pipeline_lookup(
            &[first, second],
            &build_key_sets("web.example.com.", "example.com."),
        );
        assert_eq!(sets.addresses, vec!["192.0.2.1".parse::<std::net::IpAddr>().unwrap()]);
    }

    #[test]
    fn test_exact_match_beats_wildcard_in_lower_priority_table() {
        // A wildcard in the highest-priority table must not mask an exact
        // match elsewhere: all tables see the specific keys first.
        let wildcard_table: Arc<dyn ResourceTable> = Arc::new(
            StaticTable::new(ResourceKind::HTTPRoute)
                .with_entry("*.w.example.com", addr_sets("192.0.0.6")),
        );
        let exact_table: Arc<dyn ResourceTable> = Arc::new(
            StaticTable::new(ResourceKind::Service)
                .with_entry("a.w.example.com", addr_sets("192.0.0.7")),
        );
        let sets = pipeline_lookup(
            &[wildcard_table, exact_table],
            &build_key_sets("a.w.example.com.", "example.com."),
        );
        assert_eq!(
            sets.addresses,
            vec!["192.0.0.7".parse::<std::net::IpAddr>().unwrap()]
        );
    }

    #[test]
    fn test_wildcard_answers_when_nothing_specific_matches() {
        let table: Arc<dyn ResourceTable> = Arc::new(
            StaticTable::new(ResourceKind::Ingress)
                .with_entry("*.w.example.com", addr_sets("192.0.0.6")),
        );
        let sets = pipeline_lookup(
            &[table],
            &build_key_sets("missing.w.example.com.", "example.com."),
        );
        assert_eq!(
            sets.addresses,
            vec!["192.0.0.6".parse::<std::net::IpAddr>().unwrap()]
        );
    }

    #[test]
    fn test_pipeline_exhausted_returns_empty() {
        let table: Arc<dyn ResourceTable> = Arc::new(StaticTable::new(ResourceKind::Ingress));
        let sets = pipeline_lookup(&[table], &build_key_sets("a.example.com.", "example.com."));
        assert!(sets.is_empty());
    }
}
