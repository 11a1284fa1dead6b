// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Tests for configuration loading and validation.

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::constants::{DEFAULT_APEX_LABEL, DEFAULT_TTL_SECS};
    use crate::gateway::Fallthrough;
    use crate::resources::ResourceKind;
    use std::io::Write;

    fn write_config(yaml: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(yaml.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn test_load_minimal_config() {
        let file = write_config("zones:\n  - example.com\n");
        let config = Config::load(file.path()).expect("load");
        assert_eq!(config.zones, vec!["example.com".to_string()]);
        assert_eq!(
            config.resources,
            vec![ResourceKind::Ingress, ResourceKind::Service]
        );
        assert_eq!(config.ttl, DEFAULT_TTL_SECS);
        assert_eq!(config.apex, DEFAULT_APEX_LABEL);
        assert_eq!(config.fallthrough_zones(), Fallthrough::Disabled);
    }

    #[test]
    fn test_load_full_config() {
        let file = write_config(
            "zones:\n  - example.com\n  - sub.example.org\n\
             resources: [HTTPRoute, Ingress, Service]\n\
             ingressClasses: [nginx]\n\
             gatewayClasses: [istio]\n\
             ttl: 30\n\
             apex: ns.dns\n\
             secondary: ns2.dns\n\
             soa:\n  refresh: 7200\n  retry: 300\n  expire: 86400\n\
             fallthrough: [example.com]\n\
             kubeconfig:\n  path: /tmp/kubeconfig\n  context: staging\n",
        );
        let config = Config::load(file.path()).expect("load");
        assert_eq!(config.resources[0], ResourceKind::HTTPRoute);
        assert_eq!(config.ttl, 30);
        assert_eq!(config.secondary.as_deref(), Some("ns2.dns"));
        assert_eq!(config.soa.refresh, 7200);
        assert_eq!(
            config.fallthrough_zones(),
            Fallthrough::Zones(vec!["example.com.".to_string()])
        );
        let kubeconfig = config.kubeconfig.expect("kubeconfig");
        assert_eq!(kubeconfig.context.as_deref(), Some("staging"));
    }

    #[test]
    fn test_empty_fallthrough_means_all_zones() {
        let file = write_config("zones:\n  - example.com\nfallthrough: []\n");
        let config = Config::load(file.path()).expect("load");
        assert_eq!(config.fallthrough_zones(), Fallthrough::All);
    }

    #[test]
    fn test_zones_are_required() {
        let file = write_config("zones: []\n");
        let err = Config::load(file.path()).expect_err("must fail");
        assert!(err.to_string().contains("zones"));
    }

    #[test]
    fn test_ttl_upper_bound() {
        let file = write_config("zones: [example.com]\nttl: 3601\n");
        let err = Config::load(file.path()).expect_err("must fail");
        assert!(err.to_string().contains("ttl"));
    }

    #[test]
    fn test_soa_timers_must_be_positive() {
        let file = write_config("zones: [example.com]\nsoa:\n  refresh: 0\n  retry: 600\n  expire: 86400\n");
        let err = Config::load(file.path()).expect_err("must fail");
        assert!(err.to_string().contains("refresh"));
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let file = write_config("zones: [example.com]\nnotAField: true\n");
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let file = write_config("zones: [example.com]\nttl: 120\n");
        let config = Config::load(file.path()).expect("load");
        let json = serde_json::to_string(&config).expect("serialize");
        let parsed: Config = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.zones, config.zones);
        assert_eq!(parsed.ttl, 120);
    }
}
