// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Configuration surface of the resolver.
//!
//! The configuration is a small YAML document selected on the command
//! line. It enumerates the served zones, which resource kinds to watch and
//! in what priority order, class allow-lists, TTL and SOA timers, the apex
//! labels, fall-through zones, and optional out-of-cluster access.
//!
//! ```yaml
//! zones:
//!   - example.com
//! resources: [Ingress, Service, HTTPRoute]
//! ttl: 60
//! apex: dns1.kube-system
//! soa:
//!   refresh: 3600
//!   retry: 600
//!   expire: 604800
//! fallthrough: [example.com]
//! ```

use hickory_proto::rr::Name;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::constants::{
    DEFAULT_APEX_LABEL, DEFAULT_SOA_EXPIRE_SECS, DEFAULT_SOA_REFRESH_SECS,
    DEFAULT_SOA_RETRY_SECS, DEFAULT_TTL_SECS, MAX_TTL_SECS,
};
use crate::errors::ConfigError;
use crate::gateway::Fallthrough;
use crate::resources::ResourceKind;

/// SOA timer values carried in the configuration file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoaTimers {
    /// Secondary refresh interval in seconds
    pub refresh: u32,
    /// Retry interval after a failed refresh
    pub retry: u32,
    /// Time after which secondaries discard the zone
    pub expire: u32,
}

impl Default for SoaTimers {
    fn default() -> Self {
        Self {
            refresh: DEFAULT_SOA_REFRESH_SECS,
            retry: DEFAULT_SOA_RETRY_SECS,
            expire: DEFAULT_SOA_EXPIRE_SECS,
        }
    }
}

/// Reference to a kubeconfig for out-of-cluster access.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeconfigRef {
    /// Path to the kubeconfig file
    pub path: String,
    /// Context to select; the file's current context when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Top-level resolver configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    /// DNS suffixes this instance is authoritative for
    pub zones: Vec<String>,

    /// Resource kinds to watch, in lookup priority order
    #[serde(default = "default_resources")]
    pub resources: Vec<ResourceKind>,

    /// Allow-list of ingress classes; all classes when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_classes: Option<Vec<String>>,

    /// Allow-list of gateway classes; all classes when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_classes: Option<Vec<String>>,

    /// TTL for answer records, seconds (0–3600)
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    /// Apex label naming this instance's nameserver within each zone
    #[serde(default = "default_apex")]
    pub apex: String,

    /// Optional secondary nameserver label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,

    /// SOA refresh/retry/expire timers
    #[serde(default)]
    pub soa: SoaTimers,

    /// Zones for which no-data queries are delegated to the next handler.
    /// Present-but-empty means every served zone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallthrough: Option<Vec<String>>,

    /// Out-of-cluster access; in-cluster configuration when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<KubeconfigRef>,
}

fn default_resources() -> Vec<ResourceKind> {
    vec![ResourceKind::Ingress, ResourceKind::Service]
}

fn default_ttl() -> u32 {
    DEFAULT_TTL_SECS
}

fn default_apex() -> String {
    DEFAULT_APEX_LABEL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            zones: Vec::new(),
            resources: default_resources(),
            ingress_classes: None,
            gateway_classes: None,
            ttl: default_ttl(),
            apex: default_apex(),
            secondary: None,
            soa: SoaTimers::default(),
            fallthrough: None,
            kubeconfig: None,
        }
    }
}

impl Config {
    /// Load and validate a configuration file.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] when the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field values.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.zones.is_empty() {
            return Err(ConfigError::Invalid {
                field: "zones",
                reason: "at least one zone is required".to_string(),
            });
        }
        for zone in &self.zones {
            if Name::from_str(zone).is_err() {
                return Err(ConfigError::Invalid {
                    field: "zones",
                    reason: format!("'{zone}' is not a valid DNS name"),
                });
            }
        }
        if self.ttl > MAX_TTL_SECS {
            return Err(ConfigError::Invalid {
                field: "ttl",
                reason: format!("{} exceeds the maximum of {MAX_TTL_SECS}", self.ttl),
            });
        }
        if self.resources.is_empty() {
            return Err(ConfigError::Invalid {
                field: "resources",
                reason: "at least one resource kind is required".to_string(),
            });
        }
        for label in std::iter::once(&self.apex).chain(self.secondary.iter()) {
            if Name::from_str(label).is_err() {
                return Err(ConfigError::Invalid {
                    field: "apex",
                    reason: format!("'{label}' is not a valid DNS label sequence"),
                });
            }
        }
        for timer in [
            ("soa.refresh", self.soa.refresh),
            ("soa.retry", self.soa.retry),
            ("soa.expire", self.soa.expire),
        ] {
            if timer.1 == 0 {
                return Err(ConfigError::Invalid {
                    field: "soa",
                    reason: format!("{} must be positive", timer.0),
                });
            }
        }
        if let Some(fallthrough) = &self.fallthrough {
            for zone in fallthrough {
                if Name::from_str(zone).is_err() {
                    return Err(ConfigError::Invalid {
                        field: "fallthrough",
                        reason: format!("'{zone}' is not a valid DNS name"),
                    });
                }
            }
        }
        Ok(())
    }

    /// The fall-through policy this configuration describes.
    #[must_use]
    pub fn fallthrough_zones(&self) -> Fallthrough {
        match &self.fallthrough {
            None => Fallthrough::Disabled,
            Some(zones) if zones.is_empty() => Fallthrough::All,
            Some(zones) => Fallthrough::Zones(
                zones
                    .iter()
                    .map(|zone| {
                        let mut canonical = zone.to_ascii_lowercase();
                        if !canonical.ends_with('.') {
                            canonical.push('.');
                        }
                        canonical
                    })
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
