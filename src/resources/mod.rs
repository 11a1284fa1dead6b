// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared contracts between the resolution engine and the indexer layer.
//!
//! The engine never talks to the Kubernetes API. It sees cluster state only
//! through the [`ResourceTable`] trait: an ordered list of tables, each
//! answering key probes with a `(addresses, texts, cnames)` triple and, for
//! zone transfers, enumerating every record it contributes to a zone.
//!
//! Production tables are backed by reflector stores ([`index`], [`watch`]);
//! tests use [`StaticTable`]. Both sides of the seam agree on canonical
//! names: keys are lowercase with no trailing dot, owner names in
//! [`ZoneEntry`] are lowercase with a trailing dot.

use hickory_proto::rr::{Name, Record};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

pub mod crd;
pub mod index;
pub mod watch;

/// The Kubernetes resource kinds a table can be backed by.
///
/// The order in which kinds are configured is the lookup priority: the
/// pipeline stops at the first table returning data for a key set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// `networking.k8s.io/v1` Ingress
    Ingress,
    /// `v1` Service of type `LoadBalancer`
    Service,
    /// `gateway.networking.k8s.io` HTTPRoute
    HTTPRoute,
    /// `gateway.networking.k8s.io` TLSRoute
    TLSRoute,
    /// `gateway.networking.k8s.io` GRPCRoute
    GRPCRoute,
    /// `externaldns.k8s.io` DNSEndpoint
    DNSEndpoint,
}

impl ResourceKind {
    /// The kind name as it appears in configuration and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ingress => "Ingress",
            Self::Service => "Service",
            Self::HTTPRoute => "HTTPRoute",
            Self::TLSRoute => "TLSRoute",
            Self::GRPCRoute => "GRPCRoute",
            Self::DNSEndpoint => "DNSEndpoint",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The record triple a lookup returns for one owner name.
///
/// Duplicates are not suppressed here; the dispatcher deduplicates by string
/// form when it assembles a response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordSets {
    /// IPv4 and IPv6 addresses, in the order the object reported them
    pub addresses: Vec<IpAddr>,
    /// TXT payloads
    pub texts: Vec<String>,
    /// CNAME targets, most preferred first
    pub cnames: Vec<String>,
}

impl RecordSets {
    /// True when the triple carries no data at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty() && self.texts.is_empty() && self.cnames.is_empty()
    }

    /// Add an address, builder style.
    #[must_use]
    pub fn with_address(mut self, addr: IpAddr) -> Self {
        self.addresses.push(addr);
        self
    }

    /// Add a TXT payload, builder style.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.texts.push(text.into());
        self
    }

    /// Add a CNAME target, builder style.
    #[must_use]
    pub fn with_cname(mut self, target: impl Into<String>) -> Self {
        self.cnames.push(target.into());
        self
    }
}

/// One owner name's worth of transferable records.
///
/// CNAME targets are deliberately absent: zone transfers emit only address
/// and TXT data collected from the backing stores.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZoneEntry {
    /// Canonical owner name (lowercase, trailing dot)
    pub fqdn: String,
    /// Addresses to emit as A/AAAA records
    pub addresses: Vec<IpAddr>,
    /// Payloads to emit as TXT records
    pub texts: Vec<String>,
}

/// A named, read-only projection of cluster state into DNS data.
///
/// Implementations must be pure with respect to their backing snapshot,
/// non-blocking, and safe for concurrent use.
pub trait ResourceTable: Send + Sync {
    /// Which resource kind backs this table.
    fn kind(&self) -> ResourceKind;

    /// Probe the table with an ordered list of candidate keys.
    ///
    /// Keys are lowercase without a trailing dot. The first key with data
    /// wins; an empty triple means no candidate matched.
    fn lookup(&self, keys: &[String]) -> RecordSets;

    /// Enumerate every record group this table contributes to `zone`.
    ///
    /// `zone` is canonical (lowercase, trailing dot). Owner names that do
    /// not fall inside the zone must be omitted.
    fn zone_entries(&self, zone: &str) -> Vec<ZoneEntry>;
}

/// Callback resolving the resolver's own externally reachable addresses.
///
/// Invoked with the owner name to use on the returned records; the callee
/// produces A/AAAA records for the apex (and secondary) nameserver host.
/// Injected at configuration time so tests can supply canned addresses.
pub type ExternalAddressFn = Arc<dyn Fn(&Name) -> Vec<Record> + Send + Sync>;

/// Readiness predicate: true once the indexer layer finished its initial
/// synchronization.
pub type ReadinessFn = Arc<dyn Fn() -> bool + Send + Sync>;

/// A fixed in-memory resource table.
///
/// Drives the engine without a cluster: integration tests and local
/// experiments insert triples keyed exactly as the indexer layer would.
#[derive(Clone, Debug)]
pub struct StaticTable {
    kind: ResourceKind,
    entries: Vec<(String, RecordSets)>,
}

impl StaticTable {
    /// Create an empty table backed by nothing.
    #[must_use]
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
        }
    }

    /// Insert a triple under a key (lowercase, no trailing dot), builder style.
    #[must_use]
    pub fn with_entry(mut self, key: impl Into<String>, sets: RecordSets) -> Self {
        self.entries.push((key.into(), sets));
        self
    }
}

impl ResourceTable for StaticTable {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn lookup(&self, keys: &[String]) -> RecordSets {
        for key in keys {
            if let Some((_, sets)) = self.entries.iter().find(|(k, _)| k == key) {
                return sets.clone();
            }
        }
        RecordSets::default()
    }

    fn zone_entries(&self, zone: &str) -> Vec<ZoneEntry> {
        let suffix = zone.trim_end_matches('.');
        self.entries
            .iter()
            .filter(|(key, _)| {
                key == suffix || key.ends_with(&format!(".{suffix}"))
            })
            .filter(|(_, sets)| !sets.addresses.is_empty() || !sets.texts.is_empty())
            .map(|(key, sets)| ZoneEntry {
                fqdn: format!("{key}."),
                addresses: sets.addresses.clone(),
                texts: sets.texts.clone(),
            })
            .collect()
    }
}
