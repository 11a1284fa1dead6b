// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Projection of watched cluster objects into lookup tables.
//!
//! Each watched kind gets a [`KubeTable`]: an in-memory index from
//! lowercase hostname keys to record triples, rebuilt wholesale whenever
//! the backing reflector store changes. Extraction is pure — object in,
//! entries out — so every rule (ignore label, class filters, address
//! parsing) is testable without a cluster.
//!
//! Keys come in two forms. Ingresses, routes, and DNSEndpoints yield full
//! hostnames; LoadBalancer Services yield the zone-less `<name>.<namespace>`
//! key (plus any full hostnames from the external-dns annotation). The
//! lookup pipeline probes both forms, so the distinction only matters when
//! a zone transfer qualifies zone-less keys with the zone suffix.

use hickory_proto::rr::Name;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt;
use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use std::sync::{Arc, PoisonError, RwLock};

use crate::constants::SOA_TTL_SECS;
use crate::gateway::records::{a_records, aaaa_records, split_families};
use crate::labels::{HOSTNAME_ANNOTATION, IGNORE_LABEL, IGNORE_LABEL_VALUE, INGRESS_CLASS_ANNOTATION};
use crate::resources::crd::{DNSEndpoint, Gateway, ParentReference};
use crate::resources::{
    ExternalAddressFn, RecordSets, ResourceKind, ResourceTable, ZoneEntry,
};

/// One indexed hostname with its records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct IndexedEntry {
    /// Lowercase key without trailing dot
    pub key: String,
    /// True when the key lacks a zone suffix and must be qualified per zone
    pub zoneless: bool,
    /// The records this key answers with
    pub sets: RecordSets,
}

#[derive(Default)]
struct TableState {
    by_key: HashMap<String, RecordSets>,
    entries: Vec<IndexedEntry>,
}

/// A resource table backed by a reflector store.
///
/// Readers never block on the watchers: the whole index is swapped under a
/// short write lock on each rebuild.
pub struct KubeTable {
    kind: ResourceKind,
    state: RwLock<TableState>,
}

impl KubeTable {
    /// Create an empty table for a resource kind.
    #[must_use]
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            state: RwLock::new(TableState::default()),
        }
    }

    /// Swap in a freshly extracted entry list.
    ///
    /// Entries sharing a key are merged, preserving extraction order.
    pub(crate) fn replace(&self, entries: Vec<IndexedEntry>) {
        let mut by_key: HashMap<String, RecordSets> = HashMap::with_capacity(entries.len());
        for entry in &entries {
            let sets = by_key.entry(entry.key.clone()).or_default();
            sets.addresses.extend(entry.sets.addresses.iter().copied());
            sets.texts.extend(entry.sets.texts.iter().cloned());
            sets.cnames.extend(entry.sets.cnames.iter().cloned());
        }
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.by_key = by_key;
        state.entries = entries;
    }
}

impl ResourceTable for KubeTable {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn lookup(&self, keys: &[String]) -> RecordSets {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        for key in keys {
            if let Some(sets) = state.by_key.get(key) {
                return sets.clone();
            }
        }
        RecordSets::default()
    }

    fn zone_entries(&self, zone: &str) -> Vec<ZoneEntry> {
        let suffix = zone.trim_end_matches('.');
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .entries
            .iter()
            .filter_map(|entry| {
                let fqdn = if entry.zoneless {
                    format!("{}.{}", entry.key, zone)
                } else if entry.key == suffix || entry.key.ends_with(&format!(".{suffix}")) {
                    format!("{}.", entry.key)
                } else {
                    return None;
                };
                if entry.sets.addresses.is_empty() && entry.sets.texts.is_empty() {
                    return None;
                }
                Some(ZoneEntry {
                    fqdn,
                    addresses: entry.sets.addresses.clone(),
                    texts: entry.sets.texts.clone(),
                })
            })
            .collect()
    }
}

fn is_ignored(labels: &BTreeMap<String, String>) -> bool {
    labels.get(IGNORE_LABEL).map(String::as_str) == Some(IGNORE_LABEL_VALUE)
}

fn class_allowed(class: Option<&str>, allowed: Option<&[String]>) -> bool {
    match allowed {
        None => true,
        Some(list) => class.is_some_and(|c| list.iter().any(|allowed| allowed == c)),
    }
}

/// Extract entries from LoadBalancer Services.
///
/// The implicit key is `<name>.<namespace>`; the external-dns hostname
/// annotation adds full-hostname keys. Load-balancer IPs become addresses,
/// load-balancer hostnames become CNAME targets.
pub(crate) fn index_services(services: &[Arc<Service>]) -> Vec<IndexedEntry> {
    let mut entries = Vec::new();
    for service in services {
        if is_ignored(service.labels()) {
            continue;
        }
        let Some(spec) = &service.spec else { continue };
        if spec.type_.as_deref() != Some("LoadBalancer") {
            continue;
        }

        let mut sets = RecordSets::default();
        if let Some(ips) = &spec.external_ips {
            sets.addresses
                .extend(ips.iter().filter_map(|ip| ip.parse::<IpAddr>().ok()));
        }
        if let Some(lb) = service.status.as_ref().and_then(|s| s.load_balancer.as_ref()) {
            for ingress in lb.ingress.as_deref().unwrap_or_default() {
                if let Some(ip) = &ingress.ip {
                    if let Ok(addr) = ip.parse::<IpAddr>() {
                        sets.addresses.push(addr);
                    }
                }
                if let Some(hostname) = &ingress.hostname {
                    sets.cnames.push(hostname.to_ascii_lowercase());
                }
            }
        }
        if sets.is_empty() {
            continue;
        }

        let namespace = service.namespace().unwrap_or_default();
        entries.push(IndexedEntry {
            key: format!("{}.{}", service.name_any(), namespace).to_ascii_lowercase(),
            zoneless: true,
            sets: sets.clone(),
        });

        if let Some(hostnames) = service.annotations().get(HOSTNAME_ANNOTATION) {
            for hostname in hostnames.split(',') {
                let hostname = hostname.trim().trim_end_matches('.');
                if hostname.is_empty() {
                    continue;
                }
                entries.push(IndexedEntry {
                    key: hostname.to_ascii_lowercase(),
                    zoneless: false,
                    sets: sets.clone(),
                });
            }
        }
    }
    entries
}

/// Extract entries from Ingresses, honoring the class allow-list.
pub(crate) fn index_ingresses(
    ingresses: &[Arc<Ingress>],
    classes: Option<&[String]>,
) -> Vec<IndexedEntry> {
    let mut entries = Vec::new();
    for ingress in ingresses {
        if is_ignored(ingress.labels()) {
            continue;
        }
        let class = ingress
            .spec
            .as_ref()
            .and_then(|spec| spec.ingress_class_name.as_deref())
            .or_else(|| {
                ingress
                    .annotations()
                    .get(INGRESS_CLASS_ANNOTATION)
                    .map(String::as_str)
            });
        if !class_allowed(class, classes) {
            continue;
        }

        let mut sets = RecordSets::default();
        if let Some(lb) = ingress.status.as_ref().and_then(|s| s.load_balancer.as_ref()) {
            for lb_ingress in lb.ingress.as_deref().unwrap_or_default() {
                if let Some(ip) = &lb_ingress.ip {
                    if let Ok(addr) = ip.parse::<IpAddr>() {
                        sets.addresses.push(addr);
                    }
                }
                if let Some(hostname) = &lb_ingress.hostname {
                    sets.cnames.push(hostname.to_ascii_lowercase());
                }
            }
        }
        if sets.is_empty() {
            continue;
        }

        for rule in ingress
            .spec
            .as_ref()
            .and_then(|spec| spec.rules.as_deref())
            .unwrap_or_default()
        {
            if let Some(host) = &rule.host {
                let host = host.trim_end_matches('.');
                if host.is_empty() {
                    continue;
                }
                entries.push(IndexedEntry {
                    key: host.to_ascii_lowercase(),
                    zoneless: false,
                    sets: sets.clone(),
                });
            }
        }
    }
    entries
}

/// Hostnames and parent references shared by the three route kinds.
pub(crate) struct RouteHosts {
    pub namespace: String,
    pub hostnames: Vec<String>,
    pub parents: Vec<ParentReference>,
    pub ignored: bool,
}

pub(crate) fn http_route_hosts(
    routes: &[Arc<crate::resources::crd::HTTPRoute>],
) -> Vec<RouteHosts> {
    routes
        .iter()
        .map(|route| RouteHosts {
            namespace: route.namespace().unwrap_or_default(),
            hostnames: route.spec.hostnames.clone().unwrap_or_default(),
            parents: route.spec.parent_refs.clone().unwrap_or_default(),
            ignored: is_ignored(route.labels()),
        })
        .collect()
}

pub(crate) fn tls_route_hosts(
    routes: &[Arc<crate::resources::crd::TLSRoute>],
) -> Vec<RouteHosts> {
    routes
        .iter()
        .map(|route| RouteHosts {
            namespace: route.namespace().unwrap_or_default(),
            hostnames: route.spec.hostnames.clone().unwrap_or_default(),
            parents: route.spec.parent_refs.clone().unwrap_or_default(),
            ignored: is_ignored(route.labels()),
        })
        .collect()
}

pub(crate) fn grpc_route_hosts(
    routes: &[Arc<crate::resources::crd::GRPCRoute>],
) -> Vec<RouteHosts> {
    routes
        .iter()
        .map(|route| RouteHosts {
            namespace: route.namespace().unwrap_or_default(),
            hostnames: route.spec.hostnames.clone().unwrap_or_default(),
            parents: route.spec.parent_refs.clone().unwrap_or_default(),
            ignored: is_ignored(route.labels()),
        })
        .collect()
}

/// Resolve routes to entries via their parent Gateways' addresses.
///
/// Parents that are not Gateways, do not exist, or fail the gateway-class
/// allow-list contribute nothing.
pub(crate) fn index_routes(
    routes: &[RouteHosts],
    gateways: &[Arc<Gateway>],
    classes: Option<&[String]>,
) -> Vec<IndexedEntry> {
    let mut entries = Vec::new();
    for route in routes {
        if route.ignored || route.hostnames.is_empty() {
            continue;
        }

        let mut sets = RecordSets::default();
        for parent in &route.parents {
            if parent.kind.as_deref().is_some_and(|kind| kind != "Gateway") {
                continue;
            }
            let parent_namespace = parent.namespace.as_deref().unwrap_or(&route.namespace);
            let Some(gateway) = gateways.iter().find(|gw| {
                gw.name_any() == parent.name
                    && gw.namespace().as_deref() == Some(parent_namespace)
            }) else {
                continue;
            };
            if is_ignored(gateway.labels()) {
                continue;
            }
            if !class_allowed(Some(gateway.spec.gateway_class_name.as_str()), classes) {
                continue;
            }
            for address in gateway
                .status
                .as_ref()
                .and_then(|status| status.addresses.as_deref())
                .unwrap_or_default()
            {
                match address.value.parse::<IpAddr>() {
                    Ok(addr) => sets.addresses.push(addr),
                    Err(_) => sets.cnames.push(address.value.to_ascii_lowercase()),
                }
            }
        }
        if sets.is_empty() {
            continue;
        }

        for hostname in &route.hostnames {
            let hostname = hostname.trim_end_matches('.');
            if hostname.is_empty() {
                continue;
            }
            entries.push(IndexedEntry {
                key: hostname.to_ascii_lowercase(),
                zoneless: false,
                sets: sets.clone(),
            });
        }
    }
    entries
}

/// Extract entries from DNSEndpoint objects.
///
/// Record sets sharing an owner name accumulate; unknown record types are
/// skipped.
pub(crate) fn index_endpoints(endpoints: &[Arc<DNSEndpoint>]) -> Vec<IndexedEntry> {
    let mut by_key: BTreeMap<String, RecordSets> = BTreeMap::new();
    for endpoint in endpoints {
        if is_ignored(endpoint.labels()) {
            continue;
        }
        for record in endpoint.spec.endpoints.as_deref().unwrap_or_default() {
            let Some(dns_name) = &record.dns_name else { continue };
            let key = dns_name.trim_end_matches('.').to_ascii_lowercase();
            if key.is_empty() {
                continue;
            }
            let targets = record.targets.as_deref().unwrap_or_default();
            let sets = by_key.entry(key).or_default();
            match record.record_type.as_deref() {
                Some("A") | Some("AAAA") => {
                    sets.addresses
                        .extend(targets.iter().filter_map(|t| t.parse::<IpAddr>().ok()));
                }
                Some("TXT") => sets.texts.extend(targets.iter().cloned()),
                Some("CNAME") => sets
                    .cnames
                    .extend(targets.iter().map(|t| t.to_ascii_lowercase())),
                _ => {}
            }
        }
    }
    by_key
        .into_iter()
        .filter(|(_, sets)| !sets.is_empty())
        .map(|(key, sets)| IndexedEntry {
            key,
            zoneless: false,
            sets,
        })
        .collect()
}

/// Build the external-address callback from the Service table.
///
/// The apex label names the resolver's own LoadBalancer Service
/// (`<name>.<namespace>`), so the nameserver addresses come from the same
/// index as everything else: the zone suffix is stripped from the owner and
/// the remainder probed against the Service table.
#[must_use]
pub fn external_address_fn(table: Arc<KubeTable>, zones: Vec<String>) -> ExternalAddressFn {
    Arc::new(move |owner: &Name| {
        let mut name = owner.to_string().to_ascii_lowercase();
        if !name.ends_with('.') {
            name.push('.');
        }
        let mut keys = vec![name.trim_end_matches('.').to_string()];
        if let Some(zone) = zones
            .iter()
            .filter(|zone| name.ends_with(&format!(".{zone}")) || name == **zone)
            .max_by_key(|zone| zone.len())
        {
            let stripped = name[..name.len() - zone.len()]
                .trim_end_matches('.')
                .to_string();
            if !stripped.is_empty() {
                keys.push(stripped);
            }
        }
        let sets = table.lookup(&keys);
        let (v4, v6) = split_families(&sets.addresses);
        let mut records = a_records(owner, SOA_TTL_SECS, &v4);
        records.extend(aaaa_records(owner, SOA_TTL_SECS, &v6));
        records
    })
}

#[cfg(test)]
#[path = "index_tests.rs"]
mod index_tests;
