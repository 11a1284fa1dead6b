// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Apex and sub-apex record synthesis, and SOA serial accounting.
//!
//! Three name shapes land here: the zone itself, the nameserver host
//! `<apex>.<zone>` (or the secondary), and unknown names beneath those
//! hosts. Everything else is regular lookup territory and never reaches
//! this module.

use hickory_proto::rr::{Name, Record, RecordType};
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::constants::{
    DEFAULT_SOA_EXPIRE_SECS, DEFAULT_SOA_REFRESH_SECS, DEFAULT_SOA_RETRY_SECS, DEFAULT_TTL_SECS,
    SOA_TTL_SECS,
};
use crate::gateway::lookup::pipeline_lookup;
use crate::gateway::records::{a_records, aaaa_records, ns_record, soa_record, split_families, txt_record};
use crate::gateway::{Assembly, Gateway};

/// SOA timer values (refresh, retry, expire, minimum).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SoaParams {
    /// Secondary refresh interval in seconds
    pub refresh: u32,
    /// Retry interval after a failed refresh
    pub retry: u32,
    /// Time after which secondaries discard the zone
    pub expire: u32,
    /// Negative-caching TTL
    pub minttl: u32,
}

impl Default for SoaParams {
    fn default() -> Self {
        Self {
            refresh: DEFAULT_SOA_REFRESH_SECS,
            retry: DEFAULT_SOA_RETRY_SECS,
            expire: DEFAULT_SOA_EXPIRE_SECS,
            minttl: DEFAULT_TTL_SECS,
        }
    }
}

/// Process-wide SOA serial state.
///
/// `last_serial` only moves forward, and only when the snapshot changed
/// since it was last read: the new value is `max(unix_now, last + 1)`, so
/// serials are strictly increasing across dirty reads even if the clock
/// stalls or steps backwards.
#[derive(Debug)]
pub struct SerialCell {
    state: Mutex<SerialState>,
}

#[derive(Debug)]
struct SerialState {
    last_serial: u32,
    dirty: bool,
}

impl SerialCell {
    /// Create a cell seeded with the current time and a clean snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SerialState {
                last_serial: unix_now(),
                dirty: false,
            }),
        }
    }

    /// Signal that the underlying snapshot changed.
    ///
    /// Called by the indexer layer on every applied watch event.
    pub fn mark_dirty(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.dirty = true;
    }

    /// Current serial, advancing it first if the snapshot is dirty.
    pub(crate) fn serial(&self) -> u32 {
        self.serial_at(unix_now())
    }

    pub(crate) fn serial_at(&self, now: u32) -> u32 {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.dirty {
            state.last_serial = now.max(state.last_serial.saturating_add(1));
            state.dirty = false;
        }
        state.last_serial
    }
}

impl Default for SerialCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Seconds since the Unix epoch, truncated to the SOA serial width.
pub(crate) fn unix_now() -> u32 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0);
    u32::try_from(secs).unwrap_or(u32::MAX)
}

impl Gateway {
    /// Canonical nameserver host for a zone: `<apex>.<zone>`.
    pub(crate) fn apex_host(&self, zone: &str) -> String {
        format!("{}.{}", self.apex_label, zone)
    }

    /// Canonical secondary nameserver host, when one is configured.
    pub(crate) fn secondary_host(&self, zone: &str) -> Option<String> {
        self.secondary_label
            .as_ref()
            .map(|label| format!("{label}.{zone}"))
    }

    /// True when `qname` is the apex itself or lies under a nameserver host.
    pub(crate) fn in_apex_subtree(&self, qname: &str, zone: &str) -> bool {
        if qname == zone {
            return true;
        }
        let apex = self.apex_host(zone);
        if qname == apex || qname.ends_with(&format!(".{apex}")) {
            return true;
        }
        match self.secondary_host(zone) {
            Some(secondary) => qname == secondary || qname.ends_with(&format!(".{secondary}")),
            None => false,
        }
    }

    /// Synthesize the zone SOA with the current serial.
    ///
    /// MNAME is the apex host; RNAME is `<hostmaster>.<apex>.<zone>`.
    pub(crate) fn soa(&self, zone: &str) -> Record {
        let zone_name = name_or_root(zone);
        let mname = name_or_root(&self.apex_host(zone));
        let rname = name_or_root(&format!("{}.{}", self.hostmaster, self.apex_host(zone)));
        soa_record(
            zone_name,
            mname,
            rname,
            SOA_TTL_SECS,
            self.serial.serial(),
            self.soa_params.refresh,
            self.soa_params.retry,
            self.soa_params.expire,
            self.soa_params.minttl,
        )
    }

    /// The NS record set for a zone, owned by `owner`.
    ///
    /// The primary is always present; the secondary only when configured.
    pub(crate) fn ns_set(&self, zone: &str, owner: &Name) -> Vec<Record> {
        let mut records = vec![ns_record(owner, SOA_TTL_SECS, name_or_root(&self.apex_host(zone)))];
        if let Some(secondary) = self.secondary_host(zone) {
            records.push(ns_record(owner, SOA_TTL_SECS, name_or_root(&secondary)));
        }
        records
    }

    /// Address records for the nameserver hosts, from the external-address
    /// callback. Used as NS extras and as zone-transfer glue.
    pub(crate) fn apex_glue(&self, zone: &str) -> Vec<Record> {
        let mut glue = (self.external_address)(&name_or_root(&self.apex_host(zone)));
        if let Some(secondary) = self.secondary_host(zone) {
            glue.extend((self.external_address)(&name_or_root(&secondary)));
        }
        glue
    }

    /// Answer a query whose name lies in the apex subtree.
    pub(crate) fn serve_apex(
        &self,
        zone: &str,
        qname: &str,
        owner: &Name,
        qtype: RecordType,
    ) -> Assembly {
        if qname == zone {
            return self.serve_apex_zone(zone, owner, qtype);
        }

        let at_nameserver = qname == self.apex_host(zone)
            || self.secondary_host(zone).as_deref() == Some(qname);
        if !at_nameserver {
            // Unknown label beneath a nameserver host.
            return Assembly::nxdomain(self.soa(zone));
        }

        match qtype {
            RecordType::A | RecordType::AAAA => {
                let answers: Vec<Record> = (self.external_address)(owner)
                    .into_iter()
                    .filter(|record| record.record_type() == qtype)
                    .collect();
                if answers.is_empty() {
                    Assembly::nodata(self.soa(zone))
                } else {
                    Assembly::answer(answers)
                }
            }
            _ => Assembly::nodata(self.soa(zone)),
        }
    }

    fn serve_apex_zone(&self, zone: &str, owner: &Name, qtype: RecordType) -> Assembly {
        match qtype {
            RecordType::SOA => Assembly::answer(vec![self.soa(zone)]),
            RecordType::NS => {
                let mut assembly = Assembly::answer(self.ns_set(zone, owner));
                assembly.extras = self.apex_glue(zone);
                assembly
            }
            RecordType::A | RecordType::AAAA => {
                let keys = vec![
                    self.apex_host(zone).trim_end_matches('.').to_string(),
                    self.apex_label.clone(),
                ];
                let sets = pipeline_lookup(&self.tables, &[keys]);
                let (v4, v6) = split_families(&sets.addresses);
                let answers = match qtype {
                    RecordType::A => a_records(owner, self.ttl, &v4),
                    _ => aaaa_records(owner, self.ttl, &v6),
                };
                if answers.is_empty() {
                    Assembly::nodata(self.soa(zone))
                } else {
                    Assembly::answer(answers)
                }
            }
            RecordType::TXT => {
                let keys = vec![zone.trim_end_matches('.').to_string()];
                let sets = pipeline_lookup(&self.tables, &[keys]);
                if sets.texts.is_empty() {
                    Assembly::nodata(self.soa(zone))
                } else {
                    let answers = sets
                        .texts
                        .iter()
                        .map(|text| txt_record(owner, self.ttl, text))
                        .collect();
                    Assembly::answer(answers)
                }
            }
            _ => Assembly::nodata(self.soa(zone)),
        }
    }
}

/// Parse a canonical name, falling back to the root name.
///
/// Configuration validation guarantees the zone and apex labels parse; the
/// fallback only guards against hand-built gateways skipping validation.
pub(crate) fn name_or_root(name: &str) -> Name {
    Name::from_str(name).unwrap_or_else(|_| Name::root())
}

#[cfg(test)]
#[path = "apex_tests.rs"]
mod apex_tests;
