// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Streaming zone transfer producer (AXFR, with the IXFR fast path).
//!
//! A transfer is a channel of record groups: the opening SOA, the NS set,
//! apex glue, one group per owner name in ascending lexicographic order,
//! and a closing SOA identical to the opening one. When the caller already
//! holds the current serial, the stream is a single SOA.
//!
//! The producer runs as its own task. Its body is wrapped in
//! `catch_unwind`: a panic while walking a resource table is logged with a
//! backtrace and drops the sender, so the consumer always observes a
//! cleanly closed stream.

use futures::FutureExt;
use hickory_proto::rr::{RData, Record};
use std::backtrace::Backtrace;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::constants::TRANSFER_CHANNEL_CAPACITY;
use crate::errors::TransferError;
use crate::gateway::apex::name_or_root;
use crate::gateway::lookup::canonical;
use crate::gateway::records::{a_records, aaaa_records, split_families, txt_record};
use crate::gateway::Gateway;

impl Gateway {
    /// Start a zone transfer and hand back the stream of record groups.
    ///
    /// `client_serial` is the serial the caller already holds; zero requests
    /// a full transfer. A caller whose non-zero serial matches the current
    /// one receives a single SOA group and an immediately closed channel.
    ///
    /// # Errors
    ///
    /// [`TransferError::NotAuthoritative`] when `zone` is not served.
    pub fn transfer(
        self: &Arc<Self>,
        zone: &str,
        client_serial: u32,
    ) -> Result<mpsc::Receiver<Vec<Record>>, TransferError> {
        let zone = canonical(zone);
        if !self.zones.iter().any(|served| *served == zone) {
            return Err(TransferError::NotAuthoritative { zone });
        }

        let soa = self.soa(&zone);
        let serial = match soa.data() {
            Some(RData::SOA(data)) => data.serial(),
            _ => 0,
        };

        let (tx, rx) = mpsc::channel(TRANSFER_CHANNEL_CAPACITY);

        if client_serial != 0 && client_serial == serial {
            debug!(zone = %zone, serial, "transfer already current, answering with SOA only");
            // Capacity is nonzero, so this send cannot fail.
            let _ = tx.try_send(vec![soa]);
            return Ok(rx);
        }

        let gateway = Arc::clone(self);
        tokio::spawn(async move {
            let produced = AssertUnwindSafe(gateway.produce_transfer(&zone, soa, tx))
                .catch_unwind()
                .await;
            if let Err(panic) = produced {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(ToString::to_string)
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(
                    reason = %reason,
                    backtrace = %Backtrace::force_capture(),
                    "zone transfer producer panicked; stream closed early"
                );
            }
        });
        Ok(rx)
    }

    async fn produce_transfer(&self, zone: &str, soa: Record, tx: mpsc::Sender<Vec<Record>>) {
        if tx.send(vec![soa.clone()]).await.is_err() {
            return;
        }

        let owner = name_or_root(zone);
        if tx.send(self.ns_set(zone, &owner)).await.is_err() {
            return;
        }

        let glue = self.apex_glue(zone);
        if !glue.is_empty() && tx.send(glue).await.is_err() {
            return;
        }

        for (_, group) in self.collect_zone_groups(zone) {
            if tx.send(group).await.is_err() {
                return;
            }
        }

        let _ = tx.send(vec![soa]).await;
    }

    /// Gather every per-owner record group the resource tables contribute.
    ///
    /// Groups come back keyed by canonical owner name; the BTreeMap keeps
    /// them in the lexicographic order the stream promises.
    pub(crate) fn collect_zone_groups(&self, zone: &str) -> BTreeMap<String, Vec<Record>> {
        let mut groups: BTreeMap<String, Vec<Record>> = BTreeMap::new();
        for table in &self.tables {
            for entry in table.zone_entries(zone) {
                let owner = name_or_root(&entry.fqdn);
                let group = groups.entry(entry.fqdn).or_default();
                let (v4, v6) = split_families(&entry.addresses);
                group.extend(a_records(&owner, self.ttl, &v4));
                group.extend(aaaa_records(&owner, self.ttl, &v6));
                group.extend(
                    entry
                        .texts
                        .iter()
                        .map(|text| txt_record(&owner, self.ttl, text)),
                );
            }
        }
        groups.retain(|_, group| !group.is_empty());
        groups
    }
}

#[cfg(test)]
#[path = "transfer_tests.rs"]
mod transfer_tests;
