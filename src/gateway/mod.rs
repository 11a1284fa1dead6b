// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The DNS resolution engine.
//!
//! [`Gateway`] answers queries for the configured zones from an ordered
//! list of resource tables. A query flows through the dispatcher
//! ([`Gateway::serve_dns`]): zone match, readiness check, apex routing,
//! index lookup with wildcard fallback, CNAME chain resolution, and
//! type-specific response assembly. Zone transfers run as a separate
//! streaming flow ([`Gateway::transfer`]).
//!
//! The engine holds no per-request mutable state; the SOA serial cell is
//! the single shared cell and sits behind a mutex. Everything else is
//! written once at setup and read concurrently.

use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, Query, ResponseCode};
use hickory_proto::rr::{Name, RData, Record, RecordType};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::Config;
use crate::constants::{
    CNAME_CHAIN_DEPTH_LIMIT, DEFAULT_APEX_LABEL, DEFAULT_HOSTMASTER, DEFAULT_TTL_SECS,
    PLUGIN_NAME, TRANSFER_MESSAGE_MAX_RECORDS,
};
use crate::errors::{GatewayError, TransferError};
use crate::metrics;
use crate::resources::{ExternalAddressFn, ReadinessFn, RecordSets, ResourceTable};

pub mod apex;
mod cname;
mod lookup;
pub(crate) mod records;
mod transfer;

pub use apex::{SerialCell, SoaParams};

use apex::name_or_root;
use cname::{resolve_chain, ChainOutcome};
use lookup::{build_key_sets, canonical, longest_zone, pipeline_lookup};
use records::{
    a_records, aaaa_records, cname_record, dedup_records, split_families, txt_record,
};

/// Sink for response messages.
///
/// Ordinary queries produce exactly one message; zone transfers write a
/// sequence, which only transports reporting `multi_message` support
/// (in practice: TCP) may receive.
#[async_trait]
pub trait ResponseWriter: Send {
    /// Write one response message to the caller.
    async fn write(&mut self, response: Message) -> std::io::Result<()>;

    /// Whether this writer can carry a multi-message response stream.
    fn multi_message(&self) -> bool {
        false
    }
}

/// What the dispatcher did with a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServeOutcome {
    /// A response was written with this code.
    Written(ResponseCode),
    /// The query is not ours (zone miss or fall-through); the caller should
    /// hand it to the next handler.
    Delegated,
}

/// Zones for which no-data queries are delegated instead of answered.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Fallthrough {
    /// Never fall through.
    #[default]
    Disabled,
    /// Fall through for every served zone.
    All,
    /// Fall through only for these zones (canonical form).
    Zones(Vec<String>),
}

impl Fallthrough {
    /// Whether fall-through is enabled for `zone` (canonical form).
    #[must_use]
    pub fn matches(&self, zone: &str) -> bool {
        match self {
            Self::Disabled => false,
            Self::All => true,
            Self::Zones(zones) => zones.iter().any(|z| z == zone),
        }
    }
}

/// A fully assembled response before it is written: section contents plus
/// the response code.
#[derive(Clone, Debug)]
pub(crate) struct Assembly {
    pub answers: Vec<Record>,
    pub authorities: Vec<Record>,
    pub extras: Vec<Record>,
    pub rcode: ResponseCode,
}

impl Assembly {
    fn empty(rcode: ResponseCode) -> Self {
        Self {
            answers: Vec::new(),
            authorities: Vec::new(),
            extras: Vec::new(),
            rcode,
        }
    }

    /// A successful answer.
    pub(crate) fn answer(answers: Vec<Record>) -> Self {
        Self {
            answers,
            ..Self::empty(ResponseCode::NoError)
        }
    }

    /// The name exists but has no data for this type: SOA in authority,
    /// NOERROR.
    pub(crate) fn nodata(soa: Record) -> Self {
        Self {
            authorities: vec![soa],
            ..Self::empty(ResponseCode::NoError)
        }
    }

    /// The name does not exist: SOA in authority, NXDOMAIN.
    pub(crate) fn nxdomain(soa: Record) -> Self {
        Self {
            authorities: vec![soa],
            ..Self::empty(ResponseCode::NXDomain)
        }
    }
}

/// The authoritative resolution engine.
///
/// Construct with [`Gateway::new`] or [`Gateway::from_config`], wire the
/// indexer layer in with [`Gateway::with_external_address`] and
/// [`Gateway::with_readiness`], then share behind an [`Arc`].
pub struct Gateway {
    pub(crate) zones: Vec<String>,
    pub(crate) tables: Vec<Arc<dyn ResourceTable>>,
    pub(crate) ttl: u32,
    pub(crate) apex_label: String,
    pub(crate) secondary_label: Option<String>,
    pub(crate) hostmaster: String,
    pub(crate) soa_params: SoaParams,
    pub(crate) serial: Arc<SerialCell>,
    pub(crate) fallthrough: Fallthrough,
    pub(crate) external_address: ExternalAddressFn,
    pub(crate) has_synced: ReadinessFn,
}

impl Gateway {
    /// Create an engine for `zones` over `tables` with default settings.
    ///
    /// Zones are canonicalized; table order is the lookup priority.
    #[must_use]
    pub fn new(zones: Vec<String>, tables: Vec<Arc<dyn ResourceTable>>) -> Self {
        Self {
            zones: zones.iter().map(|zone| canonical(zone)).collect(),
            tables,
            ttl: DEFAULT_TTL_SECS,
            apex_label: DEFAULT_APEX_LABEL.to_string(),
            secondary_label: None,
            hostmaster: DEFAULT_HOSTMASTER.to_string(),
            soa_params: SoaParams::default(),
            serial: Arc::new(SerialCell::new()),
            fallthrough: Fallthrough::Disabled,
            external_address: Arc::new(|_: &Name| Vec::new()),
            has_synced: Arc::new(|| true),
        }
    }

    /// Create an engine from the loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config, tables: Vec<Arc<dyn ResourceTable>>) -> Self {
        let mut gateway = Self::new(config.zones.clone(), tables)
            .with_ttl(config.ttl)
            .with_apex(&config.apex)
            .with_soa_params(SoaParams {
                refresh: config.soa.refresh,
                retry: config.soa.retry,
                expire: config.soa.expire,
                minttl: config.ttl,
            })
            .with_fallthrough(config.fallthrough_zones());
        if let Some(secondary) = &config.secondary {
            gateway = gateway.with_secondary(secondary);
        }
        gateway
    }

    /// Set the answer TTL.
    #[must_use]
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the apex label.
    #[must_use]
    pub fn with_apex(mut self, label: &str) -> Self {
        self.apex_label = label.trim_end_matches('.').to_ascii_lowercase();
        self
    }

    /// Set the secondary nameserver label.
    #[must_use]
    pub fn with_secondary(mut self, label: &str) -> Self {
        self.secondary_label = Some(label.trim_end_matches('.').to_ascii_lowercase());
        self
    }

    /// Set the hostmaster local-part of the SOA RNAME.
    #[must_use]
    pub fn with_hostmaster(mut self, hostmaster: &str) -> Self {
        self.hostmaster = hostmaster.trim_end_matches('.').to_ascii_lowercase();
        self
    }

    /// Set the SOA timer values.
    #[must_use]
    pub fn with_soa_params(mut self, params: SoaParams) -> Self {
        self.soa_params = params;
        self
    }

    /// Set the fall-through policy.
    #[must_use]
    pub fn with_fallthrough(mut self, fallthrough: Fallthrough) -> Self {
        self.fallthrough = fallthrough;
        self
    }

    /// Inject the external-address callback used for apex and sub-apex
    /// address synthesis and transfer glue.
    #[must_use]
    pub fn with_external_address(mut self, callback: ExternalAddressFn) -> Self {
        self.external_address = callback;
        self
    }

    /// Inject the indexer readiness predicate.
    #[must_use]
    pub fn with_readiness(mut self, has_synced: ReadinessFn) -> Self {
        self.has_synced = has_synced;
        self
    }

    /// The zones this engine is authoritative for, canonical form.
    #[must_use]
    pub fn zones(&self) -> &[String] {
        &self.zones
    }

    /// Shared handle to the SOA serial cell, for the indexer layer.
    #[must_use]
    pub fn serial_cell(&self) -> Arc<SerialCell> {
        Arc::clone(&self.serial)
    }

    /// Signal that the resource snapshot changed.
    pub fn mark_dirty(&self) {
        self.serial.mark_dirty();
    }

    /// Answer one DNS request.
    ///
    /// Writes the response (always with `AA=1`) through `writer` and
    /// returns the response code, or [`ServeOutcome::Delegated`] when the
    /// query is outside every served zone or fell through.
    ///
    /// # Errors
    ///
    /// [`GatewayError::NotReady`] until the indexer layer has completed its
    /// initial synchronization; the transport should log it and answer
    /// SERVFAIL.
    pub async fn serve_dns(
        self: &Arc<Self>,
        request: &Message,
        writer: &mut dyn ResponseWriter,
    ) -> Result<ServeOutcome, GatewayError> {
        let Some(query) = request.queries().first().cloned() else {
            let response = self.response_skeleton(request, None, ResponseCode::FormErr);
            self.write_response(writer, response).await;
            return Ok(ServeOutcome::Written(ResponseCode::FormErr));
        };

        let owner = query.name().clone();
        let qname = canonical(&owner.to_string());
        let Some(zone) = longest_zone(&self.zones, &qname).map(str::to_string) else {
            return Ok(ServeOutcome::Delegated);
        };

        if !(self.has_synced)() {
            return Err(GatewayError::NotReady {
                plugin: PLUGIN_NAME,
            });
        }

        let qtype = query.query_type();
        if matches!(qtype, RecordType::AXFR | RecordType::IXFR) {
            // Transfers are keyed on the requested name itself: asking for a
            // subdomain of a served zone is a NOTAUTH, not a partial transfer.
            return self
                .serve_transfer_query(request, &query, &qname, writer)
                .await;
        }

        let assembly = if self.in_apex_subtree(&qname, &zone) {
            self.serve_apex(&zone, &qname, &owner, qtype)
        } else {
            match self.serve_regular(&zone, &qname, &owner, qtype) {
                Some(assembly) => assembly,
                None => {
                    debug!(query = %qname, zone = %zone, "no data, falling through");
                    return Ok(ServeOutcome::Delegated);
                }
            }
        };

        let rcode = assembly.rcode;
        metrics::record_query(&qtype.to_string(), rcode_label(rcode));
        let response = self.assemble_response(request, &query, assembly);
        self.write_response(writer, response).await;
        Ok(ServeOutcome::Written(rcode))
    }

    /// Regular (non-apex) resolution. `None` requests fall-through.
    fn serve_regular(
        &self,
        zone: &str,
        qname: &str,
        owner: &Name,
        qtype: RecordType,
    ) -> Option<Assembly> {
        let key_sets = build_key_sets(qname, zone);
        let sets = pipeline_lookup(&self.tables, &key_sets);

        if sets.is_empty() && self.fallthrough.matches(zone) {
            return None;
        }

        Some(match qtype {
            RecordType::A | RecordType::AAAA => {
                self.assemble_address(zone, qname, owner, &sets, qtype)
            }
            RecordType::TXT => {
                if sets.texts.is_empty() {
                    self.negative(zone, &sets)
                } else {
                    Assembly::answer(
                        sets.texts
                            .iter()
                            .map(|text| txt_record(owner, self.ttl, text))
                            .collect(),
                    )
                }
            }
            RecordType::CNAME => match sets.cnames.first() {
                Some(first) => Assembly::answer(vec![cname_record(
                    owner,
                    self.ttl,
                    name_or_root(&canonical(first)),
                )]),
                None => self.negative(zone, &sets),
            },
            RecordType::SOA => Assembly::answer(vec![self.soa(zone)]),
            // NS below the apex, and every type we do not serve: NODATA.
            _ => Assembly::nodata(self.soa(zone)),
        })
    }

    /// Address-type assembly, including the CNAME path and the RFC 4074 §3
    /// rule for AAAA.
    fn assemble_address(
        &self,
        zone: &str,
        qname: &str,
        owner: &Name,
        sets: &RecordSets,
        qtype: RecordType,
    ) -> Assembly {
        if let Some(first) = sets.cnames.first() {
            let target = canonical(first);
            let mut answers = vec![cname_record(owner, self.ttl, name_or_root(&target))];
            let mut visited = HashSet::new();
            match resolve_chain(
                &self.tables,
                zone,
                &target,
                CNAME_CHAIN_DEPTH_LIMIT,
                &mut visited,
            ) {
                Ok(ChainOutcome::Resolved(resolved)) => {
                    let final_owner = name_or_root(&resolved.owner);
                    let (v4, v6) = split_families(&resolved.addresses);
                    match qtype {
                        RecordType::A => answers.extend(a_records(&final_owner, self.ttl, &v4)),
                        _ => answers.extend(aaaa_records(&final_owner, self.ttl, &v6)),
                    }
                }
                Ok(ChainOutcome::External) => {}
                Err(err) => {
                    warn!(query = %qname, error = %err, "CNAME chain resolution failed");
                    metrics::record_chain_failure(err.reason());
                }
            }
            return Assembly::answer(answers);
        }

        let (v4, v6) = split_families(&sets.addresses);
        match qtype {
            RecordType::A if !v4.is_empty() => Assembly::answer(a_records(owner, self.ttl, &v4)),
            RecordType::AAAA if !v6.is_empty() => {
                Assembly::answer(aaaa_records(owner, self.ttl, &v6))
            }
            // AAAA with IPv4-only data signals "no data", never "does not
            // exist" (RFC 4074 §3); the generic negative covers it because
            // the triple is non-empty.
            _ => self.negative(zone, sets),
        }
    }

    /// NODATA or NXDOMAIN, depending on whether the name exists at all.
    fn negative(&self, zone: &str, sets: &RecordSets) -> Assembly {
        if sets.is_empty() {
            Assembly::nxdomain(self.soa(zone))
        } else {
            Assembly::nodata(self.soa(zone))
        }
    }

    /// AXFR/IXFR flow: stream the transfer as a message sequence.
    async fn serve_transfer_query(
        self: &Arc<Self>,
        request: &Message,
        query: &Query,
        zone: &str,
        writer: &mut dyn ResponseWriter,
    ) -> Result<ServeOutcome, GatewayError> {
        if !writer.multi_message() {
            let response = self.response_skeleton(request, Some(query), ResponseCode::Refused);
            self.write_response(writer, response).await;
            return Ok(ServeOutcome::Written(ResponseCode::Refused));
        }

        // An IXFR request carries the caller's SOA in the authority section.
        let client_serial = if query.query_type() == RecordType::IXFR {
            request
                .name_servers()
                .iter()
                .find_map(|record| match record.data() {
                    Some(RData::SOA(soa)) => Some(soa.serial()),
                    _ => None,
                })
                .unwrap_or(0)
        } else {
            0
        };

        let mut stream = match self.transfer(zone, client_serial) {
            Ok(stream) => stream,
            Err(TransferError::NotAuthoritative { zone }) => {
                warn!(zone = %zone, "transfer requested for unserved zone");
                let response = self.response_skeleton(request, Some(query), ResponseCode::NotAuth);
                self.write_response(writer, response).await;
                return Ok(ServeOutcome::Written(ResponseCode::NotAuth));
            }
        };

        metrics::record_transfer(&query.query_type().to_string());

        let mut pending: Vec<Record> = Vec::new();
        while let Some(group) = stream.recv().await {
            pending.extend(group);
            if pending.len() >= TRANSFER_MESSAGE_MAX_RECORDS {
                let mut response =
                    self.response_skeleton(request, Some(query), ResponseCode::NoError);
                for record in pending.drain(..) {
                    response.add_answer(record);
                }
                self.write_response(writer, response).await;
            }
        }
        if !pending.is_empty() {
            let mut response = self.response_skeleton(request, Some(query), ResponseCode::NoError);
            for record in pending.drain(..) {
                response.add_answer(record);
            }
            self.write_response(writer, response).await;
        }
        Ok(ServeOutcome::Written(ResponseCode::NoError))
    }

    fn response_skeleton(
        &self,
        request: &Message,
        query: Option<&Query>,
        rcode: ResponseCode,
    ) -> Message {
        let mut response = Message::new();
        response.set_id(request.id());
        response.set_message_type(MessageType::Response);
        response.set_op_code(request.op_code());
        response.set_recursion_desired(request.recursion_desired());
        response.set_recursion_available(false);
        response.set_authoritative(true);
        response.set_response_code(rcode);
        if let Some(query) = query {
            response.add_query(query.clone());
        }
        response
    }

    fn assemble_response(&self, request: &Message, query: &Query, assembly: Assembly) -> Message {
        let mut response = self.response_skeleton(request, Some(query), assembly.rcode);
        for record in dedup_records(assembly.answers) {
            response.add_answer(record);
        }
        for record in dedup_records(assembly.authorities) {
            response.add_name_server(record);
        }
        for record in dedup_records(assembly.extras) {
            response.add_additional(record);
        }
        response
    }

    async fn write_response(&self, writer: &mut dyn ResponseWriter, response: Message) {
        if let Err(err) = writer.write(response).await {
            warn!(error = %err, "failed to write DNS response");
        }
    }
}

fn rcode_label(rcode: ResponseCode) -> &'static str {
    match rcode {
        ResponseCode::NoError => "NOERROR",
        ResponseCode::NXDomain => "NXDOMAIN",
        ResponseCode::ServFail => "SERVFAIL",
        ResponseCode::Refused => "REFUSED",
        ResponseCode::NotAuth => "NOTAUTH",
        ResponseCode::FormErr => "FORMERR",
        _ => "OTHER",
    }
}
