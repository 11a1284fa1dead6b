// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Construction of wire records from looked-up data.
//!
//! Owner names are passed in by the caller so the original query casing is
//! preserved in answers while all matching happened on lowercase keys.

use hickory_proto::rr::rdata::{self, SOA, TXT};
use hickory_proto::rr::{DNSClass, Name, RData, Record};
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::constants::TXT_SEGMENT_MAX_BYTES;

/// Split a mixed address list into IPv4 and IPv6 groups, preserving order.
pub(crate) fn split_families(addresses: &[IpAddr]) -> (Vec<Ipv4Addr>, Vec<Ipv6Addr>) {
    let mut v4 = Vec::new();
    let mut v6 = Vec::new();
    for addr in addresses {
        match addr {
            IpAddr::V4(ip) => v4.push(*ip),
            IpAddr::V6(ip) => v6.push(*ip),
        }
    }
    (v4, v6)
}

/// Build one A record per IPv4 address.
pub(crate) fn a_records(owner: &Name, ttl: u32, addresses: &[Ipv4Addr]) -> Vec<Record> {
    addresses
        .iter()
        .map(|ip| {
            let mut record = Record::from_rdata(owner.clone(), ttl, RData::A((*ip).into()));
            record.set_dns_class(DNSClass::IN);
            record
        })
        .collect()
}

/// Build one AAAA record per IPv6 address.
pub(crate) fn aaaa_records(owner: &Name, ttl: u32, addresses: &[Ipv6Addr]) -> Vec<Record> {
    addresses
        .iter()
        .map(|ip| {
            let mut record = Record::from_rdata(owner.clone(), ttl, RData::AAAA((*ip).into()));
            record.set_dns_class(DNSClass::IN);
            record
        })
        .collect()
}

/// Build a CNAME record pointing at `target`.
pub(crate) fn cname_record(owner: &Name, ttl: u32, target: Name) -> Record {
    let mut record = Record::from_rdata(owner.clone(), ttl, RData::CNAME(rdata::CNAME(target)));
    record.set_dns_class(DNSClass::IN);
    record
}

/// Build an NS record delegating to `target`.
pub(crate) fn ns_record(owner: &Name, ttl: u32, target: Name) -> Record {
    let mut record = Record::from_rdata(owner.clone(), ttl, RData::NS(rdata::NS(target)));
    record.set_dns_class(DNSClass::IN);
    record
}

/// Build a TXT record, splitting the payload into wire-legal segments.
pub(crate) fn txt_record(owner: &Name, ttl: u32, text: &str) -> Record {
    let mut record = Record::from_rdata(owner.clone(), ttl, RData::TXT(TXT::new(split_txt(text))));
    record.set_dns_class(DNSClass::IN);
    record
}

/// Build the zone SOA record.
#[allow(clippy::too_many_arguments)]
pub(crate) fn soa_record(
    zone: Name,
    mname: Name,
    rname: Name,
    ttl: u32,
    serial: u32,
    refresh: u32,
    retry: u32,
    expire: u32,
    minimum: u32,
) -> Record {
    let soa = SOA::new(
        mname,
        rname,
        serial,
        i32::try_from(refresh).unwrap_or(i32::MAX),
        i32::try_from(retry).unwrap_or(i32::MAX),
        i32::try_from(expire).unwrap_or(i32::MAX),
        minimum,
    );
    let mut record = Record::from_rdata(zone, ttl, RData::SOA(soa));
    record.set_dns_class(DNSClass::IN);
    record
}

/// Split a TXT payload into segments no longer than 255 bytes.
///
/// Segments break on character boundaries so that concatenating them
/// reproduces the original string exactly.
pub(crate) fn split_txt(text: &str) -> Vec<String> {
    if text.len() <= TXT_SEGMENT_MAX_BYTES {
        return vec![text.to_string()];
    }
    let mut segments = Vec::new();
    let mut current = String::with_capacity(TXT_SEGMENT_MAX_BYTES);
    for ch in text.chars() {
        if current.len() + ch.len_utf8() > TXT_SEGMENT_MAX_BYTES {
            segments.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

/// Suppress duplicate records by string form, first seen wins.
pub(crate) fn dedup_records(records: Vec<Record>) -> Vec<Record> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(records.len());
    for record in records {
        let key = format!(
            "{} {} {:?}",
            record.name().to_string().to_ascii_lowercase(),
            record.record_type(),
            record.data(),
        );
        if seen.insert(key) {
            out.push(record);
        }
    }
    out
}

#[cfg(test)]
#[path = "records_tests.rs"]
mod records_tests;
