// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Index key construction and the ordered lookup pipeline.
//!
//! For a query name inside a zone, two keys are derived: the full name minus
//! the trailing dot, and the zone-stripped suffix. Both are probed against
//! every resource table in configured order; only if the specific key set
//! yields nothing anywhere is a single wildcard key set tried, with the
//! first label replaced by `*`. Probing all tables with the specific keys
//! first means a wildcard in a high-priority table can never mask an exact
//! match in a lower-priority one.

use crate::resources::{RecordSets, ResourceTable};
use std::sync::Arc;

/// Lowercase a name and ensure it carries a trailing dot.
pub(crate) fn canonical(name: &str) -> String {
    let mut out = name.to_ascii_lowercase();
    if !out.ends_with('.') {
        out.push('.');
    }
    out
}

/// True when `name` equals `zone` or lies beneath it on a label boundary.
///
/// Both arguments must be canonical. A bare suffix match is not enough:
/// `notexample.com.` is not inside `example.com.`.
pub(crate) fn is_in_zone(name: &str, zone: &str) -> bool {
    name == zone || name.ends_with(&format!(".{zone}"))
}

/// Longest configured zone that contains `qname`, if any.
///
/// Zones in the slice are canonical; `qname` must be canonical too.
pub(crate) fn longest_zone<'a>(zones: &'a [String], qname: &str) -> Option<&'a str> {
    zones
        .iter()
        .filter(|zone| is_in_zone(qname, zone))
        .max_by_key(|zone| zone.len())
        .map(String::as_str)
}

/// Build the ordered key-set list for a canonical query name.
///
/// The first set holds the specific keys (full form, then zone-stripped
/// form); the optional second set is the wildcard fallback. Names outside
/// the zone produce only their full-form key, which lets the CNAME resolver
/// probe external targets before declaring them external.
pub(crate) fn build_key_sets(qname: &str, zone: &str) -> Vec<Vec<String>> {
    let full = qname.trim_end_matches('.').to_string();
    let mut specific = Vec::with_capacity(2);
    if !full.is_empty() {
        specific.push(full.clone());
    }

    let stripped = if is_in_zone(qname, zone) {
        qname[..qname.len() - zone.len()]
            .trim_end_matches('.')
            .to_string()
    } else {
        String::new()
    };
    if !stripped.is_empty() {
        specific.push(stripped.clone());
    }

    let mut sets = vec![specific];

    // At most one extra probe: first label replaced by `*`.
    if !stripped.is_empty() {
        let mut wildcard = Vec::with_capacity(2);
        if let Some((_, rest)) = full.split_once('.') {
            wildcard.push(format!("*.{rest}"));
        }
        match stripped.split_once('.') {
            Some((_, rest)) => wildcard.push(format!("*.{rest}")),
            None => wildcard.push("*".to_string()),
        }
        sets.push(wildcard);
    }

    sets
}

/// Probe every table with every key set, in order.
///
/// Returns the first non-empty triple; the output is a function of the
/// snapshot and the keys alone.
pub(crate) fn pipeline_lookup(
    tables: &[Arc<dyn ResourceTable>],
    key_sets: &[Vec<String>],
) -> RecordSets {
    for keys in key_sets {
        for table in tables {
            let sets = table.lookup(keys);
            if !sets.is_empty() {
                return sets;
            }
        }
    }
    RecordSets::default()
}

#[cfg(test)]
#[path = "lookup_tests.rs"]
mod lookup_tests;
