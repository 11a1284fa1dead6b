// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Bounded CNAME chain resolution.
//!
//! The resolver follows CNAME links through the lookup pipeline until it
//! reaches addresses, leaves the zone, or fails. Failure modes are a
//! revisited canonical name, an exhausted depth counter, and an in-zone
//! target with no records at all. Names stay in the visited set for the
//! whole enclosing resolution, so no branch of a single chain can revisit a
//! name by any path; independent resolutions share no state.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;

use crate::errors::ChainError;
use crate::gateway::lookup::{build_key_sets, canonical, is_in_zone, pipeline_lookup};
use crate::resources::ResourceTable;

/// Addresses reached at the end of a chain, with the canonical name that
/// owns them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ResolvedAddresses {
    /// Canonical owner of the resolved addresses
    pub owner: String,
    /// Addresses found at the end of the chain
    pub addresses: Vec<IpAddr>,
}

/// Successful outcomes of a chain resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ChainOutcome {
    /// The chain ended on in-zone addresses.
    Resolved(ResolvedAddresses),
    /// The target leads outside the zone; resolution is the next handler's job.
    External,
}

/// Follow `target` through the pipeline until addresses, an external exit,
/// or a failure.
///
/// `visited` carries the canonical names already followed in this chain.
pub(crate) fn resolve_chain(
    tables: &[Arc<dyn ResourceTable>],
    zone: &str,
    target: &str,
    remaining_depth: u8,
    visited: &mut HashSet<String>,
) -> Result<ChainOutcome, ChainError> {
    let target = canonical(target);

    if remaining_depth == 0 {
        return Err(ChainError::DepthExhausted {
            target,
            limit: crate::constants::CNAME_CHAIN_DEPTH_LIMIT,
        });
    }
    if visited.contains(&target) {
        return Err(ChainError::LoopDetected { target });
    }
    visited.insert(target.clone());

    let sets = pipeline_lookup(tables, &build_key_sets(&target, zone));

    if !sets.addresses.is_empty() {
        return Ok(ChainOutcome::Resolved(ResolvedAddresses {
            owner: target,
            addresses: sets.addresses,
        }));
    }
    if let Some(next) = sets.cnames.first() {
        return resolve_chain(tables, zone, next, remaining_depth - 1, visited);
    }
    if !is_in_zone(&target, zone) {
        return Ok(ChainOutcome::External);
    }
    Err(ChainError::DeadEnd {
        target,
        zone: zone.to_string(),
    })
}

#[cfg(test)]
#[path = "cname_tests.rs"]
mod cname_tests;
