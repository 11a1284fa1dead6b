// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the dnsgate resolver.
//!
//! Counters live under the `dnsgate_` namespace and surface on the
//! `/metrics` endpoint of the observability server: answered queries by
//! type and response code, served zone transfers by kind, and failed CNAME
//! chain resolutions by reason.

use prometheus::{CounterVec, Encoder, Opts, Registry, TextEncoder};
use std::sync::LazyLock;

/// Namespace prefix for all dnsgate metrics
const METRICS_NAMESPACE: &str = "dnsgate";

/// Global registry backing the `/metrics` endpoint
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

fn counter(name: &str, help: &str, labels: &[&str]) -> CounterVec {
    let counter = CounterVec::new(
        Opts::new(format!("{METRICS_NAMESPACE}_{name}"), help),
        labels,
    )
    .unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
}

/// Answered queries, labeled by `qtype` and `rcode`
pub static QUERIES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter(
        "queries_total",
        "Total number of answered queries by query type and response code",
        &["qtype", "rcode"],
    )
});

/// Served zone transfers, labeled by `kind` (`AXFR` or `IXFR`)
pub static TRANSFERS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter(
        "transfers_total",
        "Total number of zone transfers served by kind",
        &["kind"],
    )
});

/// Failed CNAME chain resolutions, labeled by `reason`
pub static CHAIN_FAILURES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter(
        "cname_chain_failures_total",
        "Total number of failed CNAME chain resolutions by reason",
        &["reason"],
    )
});

/// Record an answered query.
pub fn record_query(qtype: &str, rcode: &str) {
    QUERIES_TOTAL.with_label_values(&[qtype, rcode]).inc();
}

/// Record a served zone transfer.
pub fn record_transfer(kind: &str) {
    TRANSFERS_TOTAL.with_label_values(&[kind]).inc();
}

/// Record a failed CNAME chain resolution.
pub fn record_chain_failure(reason: &str) {
    CHAIN_FAILURES_TOTAL.with_label_values(&[reason]).inc();
}

/// Gather all metrics in Prometheus text exposition format.
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&METRICS_REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
