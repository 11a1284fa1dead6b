// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the dnsgate resolver.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Plugin Identity
// ============================================================================

/// Name used to prefix errors and metrics originating from this resolver
pub const PLUGIN_NAME: &str = "dnsgate";

// ============================================================================
// DNS Protocol Constants
// ============================================================================

/// Standard DNS port for queries and zone transfers
pub const DNS_PORT: u16 = 53;

/// Default TTL for answer records (A, AAAA, TXT, CNAME)
pub const DEFAULT_TTL_SECS: u32 = 60;

/// Upper bound accepted for the configured answer TTL
pub const MAX_TTL_SECS: u32 = 3600;

/// TTL used for SOA and NS records and their glue
pub const SOA_TTL_SECS: u32 = 300;

/// Default SOA refresh interval (1 hour)
pub const DEFAULT_SOA_REFRESH_SECS: u32 = 3600;

/// Default SOA retry interval (10 minutes)
pub const DEFAULT_SOA_RETRY_SECS: u32 = 600;

/// Default SOA expire time (7 days)
pub const DEFAULT_SOA_EXPIRE_SECS: u32 = 604_800;

/// Maximum length of a single TXT character-string on the wire
pub const TXT_SEGMENT_MAX_BYTES: usize = 255;

/// Maximum number of CNAME links followed for a single answer
pub const CNAME_CHAIN_DEPTH_LIMIT: u8 = 10;

// ============================================================================
// Apex Defaults
// ============================================================================

/// Default apex label: the nameserver Service name and namespace, outermost label first
pub const DEFAULT_APEX_LABEL: &str = "dns1.kube-system";

/// Default local-part of the SOA RNAME
pub const DEFAULT_HOSTMASTER: &str = "hostmaster";

// ============================================================================
// Zone Transfer Constants
// ============================================================================

/// Bound on in-flight record groups between a transfer producer and its consumer
pub const TRANSFER_CHANNEL_CAPACITY: usize = 16;

/// Upper bound of records packed into a single transfer response message
pub const TRANSFER_MESSAGE_MAX_RECORDS: usize = 64;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for the Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

/// Default listen address for the DNS servers
pub const DNS_BIND_ADDRESS: &str = "0.0.0.0";

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Port for the Prometheus metrics HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path for the Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Bind address for the metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";
