// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # dnsgate - Authoritative DNS for Kubernetes gateway resources
//!
//! dnsgate answers DNS queries for configured zones by projecting live
//! cluster state into records: every externally reachable Ingress,
//! LoadBalancer Service, Gateway-API route, and DNSEndpoint becomes one or
//! more hostnames served as A, AAAA, TXT, CNAME, SOA, and NS records,
//! including wildcards, CNAME chains, zone apex metadata, and full zone
//! transfer (AXFR/IXFR).
//!
//! ## Overview
//!
//! The crate splits into an engine and an indexer layer:
//!
//! - [`gateway`] - The resolution engine: query dispatch, index lookup with
//!   wildcard fallback, CNAME chain resolution, apex handling, SOA serial
//!   accounting, and the streaming zone-transfer producer
//! - [`resources`] - The contracts between engine and indexer, the
//!   reflector-backed lookup tables, and the watched CRD types
//! - [`server`] - UDP and TCP wire transport
//! - [`config`] - The YAML configuration surface
//!
//! ## Example
//!
//! ```rust,no_run
//! use dnsgate::gateway::Gateway;
//! use dnsgate::resources::{RecordSets, ResourceKind, StaticTable};
//! use std::sync::Arc;
//!
//! let table = StaticTable::new(ResourceKind::Service)
//!     .with_entry("web.default", RecordSets::default().with_address("192.0.2.1".parse().unwrap()));
//!
//! let gateway = Arc::new(Gateway::new(
//!     vec!["example.com.".to_string()],
//!     vec![Arc::new(table)],
//! ));
//! ```
//!
//! ## Features
//!
//! - **Snapshot-pure answers** - The record set is a function of the current
//!   cluster snapshot; nothing is persisted
//! - **Resource priority** - Configured table order decides which resource
//!   answers a contested hostname
//! - **Wildcard fallback** - `*.` records answer any single missing label
//!   without masking exact matches
//! - **Streaming AXFR** - Transfers are produced incrementally and bracketed
//!   by identical SOA records

pub mod config;
pub mod constants;
pub mod errors;
pub mod gateway;
pub mod labels;
pub mod metrics;
pub mod resources;
pub mod server;
