// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the resolution engine.
//!
//! The dispatcher never leaks errors to callers except as the DNS response
//! code; the one exception is [`GatewayError::NotReady`], which is returned
//! so the transport can log it and answer SERVFAIL. Chain and transfer
//! failures are internal outcomes that shape the response but are reported
//! here as structured errors for logging and metrics.

use thiserror::Error;

/// Errors surfaced from the query dispatcher.
///
/// Per the propagation policy, this is deliberately narrow: everything else
/// the engine can encounter is folded into the response code.
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    /// The indexer layer has not completed its initial synchronization.
    ///
    /// Queries cannot be answered authoritatively from a partial snapshot,
    /// so the transport must answer SERVFAIL until the watchers catch up.
    #[error("{plugin}: cluster indexes have not completed initial synchronization")]
    NotReady {
        /// Plugin identifier for log correlation
        plugin: &'static str,
    },
}

/// Errors that can occur when a zone transfer is requested.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// The requested zone is not among the configured zones.
    ///
    /// The caller must answer NOTAUTH; no stream is produced.
    #[error("zone '{zone}' is not served by this resolver")]
    NotAuthoritative {
        /// The zone name that was requested
        zone: String,
    },
}

/// Failures of a single CNAME chain resolution.
///
/// A chain failure never fails the query: the first CNAME is still answered,
/// the resolved addresses are simply omitted and the event is logged at
/// warning level.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// The chain revisited a canonical name it had already followed.
    #[error("CNAME loop detected at '{target}'")]
    LoopDetected {
        /// The canonical name that was seen twice
        target: String,
    },

    /// The chain exceeded the configured depth limit.
    #[error("CNAME chain for '{target}' exhausted the depth limit of {limit}")]
    DepthExhausted {
        /// The target that would have been followed next
        target: String,
        /// The depth limit that was hit
        limit: u8,
    },

    /// The target lies inside the zone but resolves to nothing at all.
    #[error("CNAME chain dead end at '{target}' within zone '{zone}'")]
    DeadEnd {
        /// The canonical name that yielded no records
        target: String,
        /// The zone the target belongs to
        zone: String,
    },
}

impl ChainError {
    /// Short reason code used as a metrics label value.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::LoopDetected { .. } => "loop",
            Self::DepthExhausted { .. } => "depth",
            Self::DeadEnd { .. } => "dead_end",
        }
    }
}

/// Errors raised while loading or validating the configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration file '{path}': {source}")]
    Io {
        /// Path of the file that could not be read
        path: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The configuration file could not be parsed as YAML.
    #[error("failed to parse configuration file '{path}': {source}")]
    Parse {
        /// Path of the file that failed to parse
        path: String,
        /// Underlying YAML error
        source: serde_yaml::Error,
    },

    /// A field value failed validation.
    #[error("invalid configuration: {field}: {reason}")]
    Invalid {
        /// The field that is invalid
        field: &'static str,
        /// Explanation of what is invalid
        reason: String,
    },
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
