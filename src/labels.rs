// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Well-known label and annotation names consumed by the indexer layer.
//!
//! This module defines the Kubernetes labels and annotations dnsgate inspects
//! when projecting cluster objects into DNS records, so the names are written
//! down exactly once.

// ============================================================================
// dnsgate Labels
// ============================================================================

/// Label that excludes an object from all lookups and zone transfers
pub const IGNORE_LABEL: &str = "k8s-gateway.dns/ignore";

/// Value of [`IGNORE_LABEL`] that activates the exclusion
pub const IGNORE_LABEL_VALUE: &str = "true";

// ============================================================================
// Interoperability Annotations
// ============================================================================

/// external-dns annotation carrying comma-separated hostnames for a Service
pub const HOSTNAME_ANNOTATION: &str = "external-dns.alpha.kubernetes.io/hostname";

/// Legacy ingress-class annotation, consulted when `spec.ingressClassName` is unset
pub const INGRESS_CLASS_ANNOTATION: &str = "kubernetes.io/ingress.class";
