// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom resource types consumed by the indexer layer.
//!
//! These are partial, consumer-side definitions: only the fields dnsgate
//! reads are declared, and unknown fields are ignored on deserialization.
//! The Gateway-API types mirror `gateway.networking.k8s.io`; DNSEndpoint
//! mirrors the external-dns contract under `externaldns.k8s.io`.
//!
//! # Example: a DNSEndpoint served by dnsgate
//!
//! ```yaml
//! apiVersion: externaldns.k8s.io/v1alpha1
//! kind: DNSEndpoint
//! metadata:
//!   name: static-hosts
//!   namespace: dns-system
//! spec:
//!   endpoints:
//!     - dnsName: static.example.com
//!       recordType: A
//!       targets: ["192.0.2.10"]
//! ```

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One desired DNS record set within a [`DNSEndpoint`].
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Owner name of the record set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_name: Option<String>,

    /// Record payloads: addresses for A/AAAA, strings for TXT, names for CNAME
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<String>>,

    /// Record type (`A`, `AAAA`, `TXT`, `CNAME`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_type: Option<String>,

    /// Desired TTL; dnsgate serves its configured TTL regardless
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_ttl: Option<i64>,
}

/// `DNSEndpoint` carries explicitly declared DNS records.
///
/// external-dns introduced this contract so that arbitrary controllers can
/// publish records without owning a DNS provider; dnsgate serves them
/// directly.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "externaldns.k8s.io",
    version = "v1alpha1",
    kind = "DNSEndpoint",
    namespaced,
    doc = "DNSEndpoint holds DNS record sets to serve verbatim: each endpoint names an owner, a record type, and its targets."
)]
#[serde(rename_all = "camelCase")]
pub struct DNSEndpointSpec {
    /// The record sets this object contributes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<Vec<Endpoint>>,
}

/// Reference from a route to the Gateway that carries its traffic.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParentReference {
    /// API group of the parent; `gateway.networking.k8s.io` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    /// Kind of the parent; `Gateway` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Namespace of the parent; the route's own namespace when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Name of the parent
    pub name: String,
}

/// An address at which a Gateway accepts traffic.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GatewayAddress {
    /// Address type (`IPAddress`, `Hostname`)
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    /// The address value
    pub value: String,
}

/// Observed state of a Gateway; dnsgate only reads the addresses.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStatus {
    /// Addresses the Gateway is reachable at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<GatewayAddress>>,
}

/// `Gateway` represents a deployed data-plane listener set.
///
/// Routes attach to Gateways via `parentRefs`; dnsgate resolves a route's
/// hostnames to the addresses of its parent Gateways.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "gateway.networking.k8s.io",
    version = "v1",
    kind = "Gateway",
    namespaced,
    doc = "Gateway-API Gateway, read for its class and reachable addresses."
)]
#[kube(status = "GatewayStatus")]
#[serde(rename_all = "camelCase")]
pub struct GatewaySpec {
    /// The GatewayClass this Gateway belongs to
    pub gateway_class_name: String,
}

/// `HTTPRoute` attaches HTTP hostnames to one or more Gateways.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "gateway.networking.k8s.io",
    version = "v1",
    kind = "HTTPRoute",
    namespaced,
    doc = "Gateway-API HTTPRoute, read for its hostnames and parent Gateways."
)]
#[serde(rename_all = "camelCase")]
pub struct HTTPRouteSpec {
    /// Hostnames this route serves; may include a leading wildcard label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostnames: Option<Vec<String>>,

    /// Gateways this route attaches to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_refs: Option<Vec<ParentReference>>,
}

/// `TLSRoute` attaches SNI hostnames to one or more Gateways.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "gateway.networking.k8s.io",
    version = "v1alpha2",
    kind = "TLSRoute",
    namespaced,
    doc = "Gateway-API TLSRoute, read for its hostnames and parent Gateways."
)]
#[serde(rename_all = "camelCase")]
pub struct TLSRouteSpec {
    /// SNI hostnames this route serves
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostnames: Option<Vec<String>>,

    /// Gateways this route attaches to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_refs: Option<Vec<ParentReference>>,
}

/// `GRPCRoute` attaches gRPC hostnames to one or more Gateways.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "gateway.networking.k8s.io",
    version = "v1",
    kind = "GRPCRoute",
    namespaced,
    doc = "Gateway-API GRPCRoute, read for its hostnames and parent Gateways."
)]
#[serde(rename_all = "camelCase")]
pub struct GRPCRouteSpec {
    /// Hostnames this route serves
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostnames: Option<Vec<String>>,

    /// Gateways this route attaches to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_refs: Option<Vec<ParentReference>>,
}
