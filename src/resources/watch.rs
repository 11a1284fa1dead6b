// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reflector wiring: cluster watches feeding the lookup tables.
//!
//! One reflector task runs per watched kind. Every applied event rebuilds
//! the affected table from the store snapshot and marks the SOA serial
//! dirty. Route tables are also rebuilt on Gateway events, since a route's
//! addresses live on its parent Gateway. Readiness flips once every
//! configured store has completed its initial list; the engine answers
//! SERVFAIL until then.

use futures::future::join_all;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::reflector::store::Writer;
use kube::runtime::reflector::Store;
use kube::runtime::{reflector, watcher};
use kube::{Api, Client};
use crate::resources::ResourceTable;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::gateway::SerialCell;
use crate::resources::crd::{DNSEndpoint, GRPCRoute, Gateway, HTTPRoute, TLSRoute};
use crate::resources::index::{
    grpc_route_hosts, http_route_hosts, index_endpoints, index_ingresses, index_routes,
    index_services, tls_route_hosts, KubeTable,
};
use crate::resources::ResourceKind;

/// Handle to the running watch layer.
pub struct IndexerHandle {
    ready: Arc<AtomicBool>,
}

impl IndexerHandle {
    /// True once every configured store completed its initial list.
    #[must_use]
    pub fn has_synced(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    /// The readiness predicate to inject into the engine.
    #[must_use]
    pub fn readiness_fn(&self) -> crate::resources::ReadinessFn {
        let ready = Arc::clone(&self.ready);
        Arc::new(move || ready.load(Ordering::Relaxed))
    }
}

/// Spawn reflectors for every configured kind and keep `tables` current.
///
/// `tables` must hold one [`KubeTable`] per configured kind; a configured
/// kind without a table is skipped with a warning rather than watched into
/// nowhere.
pub fn spawn(
    client: &Client,
    config: &Config,
    tables: &[Arc<KubeTable>],
    serial: &Arc<SerialCell>,
) -> IndexerHandle {
    let ready = Arc::new(AtomicBool::new(false));
    let mut pending: Vec<Pin<Box<dyn Future<Output = ()> + Send>>> = Vec::new();

    let table_for = |kind: ResourceKind| tables.iter().find(|t| t.kind() == kind).cloned();
    let wants_routes = config.resources.iter().any(|kind| {
        matches!(
            kind,
            ResourceKind::HTTPRoute | ResourceKind::TLSRoute | ResourceKind::GRPCRoute
        )
    });

    // Route rebuilds read the Gateway snapshot and vice versa, so all four
    // stores exist up front; each writer is consumed by at most one watcher.
    let (gateway_store, gateway_writer) = reflector::store::<Gateway>();
    let (http_store, http_writer) = reflector::store::<HTTPRoute>();
    let (tls_store, tls_writer) = reflector::store::<TLSRoute>();
    let (grpc_store, grpc_writer) = reflector::store::<GRPCRoute>();
    let mut http_writer = Some(http_writer);
    let mut tls_writer = Some(tls_writer);
    let mut grpc_writer = Some(grpc_writer);

    // One closure refreshes every configured route table; route and
    // Gateway watchers all share it.
    let rebuild_routes: Arc<dyn Fn() + Send + Sync> = {
        let http_table = table_for(ResourceKind::HTTPRoute);
        let tls_table = table_for(ResourceKind::TLSRoute);
        let grpc_table = table_for(ResourceKind::GRPCRoute);
        let http_store = http_store.clone();
        let tls_store = tls_store.clone();
        let grpc_store = grpc_store.clone();
        let gateway_store = gateway_store.clone();
        let classes = config.gateway_classes.clone();
        let serial = Arc::clone(serial);
        Arc::new(move || {
            let gateways = gateway_store.state();
            if let Some(table) = &http_table {
                table.replace(index_routes(
                    &http_route_hosts(&http_store.state()),
                    &gateways,
                    classes.as_deref(),
                ));
            }
            if let Some(table) = &tls_table {
                table.replace(index_routes(
                    &tls_route_hosts(&tls_store.state()),
                    &gateways,
                    classes.as_deref(),
                ));
            }
            if let Some(table) = &grpc_table {
                table.replace(index_routes(
                    &grpc_route_hosts(&grpc_store.state()),
                    &gateways,
                    classes.as_deref(),
                ));
            }
            serial.mark_dirty();
        })
    };

    for kind in &config.resources {
        let Some(table) = table_for(*kind) else {
            warn!(kind = %kind, "no table registered for configured resource kind");
            continue;
        };
        let serial = Arc::clone(serial);
        match kind {
            ResourceKind::Service => {
                let (store, writer) = reflector::store::<Service>();
                pending.push(wait_ready(&store, "Service"));
                let reader = store.clone();
                spawn_watch(Api::<Service>::all(client.clone()), writer, "Service", move || {
                    table.replace(index_services(&reader.state()));
                    serial.mark_dirty();
                });
            }
            ResourceKind::Ingress => {
                let (store, writer) = reflector::store::<Ingress>();
                pending.push(wait_ready(&store, "Ingress"));
                let reader = store.clone();
                let classes = config.ingress_classes.clone();
                spawn_watch(Api::<Ingress>::all(client.clone()), writer, "Ingress", move || {
                    table.replace(index_ingresses(&reader.state(), classes.as_deref()));
                    serial.mark_dirty();
                });
            }
            ResourceKind::DNSEndpoint => {
                let (store, writer) = reflector::store::<DNSEndpoint>();
                pending.push(wait_ready(&store, "DNSEndpoint"));
                let reader = store.clone();
                spawn_watch(
                    Api::<DNSEndpoint>::all(client.clone()),
                    writer,
                    "DNSEndpoint",
                    move || {
                        table.replace(index_endpoints(&reader.state()));
                        serial.mark_dirty();
                    },
                );
            }
            ResourceKind::HTTPRoute => {
                if let Some(writer) = http_writer.take() {
                    pending.push(wait_ready(&http_store, "HTTPRoute"));
                    let rebuild = Arc::clone(&rebuild_routes);
                    spawn_watch(
                        Api::<HTTPRoute>::all(client.clone()),
                        writer,
                        "HTTPRoute",
                        move || rebuild(),
                    );
                }
            }
            ResourceKind::TLSRoute => {
                if let Some(writer) = tls_writer.take() {
                    pending.push(wait_ready(&tls_store, "TLSRoute"));
                    let rebuild = Arc::clone(&rebuild_routes);
                    spawn_watch(
                        Api::<TLSRoute>::all(client.clone()),
                        writer,
                        "TLSRoute",
                        move || rebuild(),
                    );
                }
            }
            ResourceKind::GRPCRoute => {
                if let Some(writer) = grpc_writer.take() {
                    pending.push(wait_ready(&grpc_store, "GRPCRoute"));
                    let rebuild = Arc::clone(&rebuild_routes);
                    spawn_watch(
                        Api::<GRPCRoute>::all(client.clone()),
                        writer,
                        "GRPCRoute",
                        move || rebuild(),
                    );
                }
            }
        }
    }

    if wants_routes {
        pending.push(wait_ready(&gateway_store, "Gateway"));
        let rebuild = Arc::clone(&rebuild_routes);
        spawn_watch(
            Api::<Gateway>::all(client.clone()),
            gateway_writer,
            "Gateway",
            move || rebuild(),
        );
    }

    let handle = IndexerHandle {
        ready: Arc::clone(&ready),
    };

    tokio::spawn(async move {
        join_all(pending).await;
        ready.store(true, Ordering::Relaxed);
        info!("all resource stores synced, serving authoritatively");
    });

    handle
}

/// Run one watcher-backed reflector, invoking `on_change` per event batch.
fn spawn_watch<K, F>(api: Api<K>, writer: Writer<K>, kind: &'static str, on_change: F)
where
    K: kube::Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    F: Fn() + Send + 'static,
{
    tokio::spawn(async move {
        let stream = reflector(writer, watcher(api, watcher::Config::default()));
        futures::pin_mut!(stream);
        while let Some(event) = stream.next().await {
            match event {
                Ok(_) => on_change(),
                Err(err) => warn!(kind, error = %err, "watch stream error"),
            }
        }
        warn!(kind, "reflector stream ended");
    });
}

fn wait_ready<K>(store: &Store<K>, kind: &'static str) -> Pin<Box<dyn Future<Output = ()> + Send>>
where
    K: kube::Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    let store = store.clone();
    Box::pin(async move {
        if store.wait_until_ready().await.is_err() {
            warn!(kind, "store writer dropped before initial sync");
        }
    })
}
