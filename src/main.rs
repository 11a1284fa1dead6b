// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use axum::http::StatusCode;
use axum::{routing::get, Router};
use clap::Parser;
use dnsgate::config::Config;
use dnsgate::constants::{
    DNS_BIND_ADDRESS, DNS_PORT, METRICS_SERVER_BIND_ADDRESS, METRICS_SERVER_PATH,
    METRICS_SERVER_PORT, TOKIO_WORKER_THREADS,
};
use dnsgate::gateway::Gateway;
use dnsgate::metrics;
use dnsgate::resources::index::{external_address_fn, KubeTable};
use dnsgate::resources::watch;
use dnsgate::resources::{ResourceKind, ResourceTable};
use dnsgate::server;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::{TcpListener, UdpSocket};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(
    name = "dnsgate",
    version,
    about = "Authoritative DNS for Kubernetes gateway resources"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "/etc/dnsgate/config.yaml")]
    config: PathBuf,

    /// UDP/TCP listen port
    #[arg(short, long, default_value_t = DNS_PORT)]
    port: u16,
}

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("dnsgate")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

/// Initialize logging with custom format
///
/// Respects `RUST_LOG` environment variable if set, otherwise defaults to INFO level.
/// Respects `RUST_LOG_FORMAT` environment variable for output format (json or text).
fn initialize_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting dnsgate resolver");
}

/// Build the Kubernetes client from the configured access method.
async fn initialize_client(config: &Config) -> Result<Client> {
    let kube_config = match &config.kubeconfig {
        Some(kubeconfig) => {
            debug!(path = %kubeconfig.path, "using external kubeconfig");
            let file = Kubeconfig::read_from(&kubeconfig.path)
                .with_context(|| format!("failed to read kubeconfig '{}'", kubeconfig.path))?;
            let options = KubeConfigOptions {
                context: kubeconfig.context.clone(),
                ..KubeConfigOptions::default()
            };
            kube::Config::from_custom_kubeconfig(file, &options).await?
        }
        None => kube::Config::infer().await?,
    };
    Ok(Client::try_from(kube_config)?)
}

async fn async_main() -> Result<()> {
    initialize_logging();
    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;
    info!(
        zones = ?config.zones,
        resources = ?config.resources,
        "configuration loaded"
    );

    let client = initialize_client(&config).await?;

    // One table per configured kind, in priority order.
    let kube_tables: Vec<Arc<KubeTable>> = config
        .resources
        .iter()
        .map(|kind| Arc::new(KubeTable::new(*kind)))
        .collect();
    let tables: Vec<Arc<dyn ResourceTable>> = kube_tables
        .iter()
        .map(|table| Arc::clone(table) as Arc<dyn ResourceTable>)
        .collect();

    let mut gateway = Gateway::from_config(&config, tables);

    // The apex label names the resolver's own LoadBalancer Service, so the
    // external-address callback reads from the Service table when present.
    if let Some(service_table) = kube_tables
        .iter()
        .find(|table| table.kind() == ResourceKind::Service)
    {
        let zones = gateway.zones().to_vec();
        gateway = gateway.with_external_address(external_address_fn(
            Arc::clone(service_table),
            zones,
        ));
    }

    let serial = gateway.serial_cell();
    let indexer = watch::spawn(&client, &config, &kube_tables, &serial);
    let gateway = Arc::new(gateway.with_readiness(indexer.readiness_fn()));

    let udp = UdpSocket::bind((DNS_BIND_ADDRESS, cli.port))
        .await
        .with_context(|| format!("failed to bind UDP port {}", cli.port))?;
    let tcp = TcpListener::bind((DNS_BIND_ADDRESS, cli.port))
        .await
        .with_context(|| format!("failed to bind TCP port {}", cli.port))?;

    let observability = observability_router(&indexer);
    let metrics_listener = TcpListener::bind((METRICS_SERVER_BIND_ADDRESS, METRICS_SERVER_PORT))
        .await
        .context("failed to bind metrics port")?;
    info!(
        port = METRICS_SERVER_PORT,
        path = METRICS_SERVER_PATH,
        "observability server listening"
    );

    tokio::select! {
        result = server::serve_udp(udp, Arc::clone(&gateway)) => result?,
        result = server::serve_tcp(tcp, Arc::clone(&gateway)) => result?,
        result = async { axum::serve(metrics_listener, observability).await } => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

fn observability_router(indexer: &watch::IndexerHandle) -> Router {
    let ready = indexer.readiness_fn();
    Router::new()
        .route(
            METRICS_SERVER_PATH,
            get(|| async {
                metrics::gather_metrics()
                    .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))
            }),
        )
        .route("/healthz", get(|| async { "ok" }))
        .route(
            "/readyz",
            get(move || {
                let ready = Arc::clone(&ready);
                async move {
                    if ready() {
                        (StatusCode::OK, "ok")
                    } else {
                        (StatusCode::SERVICE_UNAVAILABLE, "syncing")
                    }
                }
            }),
        )
}
