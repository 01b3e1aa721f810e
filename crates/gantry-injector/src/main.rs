//! Gantry sidecar injector entry point

use std::net::SocketAddr;
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use gantry_common::health::Readiness;
use gantry_injector::config::WEBHOOK_PORT;
use gantry_injector::server::{allowed_controller_uids, routes, InjectorState};
use gantry_injector::InjectorConfig;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let mut config = InjectorConfig::parse();
    config.detect_cluster_domain();

    let client = kube::Client::try_default().await?;
    let authorized_uids = allowed_controller_uids(&client).await?;
    info!(
        uids = authorized_uids.len(),
        cluster_domain = %config.kube_cluster_domain,
        "resolved allow-listed controller accounts"
    );

    let tls_config =
        RustlsConfig::from_pem_file(&config.tls_cert_file, &config.tls_key_file).await?;

    let state = Arc::new(InjectorState {
        config,
        client,
        authorized_uids,
    });

    let readiness = Readiness::new();
    readiness.ready();
    let app = routes(state, readiness);

    let addr = SocketAddr::from(([0, 0, 0, 0], WEBHOOK_PORT));
    info!(%addr, "sidecar injector listening, patching runtime-enabled pods");
    axum_server::bind_rustls(addr, tls_config)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
