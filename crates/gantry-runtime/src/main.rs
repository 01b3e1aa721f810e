//! Gantry sidecar entry point
//!
//! Assembles configuration from flags and environment, wires the provider
//! registry, resolves component definitions (directory or operator), and
//! serves readiness until shutdown. Backend adapters register themselves
//! here; the open-source tree ships with an empty hub.

use clap::Parser;
use gantry_common::health::{self, Readiness};
use gantry_registry::RegistryHub;
use gantry_runtime::config::Mode;
use gantry_runtime::loader::{ClusterLoader, StandaloneLoader};
use gantry_runtime::{Runtime, RuntimeConfig};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = RuntimeConfig::parse();

    let registry = tracing_subscriber::registry().with(EnvFilter::from_default_env());
    if config.log_as_json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }

    info!(app_id = %config.app_id, mode = ?config.mode, "gantry sidecar starting");

    // Backend adapters are registered here at startup, before any create
    // call; the hub is immutable afterwards.
    let hub = RegistryHub::new();

    let readiness = Readiness::new();
    let public_port = config.app_public_port;
    let health_handle = tokio::spawn(health::serve(readiness.clone(), public_port, async {
        let _ = tokio::signal::ctrl_c().await;
    }));

    let runtime = Runtime::new(config.clone(), hub);
    let providers = match config.mode {
        Mode::Standalone => {
            let loader = StandaloneLoader::new(&config.components_path);
            runtime.init_components(&loader).await?
        }
        Mode::Kubernetes => {
            let cert_chain = if config.enable_mtls {
                Some(cert_chain_from_env()?)
            } else {
                None
            };
            let client = gantry_runtime::client::connect(
                &config.control_plane_address,
                gantry_common::OPERATOR_API_SERVICE,
                cert_chain.as_ref(),
            )
            .await?;
            let loader = ClusterLoader::new(client, &config.namespace, &config.pod_name);
            runtime.init_components(&loader).await?
        }
    };

    info!(
        state_stores = providers.state_stores.len(),
        pubsubs = providers.pubsubs.len(),
        secret_stores = providers.secret_stores.len(),
        "components initialized"
    );

    readiness.ready();

    match health_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "health server error"),
        Err(e) => error!(error = %e, "health server task failed"),
    }
    info!("gantry sidecar stopped");
    Ok(())
}

/// Read the mTLS credential chain the injector placed in the environment
fn cert_chain_from_env() -> anyhow::Result<gantry_runtime::client::CertChain> {
    let var = |name: &str| {
        std::env::var(name).map_err(|_| anyhow::anyhow!("mTLS enabled but {name} is not set"))
    };
    Ok(gantry_runtime::client::CertChain {
        root_ca: var(gantry_common::TRUST_ANCHORS_ENV_VAR)?,
        cert: var(gantry_common::CERT_CHAIN_ENV_VAR)?,
        key: var(gantry_common::CERT_KEY_ENV_VAR)?,
    })
}
