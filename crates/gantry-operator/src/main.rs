//! Gantry operator entry point

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use gantry_common::health::{self, Readiness};
use gantry_common::OPERATOR_API_PORT;
use gantry_operator::api::OperatorApi;
use gantry_operator::store::KubeStore;
use gantry_operator::{tls, watch};
use gantry_proto::operator_server::OperatorServer;
use tonic::transport::Server;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Port of the operator readiness endpoint
const HEALTHZ_PORT: u16 = 8080;

#[derive(Debug, Parser)]
#[command(name = "gantry-operator", about = "Gantry control-plane operator")]
struct Cli {
    /// Directory holding the platform credential chain; plaintext when absent
    #[arg(long, env = "CREDENTIALS_PATH", default_value = "/var/run/gantry/credentials")]
    credentials_path: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let client = kube::Client::try_default().await?;

    let api = Arc::new(OperatorApi::new(Arc::new(KubeStore::new(client.clone()))));

    tokio::spawn(watch::watch_components(client, api.clone()));

    let readiness = Readiness::new();
    tokio::spawn(health::serve(readiness.clone(), HEALTHZ_PORT, async {
        let _ = tokio::signal::ctrl_c().await;
    }));

    let addr = SocketAddr::from(([0, 0, 0, 0], OPERATOR_API_PORT as u16));
    let mut builder = Server::builder();
    if let Some(chain) = tls::load_cert_chain(&cli.credentials_path)? {
        info!(%addr, "starting gRPC server with TLS");
        builder = builder.tls_config(tls::server_tls_config(&chain))?;
    } else {
        info!(%addr, "starting gRPC server without TLS");
    }

    readiness.ready();
    builder
        .add_service(OperatorServer::from_arc(api))
        .serve_with_shutdown(addr, async {
            let _ = tokio::signal::ctrl_c().await;
            info!("operator shutting down");
        })
        .await?;

    Ok(())
}
