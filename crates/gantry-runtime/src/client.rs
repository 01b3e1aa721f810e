//! gRPC client for the operator API
//!
//! When a certificate chain is configured the connection uses mutual TLS:
//! the root CA verifies the operator, the sidecar presents its own identity,
//! and the expected server name is pinned. Without a chain the connection is
//! plaintext (development mode).

use gantry_common::{Error, Result};
use gantry_proto::operator_client::OperatorClient;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Identity};

/// PEM-encoded credential chain for mutual TLS
#[derive(Clone, Debug)]
pub struct CertChain {
    /// Root CA certificate verifying the operator
    pub root_ca: String,
    /// Client certificate presented to the operator
    pub cert: String,
    /// Client private key
    pub key: String,
}

/// Connect to the operator API at `address` (host:port).
///
/// `server_name` is the TLS server name expected on the operator's
/// certificate; it is ignored for plaintext connections.
pub async fn connect(
    address: &str,
    server_name: &str,
    cert_chain: Option<&CertChain>,
) -> Result<OperatorClient<Channel>> {
    let channel = match cert_chain {
        Some(chain) => {
            let tls = ClientTlsConfig::new()
                .ca_certificate(Certificate::from_pem(&chain.root_ca))
                .identity(Identity::from_pem(&chain.cert, &chain.key))
                .domain_name(server_name);
            Channel::from_shared(format!("https://{address}"))
                .map_err(|e| Error::internal_with_context("operator-client", e.to_string()))?
                .tls_config(tls)
                .map_err(|e| Error::internal_with_context("operator-client", e.to_string()))?
                .connect()
                .await
                .map_err(|e| Error::unavailable(format!("connecting to operator at {address}: {e}")))?
        }
        None => Channel::from_shared(format!("http://{address}"))
            .map_err(|e| Error::internal_with_context("operator-client", e.to_string()))?
            .connect()
            .await
            .map_err(|e| Error::unavailable(format!("connecting to operator at {address}: {e}")))?,
    };
    Ok(OperatorClient::new(channel))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_unparseable_address() {
        let result = connect("not a uri", "gantry-api", None).await;
        assert!(result.is_err());
    }
}
