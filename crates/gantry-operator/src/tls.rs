//! Credentials loading for the operator gRPC endpoint
//!
//! The operator serves TLS when a credentials directory with the platform
//! trust bundle files is present; otherwise it serves plaintext.

use std::path::Path;

use gantry_common::{
    Error, Result, ISSUER_CERT_FILENAME, ISSUER_KEY_FILENAME, ROOT_CERT_FILENAME,
};
use tonic::transport::{Certificate, Identity, ServerTlsConfig};

/// PEM credentials for the operator endpoint
pub struct CertChain {
    /// Root CA certificate clients use to verify the operator
    pub root_ca: String,
    /// Certificate the operator presents
    pub cert: String,
    /// Private key for the presented certificate
    pub key: String,
}

/// Load the credential chain from a directory holding `ca.crt`,
/// `issuer.crt` and `issuer.key`.
///
/// Returns `None` when the directory does not exist, which selects
/// plaintext serving.
pub fn load_cert_chain(path: &Path) -> Result<Option<CertChain>> {
    if !path.is_dir() {
        return Ok(None);
    }
    let read = |name: &str| {
        std::fs::read_to_string(path.join(name))
            .map_err(|e| Error::io(path.join(name).display().to_string(), e))
    };
    Ok(Some(CertChain {
        root_ca: read(ROOT_CERT_FILENAME)?,
        cert: read(ISSUER_CERT_FILENAME)?,
        key: read(ISSUER_KEY_FILENAME)?,
    }))
}

/// Build the tonic server TLS config from a credential chain.
///
/// Clients present certificates signed by the same CA (mutual TLS).
pub fn server_tls_config(chain: &CertChain) -> ServerTlsConfig {
    ServerTlsConfig::new()
        .identity(Identity::from_pem(&chain.cert, &chain.key))
        .client_ca_root(Certificate::from_pem(&chain.root_ca))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_directory_selects_plaintext() {
        let chain = load_cert_chain(Path::new("/nonexistent/gantry-credentials")).unwrap();
        assert!(chain.is_none());
    }

    #[test]
    fn partial_directory_is_an_error() {
        let dir = std::env::temp_dir().join(format!("gantry-tls-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(ROOT_CERT_FILENAME), "pem").unwrap();

        let result = load_cert_chain(&dir);
        std::fs::remove_dir_all(&dir).unwrap();
        assert!(result.is_err());
    }
}
