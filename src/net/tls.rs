//! TLS server configuration.

use std::sync::Arc;

use axum_server::tls_rustls::{RustlsAcceptor, RustlsConfig};
use rustls::crypto::CryptoProvider;
use rustls::ServerConfig;

use crate::config::TimeoutConfig;
use crate::identity::{IdentityResolver, TrustError, TrustPolicy};

#[derive(Debug, thiserror::Error)]
pub enum TlsSetupError {
    #[error("unsupported TLS protocol configuration: {0}")]
    Protocol(#[source] rustls::Error),
    #[error(transparent)]
    Trust(#[from] TrustError),
}

/// Crypto provider used for server keys, client verification and handshakes.
pub fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::aws_lc_rs::default_provider())
}

/// Build the rustls configuration for the TLS listener.
///
/// Certificates come from `resolver` on every handshake; client
/// authentication follows `trust`. TLS 1.2 and 1.3 are enabled.
pub fn build_server_config(
    provider: Arc<CryptoProvider>,
    resolver: Arc<IdentityResolver>,
    trust: &TrustPolicy,
) -> Result<ServerConfig, TlsSetupError> {
    let verifier = trust.client_verifier(Arc::clone(&provider))?;

    let mut server_config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(TlsSetupError::Protocol)?
        .with_client_cert_verifier(verifier)
        .with_cert_resolver(resolver);

    server_config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    tracing::debug!(
        client_auth = trust.requires_client_cert(),
        "TLS configuration built"
    );

    Ok(server_config)
}

/// Acceptor for axum-server with a bounded handshake.
pub fn acceptor(server_config: Arc<ServerConfig>, timeouts: &TimeoutConfig) -> RustlsAcceptor {
    RustlsAcceptor::new(RustlsConfig::from_config(server_config)).handshake_timeout(timeouts.handshake())
}
