//! SNI-driven certificate selection.
//!
//! The decision is driven by whether the client offered a hostname, not by
//! its value: any SNI gets the SNI pair, no SNI gets the default pair. The
//! certificate's own subject names are never compared with the hostname.
//!
//! A pair that fails to load rejects the handshake. There is no fallback to
//! the other pair, so a broken SNI certificate shows up as a handshake
//! failure instead of hiding behind the default one.

use std::sync::Arc;

use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;

use crate::config::CertPairPaths;
use crate::identity::store::{CertRole, CertificateMaterial, CertificateStore, LoadError};
use crate::observability::metrics;

#[derive(Debug, thiserror::Error)]
#[error("cannot resolve {role} certificate for server name {server_name}: {source}")]
pub struct ResolutionError {
    pub role: CertRole,
    pub server_name: String,
    #[source]
    pub source: LoadError,
}

impl CertRole {
    /// Role to present for a requested hostname. An empty name counts as absent.
    pub fn for_hostname(server_name: Option<&str>) -> Self {
        match server_name {
            Some(name) if !name.is_empty() => CertRole::Sni,
            _ => CertRole::Default,
        }
    }
}

/// Picks the certificate to present for each TLS handshake.
#[derive(Debug)]
pub struct IdentityResolver {
    store: CertificateStore,
}

impl IdentityResolver {
    pub fn new(store: CertificateStore) -> Self {
        Self { store }
    }

    /// Load the material for a handshake that requested `server_name`.
    pub fn resolve(&self, server_name: Option<&str>) -> Result<CertificateMaterial, ResolutionError> {
        let role = CertRole::for_hostname(server_name);
        let shown_name = server_name.filter(|name| !name.is_empty()).unwrap_or("<none>");
        let CertPairPaths { cert, key } = self.store.paths(role);

        tracing::info!(
            server_name = shown_name,
            role = %role,
            cert = %cert.display(),
            key = %key.display(),
            "Resolving certificate for TLS handshake"
        );

        match self.store.load_role(role) {
            Ok(material) => {
                metrics::record_handshake_resolution(role, true);
                tracing::debug!(
                    server_name = shown_name,
                    role = %role,
                    chain_len = material.chain_len(),
                    "Certificate resolved"
                );
                Ok(material)
            }
            Err(source) => {
                metrics::record_handshake_resolution(role, false);
                tracing::error!(
                    server_name = shown_name,
                    role = %role,
                    cert = %cert.display(),
                    key = %key.display(),
                    error = %source,
                    "Failed to load certificate pair, rejecting handshake"
                );
                Err(ResolutionError {
                    role,
                    server_name: shown_name.to_string(),
                    source,
                })
            }
        }
    }

    /// Load both pairs once and log the outcome.
    ///
    /// Failures are not fatal: the files are read again on every handshake
    /// and may be fixed while the process runs.
    pub fn preflight(&self) -> usize {
        let mut healthy = 0;
        for role in [CertRole::Default, CertRole::Sni] {
            match self.store.load_role(role) {
                Ok(material) => {
                    healthy += 1;
                    tracing::info!(
                        role = %role,
                        cert = %material.paths().cert.display(),
                        chain_len = material.chain_len(),
                        "Certificate pair loadable"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        role = %role,
                        error = %e,
                        "Certificate pair not loadable; handshakes needing it will be rejected"
                    );
                }
            }
        }
        healthy
    }
}

impl ResolvesServerCert for IdentityResolver {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        // None makes rustls abort the handshake with a fatal alert.
        IdentityResolver::resolve(self, client_hello.server_name())
            .ok()
            .map(|material| material.certified_key())
    }
}
