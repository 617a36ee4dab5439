//! Client certificate trust (mTLS).

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::pki_types::CertificateDer;
use rustls::server::danger::ClientCertVerifier;
use rustls::server::{VerifierBuilderError, WebPkiClientVerifier};
use rustls::RootCertStore;

/// Fatal trust configuration errors. None of these are recoverable at runtime.
#[derive(Debug, thiserror::Error)]
pub enum TrustError {
    #[error("failed to read CA bundle {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse CA bundle {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no CA certificates found in {path:?}")]
    Empty { path: PathBuf },
    #[error("invalid CA certificate in {path:?}: {source}")]
    InvalidCa {
        path: PathBuf,
        #[source]
        source: rustls::Error,
    },
    #[error("failed to build client certificate verifier: {0}")]
    Verifier(#[from] VerifierBuilderError),
}

/// Whether clients must authenticate with a certificate.
#[derive(Debug, Clone)]
pub enum ClientAuth {
    Disabled,
    Required {
        ca_path: PathBuf,
        roots: Arc<RootCertStore>,
    },
}

#[derive(Debug, Clone)]
pub struct TrustPolicy {
    client_auth: ClientAuth,
}

impl TrustPolicy {
    /// Build the policy from an optional CA bundle path.
    pub fn build(ca_bundle: Option<&Path>) -> Result<Self, TrustError> {
        let Some(ca_path) = ca_bundle else {
            tracing::info!("No client CA configured, client certificates not required");
            return Ok(Self {
                client_auth: ClientAuth::Disabled,
            });
        };

        let roots = load_ca_bundle(ca_path)?;
        tracing::info!(
            ca_file = %ca_path.display(),
            cert_count = roots.len(),
            "Requiring client certificates"
        );

        Ok(Self {
            client_auth: ClientAuth::Required {
                ca_path: ca_path.to_path_buf(),
                roots: Arc::new(roots),
            },
        })
    }

    pub fn client_auth(&self) -> &ClientAuth {
        &self.client_auth
    }

    pub fn requires_client_cert(&self) -> bool {
        matches!(self.client_auth, ClientAuth::Required { .. })
    }

    /// Verifier for the TLS listener.
    ///
    /// With a CA bundle, a client that presents no certificate, or one not
    /// chaining to the bundle, fails the handshake.
    pub fn client_verifier(&self, provider: Arc<CryptoProvider>) -> Result<Arc<dyn ClientCertVerifier>, TrustError> {
        match &self.client_auth {
            ClientAuth::Disabled => Ok(WebPkiClientVerifier::no_client_auth()),
            ClientAuth::Required { roots, .. } => {
                Ok(WebPkiClientVerifier::builder_with_provider(Arc::clone(roots), provider).build()?)
            }
        }
    }
}

fn load_ca_bundle(ca_path: &Path) -> Result<RootCertStore, TrustError> {
    let file = File::open(ca_path).map_err(|source| TrustError::Read {
        path: ca_path.to_path_buf(),
        source,
    })?;

    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<_, _>>()
        .map_err(|source| TrustError::Parse {
            path: ca_path.to_path_buf(),
            source,
        })?;

    let mut roots = RootCertStore::empty();
    for cert in certs {
        roots.add(cert).map_err(|source| TrustError::InvalidCa {
            path: ca_path.to_path_buf(),
            source,
        })?;
    }

    if roots.is_empty() {
        return Err(TrustError::Empty {
            path: ca_path.to_path_buf(),
        });
    }

    Ok(roots)
}
