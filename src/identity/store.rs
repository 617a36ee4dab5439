//! Certificate and private key loading.
//!
//! # Responsibilities
//! - Read PEM certificate chains and private keys from disk
//! - Verify that the key belongs to the end-entity certificate
//! - Report which path failed and why
//!
//! # Design Decisions
//! - No cache: every load reads the files again, so replaced material is
//!   picked up on the next handshake without a restart
//! - Each load builds an independent value; nothing is shared or mutated

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::pki_types::CertificateDer;
use rustls::sign::CertifiedKey;

use crate::config::{CertPairPaths, TlsConfig};

/// Error type for certificate loading. Every variant names the failing path.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read certificate {path:?}: {source}")]
    CertRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse certificate {path:?}: {source}")]
    CertParse {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no certificates found in {path:?}")]
    NoCertificates { path: PathBuf },
    #[error("failed to read private key {path:?}: {source}")]
    KeyRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse private key {path:?}: {source}")]
    KeyParse {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no private key found in {path:?}")]
    NoPrivateKey { path: PathBuf },
    #[error("unsupported private key {path:?}: {source}")]
    UnsupportedKey {
        path: PathBuf,
        #[source]
        source: rustls::Error,
    },
    #[error("private key {key:?} does not match certificate {cert:?}: {source}")]
    KeyMismatch {
        cert: PathBuf,
        key: PathBuf,
        #[source]
        source: rustls::Error,
    },
}

/// Logical role of a configured certificate pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CertRole {
    /// Presented when the client offers no SNI.
    Default,
    /// Presented whenever the client offers SNI.
    Sni,
}

impl CertRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertRole::Default => "default",
            CertRole::Sni => "sni",
        }
    }
}

impl fmt::Display for CertRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A loaded certificate chain and signing key, tagged with where it came from.
#[derive(Debug, Clone)]
pub struct CertificateMaterial {
    role: CertRole,
    paths: CertPairPaths,
    certified: Arc<CertifiedKey>,
}

impl CertificateMaterial {
    pub fn role(&self) -> CertRole {
        self.role
    }

    pub fn paths(&self) -> &CertPairPaths {
        &self.paths
    }

    /// End-entity certificate in DER form.
    pub fn leaf(&self) -> &CertificateDer<'static> {
        // CertificateStore::load refuses empty chains.
        &self.certified.cert[0]
    }

    pub fn chain_len(&self) -> usize {
        self.certified.cert.len()
    }

    pub fn certified_key(&self) -> Arc<CertifiedKey> {
        Arc::clone(&self.certified)
    }
}

/// Holds the configured pair paths and loads them on demand.
#[derive(Debug, Clone)]
pub struct CertificateStore {
    provider: Arc<CryptoProvider>,
    default_pair: CertPairPaths,
    sni_pair: CertPairPaths,
}

impl CertificateStore {
    pub fn new(provider: Arc<CryptoProvider>, default_pair: CertPairPaths, sni_pair: CertPairPaths) -> Self {
        Self {
            provider,
            default_pair,
            sni_pair,
        }
    }

    pub fn from_config(provider: Arc<CryptoProvider>, config: &TlsConfig) -> Self {
        Self::new(provider, config.default_pair.clone(), config.sni_pair.clone())
    }

    /// Configured paths for a role.
    pub fn paths(&self, role: CertRole) -> &CertPairPaths {
        match role {
            CertRole::Default => &self.default_pair,
            CertRole::Sni => &self.sni_pair,
        }
    }

    /// Load the pair configured for `role`.
    pub fn load_role(&self, role: CertRole) -> Result<CertificateMaterial, LoadError> {
        self.load(role, self.paths(role))
    }

    /// Read a certificate chain and private key and check they belong together.
    pub fn load(&self, role: CertRole, paths: &CertPairPaths) -> Result<CertificateMaterial, LoadError> {
        let cert_file = File::open(&paths.cert).map_err(|source| LoadError::CertRead {
            path: paths.cert.clone(),
            source,
        })?;
        let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut BufReader::new(cert_file))
            .collect::<Result<_, _>>()
            .map_err(|source| LoadError::CertParse {
                path: paths.cert.clone(),
                source,
            })?;
        if certs.is_empty() {
            return Err(LoadError::NoCertificates {
                path: paths.cert.clone(),
            });
        }

        let key_file = File::open(&paths.key).map_err(|source| LoadError::KeyRead {
            path: paths.key.clone(),
            source,
        })?;
        let key = rustls_pemfile::private_key(&mut BufReader::new(key_file))
            .map_err(|source| LoadError::KeyParse {
                path: paths.key.clone(),
                source,
            })?
            .ok_or_else(|| LoadError::NoPrivateKey {
                path: paths.key.clone(),
            })?;

        let signing_key = self
            .provider
            .key_provider
            .load_private_key(key)
            .map_err(|source| LoadError::UnsupportedKey {
                path: paths.key.clone(),
                source,
            })?;

        let certified = CertifiedKey::new(certs, signing_key);
        certified.keys_match().map_err(|source| LoadError::KeyMismatch {
            cert: paths.cert.clone(),
            key: paths.key.clone(),
            source,
        })?;

        Ok(CertificateMaterial {
            role,
            paths: paths.clone(),
            certified: Arc::new(certified),
        })
    }
}
