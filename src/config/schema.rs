//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the responder.
//! All types derive Serde traits so a TOML file can supply any subset of them;
//! CLI flags and environment variables are layered on top by `config::cli`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_TLS_CERT: &str = "/usr/src/app/pki/tls.crt";
const DEFAULT_TLS_KEY: &str = "/usr/src/app/pki/tls.key";

/// Root configuration for the responder.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ResponderConfig {
    /// Bind address and ports for both listeners.
    pub listener: ListenerConfig,

    /// Certificate material and client verification.
    pub tls: TlsConfig,

    /// Handshake, request and shutdown timeouts.
    pub timeouts: TimeoutConfig,

    /// Listener supervision policy.
    pub supervisor: SupervisorConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration shared by the plaintext and TLS listeners.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// IP address both listeners bind to.
    pub bind_address: IpAddr,

    /// Port for plaintext HTTP.
    pub http_port: u16,

    /// Port for TLS-terminated HTTP.
    pub https_port: u16,
}

impl ListenerConfig {
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.http_port)
    }

    pub fn https_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.https_port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            http_port: 80,
            https_port: 443,
        }
    }
}

/// Paths of a PEM certificate chain and its private key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CertPairPaths {
    /// Path to certificate chain file (PEM).
    pub cert: PathBuf,

    /// Path to private key file (PEM).
    pub key: PathBuf,
}

impl CertPairPaths {
    pub fn new(cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        Self {
            cert: cert.into(),
            key: key.into(),
        }
    }
}

impl Default for CertPairPaths {
    fn default() -> Self {
        Self::new(DEFAULT_TLS_CERT, DEFAULT_TLS_KEY)
    }
}

/// TLS configuration for the HTTPS listener.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TlsConfig {
    /// Pair presented when the client offers no SNI.
    pub default_pair: CertPairPaths,

    /// Pair presented whenever the client offers SNI.
    pub sni_pair: CertPairPaths,

    /// CA bundle for client certificate verification (mTLS).
    /// Unset means client certificates are neither requested nor validated.
    pub client_ca: Option<PathBuf>,
}

/// Timeout configuration in seconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upper bound for a TLS handshake.
    pub handshake_secs: u64,

    /// Upper bound for handling a single request.
    pub request_secs: u64,

    /// Time in-flight connections get to finish after a listener is stopped.
    pub shutdown_grace_secs: u64,
}

impl TimeoutConfig {
    pub fn handshake(&self) -> Duration {
        Duration::from_secs(self.handshake_secs)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            handshake_secs: 10,
            request_secs: 30,
            shutdown_grace_secs: 10,
        }
    }
}

/// What happens to the other listener when one fails unexpectedly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Report the failure and keep the other listener serving.
    #[default]
    Isolate,
    /// Report the failure and gracefully stop the other listener too.
    Escalate,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SupervisorConfig {
    pub failure_policy: FailurePolicy,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log output format.
    pub log_format: LogFormat,

    /// Prometheus exporter bind address. Disabled when unset.
    pub metrics_address: Option<SocketAddr>,
}
