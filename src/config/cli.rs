//! Command line and environment configuration.
//!
//! Every option can be given as a flag or through its environment variable.
//! Values given here override the optional TOML file, which overrides the
//! built-in defaults.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

use crate::config::loader::{load_config, ConfigError};
use crate::config::schema::{FailurePolicy, LogFormat, ResponderConfig};
use crate::config::validation::validate_config;

#[derive(Debug, Parser)]
#[command(name = "tls-echo-responder")]
#[command(version, about = "Diagnostic HTTP/HTTPS responder with SNI-driven certificate selection", long_about = None)]
pub struct Cli {
    /// Optional TOML file with base configuration
    #[arg(long, env = "RESPONDER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address both listeners bind to
    #[arg(long, env = "BIND_ADDRESS")]
    pub bind_address: Option<IpAddr>,

    /// Port for the TLS listener
    #[arg(long, env = "HTTPS_PORT")]
    pub https_port: Option<u16>,

    /// Port for the plaintext listener
    #[arg(long, env = "HTTP_PORT")]
    pub http_port: Option<u16>,

    /// Certificate presented when no SNI is offered
    #[arg(long, env = "TLS_CERT")]
    pub tls_cert: Option<PathBuf>,

    /// Key for --tls-cert
    #[arg(long, env = "TLS_KEY")]
    pub tls_key: Option<PathBuf>,

    /// Certificate presented when SNI is offered
    #[arg(long, env = "SERVER_TLS_CERT")]
    pub server_tls_cert: Option<PathBuf>,

    /// Key for --server-tls-cert
    #[arg(long, env = "SERVER_TLS_KEY")]
    pub server_tls_key: Option<PathBuf>,

    /// CA bundle; when set, clients must present a certificate chaining to it.
    /// An empty value leaves client authentication off.
    #[arg(long, env = "CLIENT_TLS_CA")]
    pub client_tls_ca: Option<String>,

    #[arg(long, env = "HANDSHAKE_TIMEOUT_SECS")]
    pub handshake_timeout_secs: Option<u64>,

    #[arg(long, env = "REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,

    #[arg(long, env = "SHUTDOWN_GRACE_SECS")]
    pub shutdown_grace_secs: Option<u64>,

    /// What an unexpected listener failure does to the other listener
    #[arg(long, env = "LISTENER_FAILURE_POLICY", value_enum)]
    pub listener_failure_policy: Option<FailurePolicy>,

    #[arg(long, env = "LOG_FORMAT", value_enum)]
    pub log_format: Option<LogFormat>,

    /// Bind address for the Prometheus exporter
    #[arg(long, env = "METRICS_ADDRESS")]
    pub metrics_address: Option<SocketAddr>,
}

impl Cli {
    /// Build the validated configuration: defaults, then file, then flags/env.
    pub fn into_config(self) -> Result<ResponderConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ResponderConfig::default(),
        };

        self.apply(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    fn apply(self, config: &mut ResponderConfig) {
        let listener = &mut config.listener;
        if let Some(addr) = self.bind_address {
            listener.bind_address = addr;
        }
        if let Some(port) = self.https_port {
            listener.https_port = port;
        }
        if let Some(port) = self.http_port {
            listener.http_port = port;
        }

        let tls = &mut config.tls;
        if let Some(path) = self.tls_cert {
            tls.default_pair.cert = path;
        }
        if let Some(path) = self.tls_key {
            tls.default_pair.key = path;
        }
        if let Some(path) = self.server_tls_cert {
            tls.sni_pair.cert = path;
        }
        if let Some(path) = self.server_tls_key {
            tls.sni_pair.key = path;
        }
        if let Some(path) = self.client_tls_ca {
            // PathBuf's parser refuses "", which is how mTLS is switched off.
            tls.client_ca = (!path.is_empty()).then(|| PathBuf::from(path));
        }

        let timeouts = &mut config.timeouts;
        if let Some(secs) = self.handshake_timeout_secs {
            timeouts.handshake_secs = secs;
        }
        if let Some(secs) = self.request_timeout_secs {
            timeouts.request_secs = secs;
        }
        if let Some(secs) = self.shutdown_grace_secs {
            timeouts.shutdown_grace_secs = secs;
        }

        if let Some(policy) = self.listener_failure_policy {
            config.supervisor.failure_policy = policy;
        }
        if let Some(format) = self.log_format {
            config.observability.log_format = format;
        }
        if let Some(addr) = self.metrics_address {
            config.observability.metrics_address = Some(addr);
        }
    }
}
