//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde and clap handle syntactic)
//! - Validate value ranges (timeouts > 0, distinct ports)
//! - Reject empty certificate paths
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ResponderConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::path::Path;

use crate::config::schema::{CertPairPaths, ResponderConfig};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("http_port and https_port are both {0}")]
    PortConflict(u16),
    #[error("timeout `{0}` must be greater than zero")]
    ZeroTimeout(&'static str),
    #[error("certificate path `{0}` is empty")]
    EmptyPath(&'static str),
}

pub fn validate_config(config: &ResponderConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let listener = &config.listener;
    // Port 0 asks the OS for an ephemeral port, so two zeros never collide.
    if listener.http_port != 0 && listener.http_port == listener.https_port {
        errors.push(ValidationError::PortConflict(listener.http_port));
    }

    let timeouts = &config.timeouts;
    for (name, value) in [
        ("handshake_secs", timeouts.handshake_secs),
        ("request_secs", timeouts.request_secs),
        ("shutdown_grace_secs", timeouts.shutdown_grace_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroTimeout(name));
        }
    }

    check_pair(&config.tls.default_pair, "tls.default_pair", &mut errors);
    check_pair(&config.tls.sni_pair, "tls.sni_pair", &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_pair(pair: &CertPairPaths, name: &'static str, errors: &mut Vec<ValidationError>) {
    if is_empty(&pair.cert) || is_empty(&pair.key) {
        errors.push(ValidationError::EmptyPath(name));
    }
}

fn is_empty(path: &Path) -> bool {
    path.as_os_str().is_empty()
}
