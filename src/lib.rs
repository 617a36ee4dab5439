//! Diagnostic HTTP/HTTPS echo responder.
//!
//! Serves the same echo endpoints over plaintext and TLS. On every TLS
//! handshake the certificate is chosen by whether the client offered SNI,
//! and client certificates are enforced when a CA bundle is configured.

pub mod config;
pub mod http;
pub mod identity;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::schema::ResponderConfig;
pub use lifecycle::{ListenerSupervisor, Shutdown};
