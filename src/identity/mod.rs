//! TLS identity subsystem.
//!
//! # Data Flow
//! ```text
//! ClientHello (server_name)
//!     → resolver.rs (pick role: SNI present → sni pair, absent → default pair)
//!     → store.rs (read PEM files, check key matches certificate)
//!     → CertifiedKey handed to rustls, or None to abort the handshake
//!
//! Startup only:
//!     CLIENT_TLS_CA → trust.rs (RootCertStore + client verifier, fatal on error)
//! ```
//!
//! # Design Decisions
//! - Certificate pairs are re-read on every handshake (no cache)
//! - Selection depends on SNI presence, never on the hostname value
//! - Trust roots are loaded once before any socket is bound

pub mod resolver;
pub mod store;
pub mod trust;

pub use resolver::{IdentityResolver, ResolutionError};
pub use store::{CertRole, CertificateMaterial, CertificateStore, LoadError};
pub use trust::{ClientAuth, TrustError, TrustPolicy};
