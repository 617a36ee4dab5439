//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Startup
//!     → listener.rs (bind both sockets, ephemeral ports resolved)
//!     → tls.rs (rustls ServerConfig: cert resolver + client verifier)
//!     → lifecycle::supervisor (axum-server accept loops)
//!
//! Per TLS connection:
//!     Accept → Handshake (bounded by handshake timeout) → HTTP layer
//! ```
//!
//! # Design Decisions
//! - Sockets are bound synchronously so a bind failure stops startup
//! - Handshake timeout caps unauthenticated connections

pub mod listener;
pub mod tls;

pub use listener::{BoundListener, ListenerError, ListenerKind};
