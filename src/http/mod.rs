//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection (axum-server, HTTP/1.1 or HTTP/2)
//!     → request.rs (request ID assigned or kept)
//!     → server.rs (trace span, timeout, metrics)
//!     → handlers.rs (healthz / headers / echo)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod server;

pub use request::UuidRequestId;
pub use server::{build_router, make_service};
