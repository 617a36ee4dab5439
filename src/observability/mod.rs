//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (text or JSON)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Every handshake resolution is logged with server name and chosen pair
//! - Listener termination causes are always logged
//! - Metrics are cheap and disabled unless an exporter address is configured

pub mod logging;
pub mod metrics;
