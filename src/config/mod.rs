//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults (schema.rs)
//!     → optional TOML file (loader.rs)
//!     → CLI flags / environment (cli.rs)
//!     → validation.rs (semantic checks)
//!     → ResponderConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload
//! - All fields have defaults to allow running with no configuration at all
//! - Validation separates syntactic (serde/clap) from semantic checks

pub mod cli;
pub mod loader;
pub mod schema;
pub mod validation;

pub use cli::Cli;
pub use loader::ConfigError;
pub use schema::{
    CertPairPaths, FailurePolicy, ListenerConfig, LogFormat, ObservabilityConfig,
    ResponderConfig, SupervisorConfig, TimeoutConfig, TlsConfig,
};
