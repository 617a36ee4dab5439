//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! startup.rs
//!     ResponderConfig → supervisor.rs (trust, identity, rustls config)
//!     → bind http + https → one accept loop per listener
//!
//! signals.rs → shutdown.rs
//!     SIGINT / SIGTERM → stop request latched and broadcast
//!
//! supervisor.rs
//!     stop request or listener failure → graceful drain per listener
//!     → RunHandle::wait returns once both listeners report an exit
//! ```
//!
//! # Design Decisions
//! - Nothing binds until CA bundle and rustls config are valid
//! - Draining is bounded by the shutdown grace period
//! - The process returns only after both listeners have closed

pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod supervisor;

pub use shutdown::Shutdown;
pub use supervisor::{
    ListenerExit, ListenerOutcome, ListenerState, ListenerSupervisor, RunHandle, StartupError,
    SupervisorControl, SupervisorReport,
};
