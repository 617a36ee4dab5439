//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the supervisor (trust, identity, TLS) before binding anything
//! - Start the optional metrics exporter once that succeeded
//! - Bind listeners, serve until shutdown, and join both listeners
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and nothing is left bound
//! - Listeners start last (traffic only when ready)

use std::sync::Arc;

use crate::config::ResponderConfig;
use crate::lifecycle::supervisor::{ListenerSupervisor, StartupError, SupervisorReport};
use crate::lifecycle::Shutdown;
use crate::observability::metrics::{self, MetricsError};

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Metrics(#[from] MetricsError),
}

/// Run the responder until `shutdown` fires and both listeners are closed.
pub async fn run(config: ResponderConfig, shutdown: &Shutdown) -> Result<SupervisorReport, RunError> {
    let config = Arc::new(config);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        http_port = config.listener.http_port,
        https_port = config.listener.https_port,
        default_cert = %config.tls.default_pair.cert.display(),
        sni_cert = %config.tls.sni_pair.cert.display(),
        client_ca = ?config.tls.client_ca,
        failure_policy = ?config.supervisor.failure_policy,
        "Configuration loaded"
    );

    let supervisor = ListenerSupervisor::new(Arc::clone(&config))?;

    // The exporter owns a port too, so it waits until trust and TLS are valid.
    if let Some(addr) = config.observability.metrics_address {
        metrics::init_metrics(addr)?;
    }
    let shutdown_rx = shutdown.subscribe();
    let running = supervisor.start()?;
    // A signal that arrived while loading TLS material predates the subscription.
    if shutdown.is_triggered() {
        running.control().shutdown_all();
    }

    Ok(running.wait(shutdown_rx).await)
}
