//! TLS echo responder.
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌──────────────────────────────────────────────┐
//!                          │                 RESPONDER                     │
//!                          │                                               │
//!   plaintext :HTTP_PORT   │  ┌──────────┐                                 │
//!   ───────────────────────┼─▶│  http    │──┐                              │
//!                          │  │ listener │  │    ┌─────────────────────┐   │
//!                          │  └──────────┘  ├───▶│  dispatch (axum)    │   │
//!   TLS :HTTPS_PORT        │  ┌──────────┐  │    │ /healthz /headers / │   │
//!   ───────────────────────┼─▶│  https   │──┘    └─────────────────────┘   │
//!                          │  │ listener │                                 │
//!                          │  └────┬─────┘                                 │
//!                          │       │ ClientHello                           │
//!                          │       ▼                                       │
//!                          │  ┌──────────┐   ┌───────────┐  ┌───────────┐  │
//!                          │  │ identity │──▶│cert store │  │  trust    │  │
//!                          │  │ resolver │   │ (PEM i/o) │  │ (mTLS CA) │  │
//!                          │  └──────────┘   └───────────┘  └───────────┘  │
//!                          │                                               │
//!                          │  supervisor: both listeners joined on exit    │
//!                          └──────────────────────────────────────────────┘
//! ```

use std::process::ExitCode;

use clap::Parser;

use tls_echo_responder::config::{Cli, LogFormat};
use tls_echo_responder::lifecycle::{signals, startup, Shutdown};
use tls_echo_responder::observability::logging::init_logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let fallback_format = cli.log_format.unwrap_or(LogFormat::Text);

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            init_logging(fallback_format);
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    init_logging(config.observability.log_format);
    tracing::info!("tls-echo-responder v{} starting", env!("CARGO_PKG_VERSION"));

    let shutdown = Shutdown::new();
    let signal_task = signals::spawn_signal_listener(shutdown.clone());

    let result = startup::run(config, &shutdown).await;
    signal_task.abort();

    match result {
        Ok(report) if report.is_clean() => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Ok(report) => {
            for exit in report.exits.iter().filter(|exit| !exit.outcome.is_graceful()) {
                tracing::error!(listener = %exit.kind, outcome = ?exit.outcome, "Listener did not close cleanly");
            }
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            ExitCode::FAILURE
        }
    }
}
