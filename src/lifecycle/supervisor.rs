//! Supervision of the plaintext and TLS listeners.
//!
//! # Listener States
//! ```text
//! Created → Listening → Serving → Terminating → Closed
//!                          └──── (serve error) ────┘
//! ```
//!
//! # Responsibilities
//! - Build trust, identity and TLS configuration before any socket is bound
//! - Bind both sockets, then run one accept loop per listener
//! - Stop listeners individually or together, draining in-flight requests
//! - Apply the failure policy when a listener dies unexpectedly
//! - Join both listener lifetimes before reporting
//!
//! # Design Decisions
//! - The two listeners share only read-only state (config, router, rustls config)
//! - A graceful stop of one listener never affects the other
//! - The failure policy is symmetric across listeners

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum_server::Handle;
use rustls::ServerConfig;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::{FailurePolicy, ResponderConfig};
use crate::http::{build_router, make_service};
use crate::identity::{CertificateStore, IdentityResolver, TrustError, TrustPolicy};
use crate::net::tls::{self, TlsSetupError};
use crate::net::{BoundListener, ListenerError, ListenerKind};
use crate::observability::metrics;

/// Errors that stop the process before it serves anything.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid client trust configuration: {0}")]
    Trust(#[from] TrustError),
    #[error("invalid TLS configuration: {0}")]
    Tls(#[from] TlsSetupError),
    #[error(transparent)]
    Bind(#[from] ListenerError),
}

/// Lifecycle state of one listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Configuration bound, no socket open.
    Created,
    /// Socket bound, accept loop not yet running.
    Listening,
    /// Accepting and handling connections.
    Serving,
    /// Asked to stop or failed; in-flight connections may still finish.
    Terminating,
    /// Socket released.
    Closed,
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ListenerState::Created => "created",
            ListenerState::Listening => "listening",
            ListenerState::Serving => "serving",
            ListenerState::Terminating => "terminating",
            ListenerState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// How a listener ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerOutcome {
    /// Stopped on request.
    Graceful,
    /// Stopped by an unexpected error.
    Failed(String),
}

impl ListenerOutcome {
    pub fn is_graceful(&self) -> bool {
        matches!(self, ListenerOutcome::Graceful)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerExit {
    pub kind: ListenerKind,
    pub outcome: ListenerOutcome,
}

/// Exit record of both listeners, in the order they closed.
#[derive(Debug, Clone)]
pub struct SupervisorReport {
    pub exits: Vec<ListenerExit>,
}

impl SupervisorReport {
    /// True when every listener closed gracefully.
    pub fn is_clean(&self) -> bool {
        self.exits.iter().all(|exit| exit.outcome.is_graceful())
    }

    pub fn exit(&self, kind: ListenerKind) -> Option<&ListenerExit> {
        self.exits.iter().find(|exit| exit.kind == kind)
    }
}

#[derive(Debug)]
struct PerListener<T> {
    plain: T,
    tls: T,
}

impl<T> PerListener<T> {
    fn get(&self, kind: ListenerKind) -> &T {
        match kind {
            ListenerKind::Plain => &self.plain,
            ListenerKind::Tls => &self.tls,
        }
    }
}

fn transition(kind: ListenerKind, state: &watch::Sender<ListenerState>, next: ListenerState) {
    let previous = state.send_replace(next);
    if previous != next {
        tracing::debug!(listener = %kind, from = %previous, to = %next, "Listener state changed");
    }
}

/// Owns both listeners from configuration to first accept.
pub struct ListenerSupervisor {
    config: Arc<ResponderConfig>,
    router: Router,
    tls_config: Arc<ServerConfig>,
    states: PerListener<watch::Sender<ListenerState>>,
}

impl ListenerSupervisor {
    /// Prepare everything that can fail without binding a socket.
    ///
    /// A broken CA bundle or TLS setup is returned here, so the process can
    /// exit before any port is taken.
    pub fn new(config: Arc<ResponderConfig>) -> Result<Self, StartupError> {
        let provider = tls::crypto_provider();
        let trust = TrustPolicy::build(config.tls.client_ca.as_deref())?;

        let store = CertificateStore::from_config(Arc::clone(&provider), &config.tls);
        let resolver = Arc::new(IdentityResolver::new(store));
        resolver.preflight();

        let tls_config = Arc::new(tls::build_server_config(provider, resolver, &trust)?);
        let router = build_router(config.timeouts.request());

        Ok(Self {
            config,
            router,
            tls_config,
            states: PerListener {
                plain: watch::channel(ListenerState::Created).0,
                tls: watch::channel(ListenerState::Created).0,
            },
        })
    }

    pub fn state(&self, kind: ListenerKind) -> ListenerState {
        *self.states.get(kind).borrow()
    }

    /// Bind both listeners and start serving.
    pub fn start(self) -> Result<RunHandle, StartupError> {
        let listener_config = &self.config.listener;
        let plain = BoundListener::bind(ListenerKind::Plain, listener_config.http_addr())?;
        let tls = BoundListener::bind(ListenerKind::Tls, listener_config.https_addr())?;
        transition(ListenerKind::Plain, &self.states.plain, ListenerState::Listening);
        transition(ListenerKind::Tls, &self.states.tls, ListenerState::Listening);

        let handles = PerListener {
            plain: Handle::new(),
            tls: Handle::new(),
        };
        let (exit_tx, exit_rx) = mpsc::channel(ListenerKind::ALL.len());

        tracing::info!(address = %plain.local_addr(), "Starting listening for incoming HTTP requests");
        let plain_addr = plain.local_addr();
        let plain_server = axum_server::from_tcp(plain.into_std())
            .handle(handles.plain.clone())
            .serve(make_service(self.router.clone()));

        tracing::info!(address = %tls.local_addr(), "Starting listening for incoming HTTPS requests");
        let tls_addr = tls.local_addr();
        let tls_server = axum_server::from_tcp(tls.into_std())
            .acceptor(tls::acceptor(Arc::clone(&self.tls_config), &self.config.timeouts))
            .handle(handles.tls.clone())
            .serve(make_service(self.router));

        let tasks = vec![
            (
                ListenerKind::Plain,
                tokio::spawn(run_listener(
                    ListenerKind::Plain,
                    plain_server,
                    self.states.plain.clone(),
                    exit_tx.clone(),
                )),
            ),
            (
                ListenerKind::Tls,
                tokio::spawn(run_listener(
                    ListenerKind::Tls,
                    tls_server,
                    self.states.tls.clone(),
                    exit_tx,
                )),
            ),
        ];

        let control = SupervisorControl {
            inner: Arc::new(ControlInner {
                handles,
                states: self.states,
                addrs: PerListener {
                    plain: plain_addr,
                    tls: tls_addr,
                },
                grace: self.config.timeouts.shutdown_grace(),
            }),
        };

        Ok(RunHandle {
            control,
            policy: self.config.supervisor.failure_policy,
            exits: exit_rx,
            tasks,
        })
    }
}

async fn run_listener<F>(
    kind: ListenerKind,
    serve: F,
    state: watch::Sender<ListenerState>,
    exits: mpsc::Sender<ListenerExit>,
) where
    F: Future<Output = std::io::Result<()>>,
{
    // A stop issued before the loop started has already moved us past Listening.
    state.send_if_modified(|current| {
        let starting = *current == ListenerState::Listening;
        if starting {
            *current = ListenerState::Serving;
        }
        starting
    });

    let outcome = match serve.await {
        Ok(()) => {
            tracing::info!(listener = %kind, "{kind} responder closed");
            ListenerOutcome::Graceful
        }
        Err(e) => {
            transition(kind, &state, ListenerState::Terminating);
            tracing::error!(listener = %kind, error = %e, "Error listening for {kind}");
            ListenerOutcome::Failed(e.to_string())
        }
    };

    transition(kind, &state, ListenerState::Closed);
    metrics::record_listener_exit(kind.as_str(), outcome.is_graceful());

    if exits.send(ListenerExit { kind, outcome }).await.is_err() {
        tracing::debug!(listener = %kind, "Supervisor no longer waiting for listener exit");
    }
}

struct ControlInner {
    handles: PerListener<Handle>,
    states: PerListener<watch::Sender<ListenerState>>,
    addrs: PerListener<SocketAddr>,
    grace: Duration,
}

/// Clonable control over running listeners.
#[derive(Clone)]
pub struct SupervisorControl {
    inner: Arc<ControlInner>,
}

impl fmt::Debug for SupervisorControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupervisorControl")
            .field("plain", &self.state(ListenerKind::Plain))
            .field("tls", &self.state(ListenerKind::Tls))
            .field("grace", &self.inner.grace)
            .finish()
    }
}

impl SupervisorControl {
    /// Stop accepting on `kind` and let in-flight connections drain.
    pub fn stop(&self, kind: ListenerKind) {
        let stopping = self.inner.states.get(kind).send_if_modified(|state| {
            if matches!(state, ListenerState::Listening | ListenerState::Serving) {
                *state = ListenerState::Terminating;
                true
            } else {
                false
            }
        });

        if stopping {
            tracing::info!(
                listener = %kind,
                grace_secs = self.inner.grace.as_secs(),
                "Stopping listener"
            );
            self.inner.handles.get(kind).graceful_shutdown(Some(self.inner.grace));
        }
    }

    /// Stop both listeners.
    pub fn shutdown_all(&self) {
        for kind in ListenerKind::ALL {
            self.stop(kind);
        }
    }

    pub fn state(&self, kind: ListenerKind) -> ListenerState {
        *self.inner.states.get(kind).borrow()
    }

    /// Watch state changes of one listener.
    pub fn subscribe(&self, kind: ListenerKind) -> watch::Receiver<ListenerState> {
        self.inner.states.get(kind).subscribe()
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self, kind: ListenerKind) -> SocketAddr {
        *self.inner.addrs.get(kind)
    }
}

/// Handle to both running listeners; `wait` is the process join point.
pub struct RunHandle {
    control: SupervisorControl,
    policy: FailurePolicy,
    exits: mpsc::Receiver<ListenerExit>,
    tasks: Vec<(ListenerKind, JoinHandle<()>)>,
}

impl RunHandle {
    pub fn control(&self) -> SupervisorControl {
        self.control.clone()
    }

    /// Wait until both listeners are closed.
    ///
    /// A message on `shutdown` stops both listeners. A closed `shutdown`
    /// channel is not a shutdown request.
    pub async fn wait(mut self, mut shutdown: broadcast::Receiver<()>) -> SupervisorReport {
        let mut exits: Vec<ListenerExit> = Vec::with_capacity(ListenerKind::ALL.len());
        let mut listening_for_shutdown = true;

        while exits.len() < ListenerKind::ALL.len() {
            tokio::select! {
                exit = self.exits.recv() => match exit {
                    Some(exit) => {
                        self.on_exit(&exit);
                        exits.push(exit);
                    }
                    None => break,
                },
                signal = shutdown.recv(), if listening_for_shutdown => {
                    listening_for_shutdown = false;
                    match signal {
                        Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                            tracing::info!("Shutting down all listeners");
                            self.control.shutdown_all();
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            tracing::debug!("Shutdown channel closed");
                        }
                    }
                }
            }
        }

        for (kind, task) in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(listener = %kind, error = %e, "Listener task aborted");
                if !exits.iter().any(|exit| exit.kind == kind) {
                    exits.push(ListenerExit {
                        kind,
                        outcome: ListenerOutcome::Failed(e.to_string()),
                    });
                }
            }
        }

        let report = SupervisorReport { exits };
        tracing::info!(clean = report.is_clean(), "All listeners closed");
        report
    }

    fn on_exit(&self, exit: &ListenerExit) {
        if exit.outcome.is_graceful() {
            return;
        }
        match self.policy {
            FailurePolicy::Isolate => {
                tracing::warn!(listener = %exit.kind, "Listener failed, other listener keeps serving");
            }
            FailurePolicy::Escalate => {
                tracing::error!(listener = %exit.kind, "Listener failed, stopping remaining listeners");
                self.control.shutdown_all();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn local_config() -> ResponderConfig {
        let mut config = ResponderConfig::default();
        config.listener.bind_address = "127.0.0.1".parse().unwrap();
        config.listener.http_port = 0;
        config.listener.https_port = 0;
        config.timeouts.shutdown_grace_secs = 1;
        config
    }

    /// A real plaintext listener next to a TLS accept loop that dies at once.
    fn run_with_failing_tls(policy: FailurePolicy) -> RunHandle {
        let config = local_config();
        let plain = BoundListener::bind(ListenerKind::Plain, config.listener.http_addr()).unwrap();
        let plain_addr = plain.local_addr();

        let states = PerListener {
            plain: watch::channel(ListenerState::Listening).0,
            tls: watch::channel(ListenerState::Listening).0,
        };
        let handles = PerListener {
            plain: Handle::new(),
            tls: Handle::new(),
        };
        let (exit_tx, exit_rx) = mpsc::channel(ListenerKind::ALL.len());

        let plain_server = axum_server::from_tcp(plain.into_std())
            .handle(handles.plain.clone())
            .serve(make_service(build_router(config.timeouts.request())));
        let broken_tls = async { Err(std::io::Error::other("accept loop died")) };

        let tasks = vec![
            (
                ListenerKind::Plain,
                tokio::spawn(run_listener(
                    ListenerKind::Plain,
                    plain_server,
                    states.plain.clone(),
                    exit_tx.clone(),
                )),
            ),
            (
                ListenerKind::Tls,
                tokio::spawn(run_listener(ListenerKind::Tls, broken_tls, states.tls.clone(), exit_tx)),
            ),
        ];

        RunHandle {
            control: SupervisorControl {
                inner: Arc::new(ControlInner {
                    handles,
                    states,
                    addrs: PerListener {
                        plain: plain_addr,
                        tls: plain_addr,
                    },
                    grace: config.timeouts.shutdown_grace(),
                }),
            },
            policy,
            exits: exit_rx,
            tasks,
        }
    }

    #[tokio::test]
    async fn isolated_failure_keeps_other_listener_serving() {
        let run = run_with_failing_tls(FailurePolicy::Isolate);
        let control = run.control();
        let shutdown = crate::lifecycle::Shutdown::new();
        let waiter = tokio::spawn(run.wait(shutdown.subscribe()));

        control
            .subscribe(ListenerKind::Tls)
            .wait_for(|s| *s == ListenerState::Closed)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(control.state(ListenerKind::Plain), ListenerState::Serving);
        assert!(tokio::net::TcpStream::connect(control.local_addr(ListenerKind::Plain))
            .await
            .is_ok());
        assert!(!waiter.is_finished());

        shutdown.trigger();
        let report = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();

        assert!(!report.is_clean());
        assert_eq!(
            report.exit(ListenerKind::Tls).unwrap().outcome,
            ListenerOutcome::Failed("accept loop died".into())
        );
        assert!(report.exit(ListenerKind::Plain).unwrap().outcome.is_graceful());
    }

    #[tokio::test]
    async fn escalated_failure_stops_other_listener() {
        let run = run_with_failing_tls(FailurePolicy::Escalate);
        let control = run.control();
        let shutdown = crate::lifecycle::Shutdown::new();

        // No shutdown is triggered; the failure alone ends the run.
        let report = tokio::time::timeout(Duration::from_secs(5), run.wait(shutdown.subscribe()))
            .await
            .unwrap();

        assert!(!report.is_clean());
        assert_eq!(report.exits.len(), 2);
        assert!(!report.exit(ListenerKind::Tls).unwrap().outcome.is_graceful());
        assert!(report.exit(ListenerKind::Plain).unwrap().outcome.is_graceful());
        for kind in ListenerKind::ALL {
            assert_eq!(control.state(kind), ListenerState::Closed);
        }
    }

    #[tokio::test]
    async fn failed_listener_closes_with_failure() {
        let (state_tx, mut state_rx) = watch::channel(ListenerState::Listening);
        let (exit_tx, mut exit_rx) = mpsc::channel(1);
        let mut seen = Vec::new();

        let task = tokio::spawn(run_listener(
            ListenerKind::Tls,
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Err(std::io::Error::other("accept loop died"))
            },
            state_tx,
            exit_tx,
        ));

        while state_rx.changed().await.is_ok() {
            let state = *state_rx.borrow_and_update();
            seen.push(state);
            if state == ListenerState::Closed {
                break;
            }
        }
        task.await.unwrap();

        assert_eq!(seen.first(), Some(&ListenerState::Serving));
        assert_eq!(seen.last(), Some(&ListenerState::Closed));
        assert!(!exit_rx.recv().await.unwrap().outcome.is_graceful());
    }

    #[test]
    fn report_is_clean_only_when_all_graceful() {
        let graceful = ListenerExit {
            kind: ListenerKind::Plain,
            outcome: ListenerOutcome::Graceful,
        };
        let failed = ListenerExit {
            kind: ListenerKind::Tls,
            outcome: ListenerOutcome::Failed("boom".into()),
        };

        assert!(SupervisorReport { exits: vec![graceful.clone()] }.is_clean());
        let report = SupervisorReport {
            exits: vec![graceful, failed.clone()],
        };
        assert!(!report.is_clean());
        assert_eq!(report.exit(ListenerKind::Tls), Some(&failed));
    }

    #[test]
    fn bad_ca_bundle_fails_before_binding() {
        let mut config = local_config();
        config.tls.client_ca = Some(PathBuf::from("/nonexistent/ca.crt"));

        let err = ListenerSupervisor::new(Arc::new(config)).err().unwrap();
        assert!(matches!(err, StartupError::Trust(TrustError::Read { .. })));
    }

    #[tokio::test]
    async fn listeners_walk_through_states() {
        let supervisor = ListenerSupervisor::new(Arc::new(local_config())).unwrap();
        assert_eq!(supervisor.state(ListenerKind::Plain), ListenerState::Created);
        assert_eq!(supervisor.state(ListenerKind::Tls), ListenerState::Created);

        let run = supervisor.start().unwrap();
        let control = run.control();
        for kind in ListenerKind::ALL {
            let mut states = control.subscribe(kind);
            states.wait_for(|s| *s == ListenerState::Serving).await.unwrap();
            assert_ne!(control.local_addr(kind).port(), 0);
        }

        let shutdown = crate::lifecycle::Shutdown::new();
        let waiter = tokio::spawn(run.wait(shutdown.subscribe()));
        shutdown.trigger();

        let report = waiter.await.unwrap();
        assert!(report.is_clean());
        assert_eq!(report.exits.len(), 2);
        for kind in ListenerKind::ALL {
            assert_eq!(control.state(kind), ListenerState::Closed);
        }
    }
}
