//! TCP listener binding.
//!
//! # Responsibilities
//! - Bind the plaintext and TLS sockets before any serving starts
//! - Report the actual local address (ports may be ephemeral)
//! - Hand the sockets to axum-server in non-blocking mode

use std::fmt;
use std::net::{SocketAddr, TcpListener};

/// The two listeners the responder runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    /// Plaintext HTTP.
    Plain,
    /// TLS-terminated HTTP.
    Tls,
}

impl ListenerKind {
    pub const ALL: [ListenerKind; 2] = [ListenerKind::Plain, ListenerKind::Tls];

    pub fn as_str(&self) -> &'static str {
        match self {
            ListenerKind::Plain => "http",
            ListenerKind::Tls => "https",
        }
    }
}

impl fmt::Display for ListenerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("failed to bind {kind} listener on {addr}: {source}")]
    Bind {
        kind: ListenerKind,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// A bound socket that is not yet accepting.
#[derive(Debug)]
pub struct BoundListener {
    kind: ListenerKind,
    local_addr: SocketAddr,
    inner: TcpListener,
}

impl BoundListener {
    /// Bind `addr` for `kind`.
    pub fn bind(kind: ListenerKind, addr: SocketAddr) -> Result<Self, ListenerError> {
        let bind_err = |source| ListenerError::Bind { kind, addr, source };

        let inner = TcpListener::bind(addr).map_err(bind_err)?;
        inner.set_nonblocking(true).map_err(bind_err)?;
        let local_addr = inner.local_addr().map_err(bind_err)?;

        tracing::info!(
            listener = %kind,
            address = %local_addr,
            "Listener bound"
        );

        Ok(Self {
            kind,
            local_addr,
            inner,
        })
    }

    pub fn kind(&self) -> ListenerKind {
        self.kind
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn into_std(self) -> TcpListener {
        self.inner
    }
}
