//! Shared fixtures for integration tests: a throwaway PKI and TLS client helpers.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, ServerName};
use rustls::{ClientConfig, RootCertStore};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use tls_echo_responder::config::CertPairPaths;
use tls_echo_responder::lifecycle::{SupervisorControl, SupervisorReport};
use tls_echo_responder::net::ListenerKind;
use tls_echo_responder::{ListenerSupervisor, ResponderConfig, Shutdown};

pub struct Issued {
    pub cert: Certificate,
    pub key: KeyPair,
}

impl Issued {
    pub fn der(&self) -> CertificateDer<'static> {
        self.cert.der().clone()
    }

    pub fn private_key(&self) -> PrivateKeyDer<'static> {
        PrivatePkcs8KeyDer::from(self.key.serialize_der()).into()
    }
}

/// A CA plus default, SNI and client certificates, written under a temp dir.
pub struct Pki {
    pub dir: TempDir,
    pub ca: Issued,
    pub default_leaf: Issued,
    pub sni_leaf: Issued,
    pub client: Issued,
    pub default_pair: CertPairPaths,
    pub sni_pair: CertPairPaths,
    pub ca_path: PathBuf,
}

fn issue(common_name: &str, purpose: ExtendedKeyUsagePurpose, ca: &Issued) -> Issued {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(vec!["localhost".to_string()]).unwrap();
    params.distinguished_name.push(DnType::CommonName, common_name);
    params.extended_key_usages = vec![purpose];
    let cert = params.signed_by(&key, &ca.cert, &ca.key).unwrap();
    Issued { cert, key }
}

pub fn new_ca(common_name: &str) -> Issued {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
    params.distinguished_name.push(DnType::CommonName, common_name);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let cert = params.self_signed(&key).unwrap();
    Issued { cert, key }
}

pub fn issue_server(common_name: &str, ca: &Issued) -> Issued {
    issue(common_name, ExtendedKeyUsagePurpose::ServerAuth, ca)
}

pub fn issue_client(common_name: &str, ca: &Issued) -> Issued {
    issue(common_name, ExtendedKeyUsagePurpose::ClientAuth, ca)
}

fn write_pair(dir: &Path, name: &str, issued: &Issued) -> CertPairPaths {
    let paths = CertPairPaths::new(dir.join(format!("{name}.crt")), dir.join(format!("{name}.key")));
    std::fs::write(&paths.cert, issued.cert.pem()).unwrap();
    std::fs::write(&paths.key, issued.key.serialize_pem()).unwrap();
    paths
}

impl Pki {
    pub fn generate() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let ca = new_ca("Responder Test CA");
        let default_leaf = issue_server("default.responder.test", &ca);
        let sni_leaf = issue_server("sni.responder.test", &ca);
        let client = issue_client("client.responder.test", &ca);

        let default_pair = write_pair(dir.path(), "default", &default_leaf);
        let sni_pair = write_pair(dir.path(), "sni", &sni_leaf);
        let ca_path = dir.path().join("ca.crt");
        std::fs::write(&ca_path, ca.cert.pem()).unwrap();

        Self {
            dir,
            ca,
            default_leaf,
            sni_leaf,
            client,
            default_pair,
            sni_pair,
            ca_path,
        }
    }

    /// Loopback config on ephemeral ports using this PKI, mTLS off.
    pub fn config(&self) -> ResponderConfig {
        let mut config = ResponderConfig::default();
        config.listener.bind_address = "127.0.0.1".parse().unwrap();
        config.listener.http_port = 0;
        config.listener.https_port = 0;
        config.tls.default_pair = self.default_pair.clone();
        config.tls.sni_pair = self.sni_pair.clone();
        config.timeouts.handshake_secs = 5;
        config.timeouts.shutdown_grace_secs = 1;
        config
    }

    fn roots(&self) -> RootCertStore {
        let mut roots = RootCertStore::empty();
        roots.add(self.ca.der()).unwrap();
        roots
    }

    /// Client trusting this PKI's CA, optionally presenting `identity`.
    pub fn client_config(&self, sni: bool, identity: Option<&Issued>) -> Arc<ClientConfig> {
        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        let builder = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_root_certificates(self.roots());

        let mut config = match identity {
            Some(issued) => builder
                .with_client_auth_cert(vec![issued.der()], issued.private_key())
                .unwrap(),
            None => builder.with_no_client_auth(),
        };
        config.enable_sni = sni;
        Arc::new(config)
    }
}

/// Complete a TLS handshake against `addr`.
pub async fn connect_tls(
    addr: SocketAddr,
    config: Arc<ClientConfig>,
    server_name: &str,
) -> std::io::Result<TlsStream<TcpStream>> {
    let tcp = TcpStream::connect(addr).await?;
    let name = ServerName::try_from(server_name.to_string())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    tokio::time::timeout(Duration::from_secs(5), TlsConnector::from(config).connect(name, tcp))
        .await
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "handshake timed out"))?
}

/// Leaf certificate the server presented.
pub fn presented_leaf(stream: &TlsStream<TcpStream>) -> CertificateDer<'static> {
    let (_, connection) = stream.get_ref();
    connection.peer_certificates().unwrap()[0].clone().into_owned()
}

/// Send a bare HTTP/1.1 GET over TLS and return the raw response.
///
/// A rejected client certificate surfaces here under TLS 1.3, where the
/// client finishes its side of the handshake before the server decides.
pub async fn get_over_tls(
    addr: SocketAddr,
    config: Arc<ClientConfig>,
    server_name: &str,
    path: &str,
) -> std::io::Result<String> {
    let mut stream = connect_tls(addr, config, server_name).await?;
    let request = format!("GET {path} HTTP/1.1\r\nHost: {server_name}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await?;

    let mut buf = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(5), async {
        let mut chunk = [0u8; 4096];
        loop {
            match stream.read(&mut chunk).await {
                Ok(0) => return Ok(()),
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                // Servers may close without close_notify after a complete response.
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof && !buf.is_empty() => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    })
    .await
    .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "read timed out"))?;
    read?;

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// A responder running in the background on ephemeral ports.
pub struct Running {
    pub control: SupervisorControl,
    pub shutdown: Shutdown,
    pub report: tokio::task::JoinHandle<SupervisorReport>,
}

impl Running {
    pub fn addr(&self, kind: ListenerKind) -> SocketAddr {
        self.control.local_addr(kind)
    }

    pub async fn stop(self) -> SupervisorReport {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(10), self.report)
            .await
            .expect("listeners did not close")
            .unwrap()
    }
}

pub async fn start(config: ResponderConfig) -> Running {
    let supervisor = ListenerSupervisor::new(Arc::new(config)).unwrap();
    let shutdown = Shutdown::new();
    let run = supervisor.start().unwrap();
    let control = run.control();
    let report = tokio::spawn(run.wait(shutdown.subscribe()));

    for kind in ListenerKind::ALL {
        wait_for_port(control.local_addr(kind)).await;
    }

    Running {
        control,
        shutdown,
        report,
    }
}

/// Wait until `addr` accepts TCP connections.
pub async fn wait_for_port(addr: SocketAddr) {
    for _ in 0..50 {
        if TcpStream::connect(addr).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("{addr} never accepted connections");
}
