//! Echo endpoints.
//!
//! - `/healthz`: fixed liveness body
//! - `/headers`: every received header plus the effective host
//! - anything else: one line describing the request and who sent it

use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, Method, Request, Uri};

pub const HEALTHY_BODY: &str = "ok\n";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

pub async fn healthz() -> &'static str {
    HEALTHY_BODY
}

pub async fn echo(ConnectInfo(peer): ConnectInfo<SocketAddr>, request: Request<Body>) -> String {
    let host = effective_host(request.headers(), request.uri());
    let forwarded = request
        .headers()
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok());

    format_echo(request.method(), request.uri(), &host, forwarded, peer)
}

pub async fn header_dump(request: Request<Body>) -> String {
    let host = effective_host(request.headers(), request.uri());
    format_headers(request.headers(), &host)
}

/// Host the client addressed: the Host header, else the URI authority
/// (HTTP/2 requests carry it there), else empty.
pub fn effective_host(headers: &HeaderMap, uri: &Uri) -> String {
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|a| a.to_string()))
        .unwrap_or_default()
}

pub fn format_echo(method: &Method, uri: &Uri, host: &str, forwarded: Option<&str>, peer: SocketAddr) -> String {
    let target = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    match forwarded.filter(|f| !f.is_empty()) {
        Some(origin) => format!("Got {method} {target} request for {host} from {origin}, forwarded by {peer}!\n"),
        None => format!("Got {method} {target} request for {host} from {peer}\n"),
    }
}

/// One `Name: [v1 v2]` line per header, sorted, with Host reported last.
pub fn format_headers(headers: &HeaderMap, host: &str) -> String {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        if *name == header::HOST {
            continue;
        }
        grouped
            .entry(canonical_header_name(name.as_str()))
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }

    let mut out = String::new();
    for (name, values) in grouped {
        out.push_str(&format!("{name}: [{}]\n", values.join(" ")));
    }
    out.push_str(&format!("Host: [{host}]\n"));
    out
}

/// `x-forwarded-for` → `X-Forwarded-For`.
pub fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}
