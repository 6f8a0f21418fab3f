//! Backend reachability probing.
//!
//! # Responsibilities
//! - Resolve a backend target to host and port
//! - Attempt a TCP connection within a deadline
//!
//! # Design Decisions
//! - Best effort: success only means the port accepted a connection
//! - The connection is closed immediately; nothing is sent
//! - Targets without a scheme are treated as `http://`

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use url::Url;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid backend target `{target}`: {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connect to {addr} timed out after {timeout:?}")]
    Timeout { addr: String, timeout: Duration },
}

/// Checks whether a backend target currently accepts connections.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn probe(&self, target: &str) -> Result<(), ProbeError>;
}

/// TCP connect probe.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ReachabilityProbe for TcpProbe {
    async fn probe(&self, target: &str) -> Result<(), ProbeError> {
        let (host, port) = backend_address(target)?;
        let addr = format!("{host}:{port}");

        match tokio::time::timeout(self.timeout, TcpStream::connect((host.as_str(), port))).await {
            Ok(Ok(stream)) => {
                drop(stream);
                Ok(())
            }
            Ok(Err(source)) => Err(ProbeError::Connect { addr, source }),
            Err(_) => Err(ProbeError::Timeout {
                addr,
                timeout: self.timeout,
            }),
        }
    }
}

/// Host and port for a backend target; 443 for `https`, 80 otherwise.
pub fn backend_address(target: &str) -> Result<(String, u16), ProbeError> {
    let invalid = |reason: String| ProbeError::InvalidTarget {
        target: target.to_string(),
        reason,
    };

    let url = if target.contains("://") {
        Url::parse(target)
    } else {
        Url::parse(&format!("http://{target}"))
    }
    .map_err(|e| invalid(e.to_string()))?;

    let host = url
        .host_str()
        .ok_or_else(|| invalid("missing host".to_string()))?
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string();

    let default_port = if url.scheme() == "https" { 443 } else { 80 };
    Ok((host, url.port().unwrap_or(default_port)))
}
