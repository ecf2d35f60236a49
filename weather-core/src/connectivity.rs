//! Network availability checks made before any weather request.

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;

#[async_trait]
pub trait Connectivity: Send + Sync {
    async fn is_network_available(&self) -> bool;
}

/// Considers the network up when a TCP connection to the API host succeeds.
#[derive(Debug, Clone)]
pub struct TcpConnectivity {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpConnectivity {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port, timeout: Self::DEFAULT_TIMEOUT }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Connectivity for TcpConnectivity {
    async fn is_network_available(&self) -> bool {
        let addr = (self.host.as_str(), self.port);
        match tokio::time::timeout(self.timeout, TcpStream::connect(addr)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::debug!(host = %self.host, port = self.port, error = %e, "connectivity check failed");
                false
            }
            Err(_) => {
                tracing::debug!(host = %self.host, port = self.port, "connectivity check timed out");
                false
            }
        }
    }
}

/// Always reports the network as up.
#[derive(Debug, Clone, Copy, Default)]
pub struct Online;

#[async_trait]
impl Connectivity for Online {
    async fn is_network_available(&self) -> bool {
        true
    }
}

/// Always reports the network as down.
#[derive(Debug, Clone, Copy, Default)]
pub struct Offline;

#[async_trait]
impl Connectivity for Offline {
    async fn is_network_available(&self) -> bool {
        false
    }
}
