// src/core/scanner/port_scanner.rs

use crate::core::models::PortFinding;
use crate::core::services::CANDIDATE_PORTS;
use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tokio::time;
use tracing::{debug, info, warn};

/// Reports which of its candidate ports accept a TCP connection.
#[async_trait]
pub trait PortProbe: Send + Sync {
    /// Open ports only, in ascending port order.
    async fn probe(&self, host: IpAddr) -> Vec<PortFinding>;
}

/// Connects to every candidate port concurrently, each attempt bounded by `timeout`.
pub struct PortProber {
    ports: Vec<u16>,
    timeout: Duration,
}

impl PortProber {
    pub fn new(timeout: Duration) -> Self {
        Self::with_ports(CANDIDATE_PORTS.to_vec(), timeout)
    }

    pub fn with_ports(ports: Vec<u16>, timeout: Duration) -> Self {
        Self { ports, timeout }
    }
}

#[async_trait]
impl PortProbe for PortProber {
    async fn probe(&self, host: IpAddr) -> Vec<PortFinding> {
        info!(%host, ports = self.ports.len(), "Starting port probe.");
        let mut set = JoinSet::new();
        for &port in &self.ports {
            let timeout = self.timeout;
            set.spawn(async move {
                let addr = SocketAddr::new(host, port);
                match time::timeout(timeout, TcpStream::connect(addr)).await {
                    // The connection is dropped straight away; banners are read separately.
                    Ok(Ok(_stream)) => Some(port),
                    // Closed, filtered, or timed out. Nothing is recorded.
                    _ => None,
                }
            });
        }

        let mut open = Vec::new();
        while let Some(res) = set.join_next().await {
            match res {
                Ok(Some(port)) => {
                    debug!(%host, port, "Port is open.");
                    open.push(port);
                }
                Ok(None) => {}
                Err(e) => warn!(%host, error = %e, "Port probe task failed."),
            }
        }
        open.sort_unstable();

        info!(%host, open = open.len(), "Port probe finished.");
        open.into_iter().map(|port| PortFinding::open(host, port)).collect()
    }
}
