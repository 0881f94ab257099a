//! Sockets to the backend proxy daemon
//!
//! The broker only opens and closes these; relaying protocol traffic over
//! an open socket belongs to the transport layer.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use gatehouse_common::{GatewayError, Result};
use gatehouse_config::ProxyConfig;
use gatehouse_directory::{Connection, DirectoryObject};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::request::ClientInfo;

/// An open duplex channel to the proxy daemon
#[async_trait]
pub trait ProxySocket: Send + Sync {
    fn is_open(&self) -> bool;

    /// Release the channel; closing twice is harmless
    async fn close(&self) -> Result<()>;
}

/// Opens proxy sockets for connections
#[async_trait]
pub trait ProxySocketFactory: Send + Sync {
    /// Open a socket for `connection`
    ///
    /// Fails with `Unavailable` when the proxy cannot be reached.
    async fn open(
        &self,
        connection: &Connection,
        client: &ClientInfo,
    ) -> Result<Box<dyn ProxySocket>>;
}

/// Plain TCP connection to the proxy daemon
pub struct TcpProxySocket {
    stream: Mutex<Option<TcpStream>>,
    peer: Option<SocketAddr>,
    open: AtomicBool,
}

impl TcpProxySocket {
    fn new(stream: TcpStream) -> Self {
        Self {
            peer: stream.peer_addr().ok(),
            stream: Mutex::new(Some(stream)),
            open: AtomicBool::new(true),
        }
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Exclusive access to the underlying stream; `None` once closed
    pub async fn stream(&self) -> MutexGuard<'_, Option<TcpStream>> {
        self.stream.lock().await
    }
}

#[async_trait]
impl ProxySocket for TcpProxySocket {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<()> {
        let Some(mut stream) = self.stream.lock().await.take() else {
            return Ok(());
        };
        self.open.store(false, Ordering::SeqCst);
        if let Err(e) = stream.shutdown().await {
            // The peer may already be gone; the socket is released either way
            debug!(peer = ?self.peer, error = %e, "Proxy socket shutdown failed");
        }
        Ok(())
    }
}

/// Connects to the proxy daemon over TCP within a timeout
#[derive(Debug, Clone)]
pub struct TcpProxySocketFactory {
    address: String,
    connect_timeout: Duration,
}

impl TcpProxySocketFactory {
    pub fn new(address: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            address: address.into(),
            connect_timeout,
        }
    }

    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new(config.address(), config.connect_timeout())
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl ProxySocketFactory for TcpProxySocketFactory {
    async fn open(
        &self,
        connection: &Connection,
        client: &ClientInfo,
    ) -> Result<Box<dyn ProxySocket>> {
        debug!(
            address = %self.address,
            connection = connection.identifier().unwrap_or_default(),
            protocol = %connection.protocol,
            width = client.width,
            height = client.height,
            "Opening proxy socket"
        );

        let connect = TcpStream::connect(&self.address);
        let stream = match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                warn!(address = %self.address, error = %e, "Proxy connection failed");
                return Err(GatewayError::unavailable(format!(
                    "Unable to connect to proxy at {}: {}",
                    self.address, e
                )));
            }
            Err(_) => {
                warn!(
                    address = %self.address,
                    timeout_ms = self.connect_timeout.as_millis() as u64,
                    "Proxy connection timed out"
                );
                return Err(GatewayError::unavailable(format!(
                    "Timed out connecting to proxy at {}",
                    self.address
                )));
            }
        };

        Ok(Box::new(TcpProxySocket::new(stream)))
    }
}
