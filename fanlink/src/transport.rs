//! Datagram transport to the appliance.
//!
//! A transport performs exactly one best-effort send per call. It never
//! retries and never waits for a reply; success only means the datagram was
//! handed to the local network stack. Retrying is layered on top by
//! [`crate::retry`].

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::{
    fmt,
    io,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    sync::Arc,
    time::Duration,
};
use thiserror::Error;
use tokio::{net::UdpSocket, time};

use crate::{
    tracing::prelude::*,
    validation::{self, ValidationError},
};

/// The fixed address of the controlled appliance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    address: Ipv4Addr,
    port: u16,
}

impl Endpoint {
    /// Build an endpoint from raw configuration values.
    pub fn new(address: &str, port: i64) -> Result<Self, ValidationError> {
        Ok(Self {
            address: validation::validate_ip(address)?,
            port: validation::validate_port(port)?,
        })
    }

    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.address, self.port))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Failure of a single send attempt.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("send timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("send failed: {0}")]
    SendFailed(#[source] io::Error),
    #[error("send failed: transport is closed")]
    Closed,
}

impl NetworkError {
    /// Whether a later attempt could succeed. A closed transport stays
    /// closed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, NetworkError::Closed)
    }
}

/// One-shot datagram sender.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `payload` to `endpoint` as a single datagram, giving up after
    /// `timeout`.
    async fn send(
        &self,
        payload: &[u8],
        endpoint: &Endpoint,
        timeout: Duration,
    ) -> Result<(), NetworkError>;

    /// Release the underlying socket. Safe to call more than once.
    fn shutdown(&self);
}

/// UDP implementation of [`Transport`].
///
/// Owns a single socket for the lifetime of the process. Sends clone the
/// socket handle out of the slot so no lock is held across an await, and
/// [`Transport::shutdown`] empties the slot exactly once.
pub struct UdpTransport {
    socket: Mutex<Option<Arc<UdpSocket>>>,
}

impl UdpTransport {
    /// Bind an ephemeral local socket for outbound datagrams.
    pub async fn open() -> io::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        debug!(local = %socket.local_addr()?, "UDP transport opened");
        Ok(Self {
            socket: Mutex::new(Some(Arc::new(socket))),
        })
    }

    /// Whether the socket is still open.
    pub fn is_open(&self) -> bool {
        self.socket.lock().is_some()
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send(
        &self,
        payload: &[u8],
        endpoint: &Endpoint,
        timeout: Duration,
    ) -> Result<(), NetworkError> {
        let socket = self.socket.lock().clone().ok_or(NetworkError::Closed)?;

        match time::timeout(timeout, socket.send_to(payload, endpoint.socket_addr())).await {
            Ok(Ok(sent)) => {
                trace!(%endpoint, bytes = sent, "Datagram sent");
                Ok(())
            }
            Ok(Err(e)) => Err(NetworkError::SendFailed(e)),
            Err(_) => Err(NetworkError::Timeout(timeout)),
        }
    }

    fn shutdown(&self) {
        if self.socket.lock().take().is_some() {
            debug!("UDP transport closed");
        }
    }
}
