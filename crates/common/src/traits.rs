//! Collaborator traits for the scan core
//!
//! Each component talks to its neighbours through one of these seams so the
//! orchestrator can be driven by stubs and the socket-level code by scripted
//! transports.

use crate::error::SupernovaResult;
use async_trait::async_trait;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

/// Opens byte streams to remote ports.
///
/// Callers bound `connect` with their own timeout.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    async fn connect(&self, addr: SocketAddr) -> io::Result<Self::Stream>;
}

/// Finds the open ports of one host.
#[async_trait]
pub trait PortScanner: Send + Sync {
    /// Ascending, duplicate-free list of open ports. Fails only with
    /// `SupernovaError::Cancelled`.
    async fn scan_ports(
        &self,
        ip: IpAddr,
        ports: &[u16],
        cancel: &CancellationToken,
    ) -> SupernovaResult<Vec<u16>>;

    /// Scanner name/identifier
    fn name(&self) -> &str;
}

/// Obtains identifying text from an open port.
///
/// Both methods return an empty string when nothing could be read.
#[async_trait]
pub trait BannerSource: Send + Sync {
    /// Full passive-then-active exchange over one connection.
    async fn grab(&self, ip: IpAddr, port: u16) -> String;

    /// A single active probe round over a fresh connection.
    async fn reprobe(&self, ip: IpAddr, port: u16) -> String;
}

/// Host liveness check. Errors of any kind read as `false`.
#[async_trait]
pub trait HostProbe: Send + Sync {
    async fn is_host_up(&self, ip: IpAddr, timeout: Duration) -> bool;
}
