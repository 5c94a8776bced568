// crates/scanner_tcp/src/scanner.rs
//! TCP connect scanner implementation

use async_trait::async_trait;
use std::collections::{BTreeSet, VecDeque};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

use supernova_common::{Connector, PortScanner, SupernovaError, SupernovaResult};

/// Plain TCP sockets.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, addr: SocketAddr) -> io::Result<TcpStream> {
        TcpStream::connect(addr).await
    }
}

/// TCP connect scanner with a fixed-width worker pool.
pub struct TcpScanner<C: Connector = TcpConnector> {
    connector: Arc<C>,
    timeout: Duration,
    concurrency: usize,
}

impl TcpScanner {
    /// Create a new scanner with default settings.
    pub fn new() -> Self {
        Self::with_connector(TcpConnector)
    }
}

impl Default for TcpScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connector> TcpScanner<C> {
    /// Scanner over a custom transport.
    pub fn with_connector(connector: C) -> Self {
        Self {
            connector: Arc::new(connector),
            timeout: Duration::from_secs(1),
            concurrency: 50,
        }
    }

    /// Set the per-attempt connect timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum number of attempts in flight.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }
}

/// One timed connect attempt. Refused, unreachable and timed out all read as
/// not open.
async fn probe<C: Connector>(connector: &C, addr: SocketAddr, limit: Duration) -> bool {
    match timeout(limit, connector.connect(addr)).await {
        Ok(Ok(stream)) => {
            drop(stream);
            trace!("{} open", addr);
            true
        }
        Ok(Err(e)) => {
            trace!("{} not open: {}", addr, e);
            false
        }
        Err(_) => {
            trace!("{} not open: connect timeout", addr);
            false
        }
    }
}

#[async_trait]
impl<C: Connector> PortScanner for TcpScanner<C> {
    #[instrument(skip(self, ports, cancel), fields(ports = ports.len()))]
    async fn scan_ports(
        &self,
        ip: IpAddr,
        ports: &[u16],
        cancel: &CancellationToken,
    ) -> SupernovaResult<Vec<u16>> {
        if cancel.is_cancelled() {
            return Err(SupernovaError::Cancelled);
        }

        // Duplicates are redundant; each port is attempted once.
        let unique: BTreeSet<u16> = ports.iter().copied().filter(|&p| p != 0).collect();
        if unique.is_empty() {
            return Ok(Vec::new());
        }

        let worker_count = self.concurrency.min(unique.len());
        let queue = Arc::new(Mutex::new(unique.into_iter().collect::<VecDeque<u16>>()));
        let (tx, mut rx) = mpsc::unbounded_channel::<u16>();

        debug!("Scanning {} with {} workers", ip, worker_count);

        // Shared queue pattern: every worker pops the next port until the
        // queue is drained, so at most `worker_count` attempts are in flight.
        let mut workers = JoinSet::new();
        for _ in 0..worker_count {
            let queue = queue.clone();
            let tx = tx.clone();
            let connector = self.connector.clone();
            let cancel = cancel.clone();
            let limit = self.timeout;

            workers.spawn(async move {
                loop {
                    if cancel.is_cancelled() {
                        break;
                    }

                    let next = {
                        let mut q = queue.lock().await;
                        q.pop_front()
                    };
                    let Some(port) = next else {
                        break; // queue empty, exit worker
                    };

                    let addr = SocketAddr::new(ip, port);
                    let open = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        open = probe(connector.as_ref(), addr, limit) => open,
                    };

                    if open && tx.send(port).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!("Port worker for {} ended abnormally: {}", ip, e);
            }
        }

        if cancel.is_cancelled() {
            return Err(SupernovaError::Cancelled);
        }

        let mut open = Vec::new();
        while let Some(port) = rx.recv().await {
            open.push(port);
        }
        open.sort_unstable();
        open.dedup();

        debug!("{} open port(s) on {}", open.len(), ip);
        Ok(open)
    }

    fn name(&self) -> &str {
        "TCP Connect Scanner"
    }
}
