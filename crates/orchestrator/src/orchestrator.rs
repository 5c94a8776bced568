// crates/orchestrator/src/orchestrator.rs
//! Orchestrator - drives discovery, port scanning and fingerprinting host by host

use std::net::IpAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use supernova_common::{
    BannerSource, HostProbe, HostResult, PortResult, PortScanner, ScanMetadata, ScanOptions,
    ScanReport, ScanRequest, ServiceMatch, SupernovaError, SupernovaResult,
};
use supernova_discovery::PingProbe;
use supernova_fingerprint::FingerprintEngine;
use supernova_scanner_tcp::{BannerGrabber, TcpScanner};

use crate::progress::ProgressTracker;

/// Runs one scan request end to end.
///
/// Hosts are processed strictly one after another in request order; the
/// only parallel region is the port scan inside a single host.
pub struct Orchestrator {
    discovery: Arc<dyn HostProbe>,
    scanner: Arc<dyn PortScanner>,
    banners: Arc<dyn BannerSource>,
    fingerprint: FingerprintEngine,
    progress: Arc<ProgressTracker>,
}

impl Orchestrator {
    /// Assemble an orchestrator from explicit components.
    pub fn new(
        discovery: Arc<dyn HostProbe>,
        scanner: Arc<dyn PortScanner>,
        banners: Arc<dyn BannerSource>,
        fingerprint: FingerprintEngine,
    ) -> Self {
        Self {
            discovery,
            scanner,
            banners,
            fingerprint,
            progress: Arc::new(ProgressTracker::new()),
        }
    }

    /// Production components configured from scan options.
    pub fn for_options(options: &ScanOptions) -> Self {
        let scanner = TcpScanner::new()
            .with_timeout(options.timeout)
            .with_concurrency(options.concurrency);
        let banners = BannerGrabber::new(options.timeout).with_settle_delay(options.settle_delay);
        let fingerprint = FingerprintEngine::new().with_reprobe(options.reprobe_silent);

        Self::new(
            Arc::new(PingProbe::new()),
            Arc::new(scanner),
            Arc::new(banners),
            fingerprint,
        )
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    /// Scan every target of `request` and return the finished report.
    ///
    /// Fails only on cancellation; no partial report is returned then.
    #[instrument(skip_all, fields(hosts = request.targets().len(), ports = request.ports().len()))]
    pub async fn run(
        &self,
        request: &ScanRequest,
        cancel: &CancellationToken,
    ) -> SupernovaResult<ScanReport> {
        let mut report = ScanReport::new(ScanMetadata::capture(request.team(), request.scope()));
        self.progress.set_total(request.targets().len()).await;

        info!(
            "Starting scan of {} (Total Hosts: {}) using {}",
            request.scope(),
            request.targets().len(),
            self.scanner.name()
        );

        for &ip in request.targets() {
            ensure_active(cancel)?;
            let host = self.scan_host(ip, request, cancel).await?;
            self.progress.record_host(&host).await;
            report.push_host(host);
        }

        self.progress.print_summary().await;
        Ok(report)
    }

    async fn scan_host(
        &self,
        ip: IpAddr,
        request: &ScanRequest,
        cancel: &CancellationToken,
    ) -> SupernovaResult<HostResult> {
        debug!("[{}] Checking if host is up", ip);
        let up = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SupernovaError::Cancelled),
            up = self.discovery.is_host_up(ip, request.options().timeout) => up,
        };
        if !up {
            info!("Host {} is down", ip);
            return Ok(HostResult::down(ip));
        }

        debug!("[{}] Scanning {} port(s)", ip, request.ports().len());
        let open = match self.scanner.scan_ports(ip, request.ports(), cancel).await {
            Ok(open) => open,
            Err(SupernovaError::Cancelled) => return Err(SupernovaError::Cancelled),
            Err(e) => {
                warn!("Port scan of {} failed: {}", ip, e);
                Vec::new()
            }
        };

        let mut host = HostResult::up(ip);
        if open.is_empty() {
            info!("Host {} is up, no open ports found", ip);
            return Ok(host);
        }
        info!("Host {} is up, {} open port(s): {:?}", ip, open.len(), open);

        for port in open {
            ensure_active(cancel)?;
            let service = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SupernovaError::Cancelled),
                service = self.identify(ip, port) => service,
            };
            debug!(
                "{}:{} -> {} {} ({})",
                ip, port, service.service, service.version, service.confidence
            );
            host.insert_port(PortResult::new(port, service));
        }

        Ok(host)
    }

    async fn identify(&self, ip: IpAddr, port: u16) -> ServiceMatch {
        let banner = self.banners.grab(ip, port).await;
        self.fingerprint
            .identify(&banner, ip, port, self.banners.as_ref())
            .await
    }
}

fn ensure_active(cancel: &CancellationToken) -> SupernovaResult<()> {
    if cancel.is_cancelled() {
        Err(SupernovaError::Cancelled)
    } else {
        Ok(())
    }
}
