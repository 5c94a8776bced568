//! Orchestrator - sequences discovery, port scanning and fingerprinting
//!
//! `run_scan` is the plain entry point: validated IP strings, a port list and
//! a timeout in seconds in, a complete `ScanReport` out.

mod orchestrator;
mod progress;

pub use orchestrator::Orchestrator;
pub use progress::{ProgressSnapshot, ProgressTracker};

use tokio_util::sync::CancellationToken;

use supernova_common::{ScanOptions, ScanReport, ScanRequest, SupernovaResult};
use supernova_target_resolver::TargetResolver;

/// Scan `target_ips` on `ports` with default options and the given
/// per-operation timeout.
pub async fn run_scan<S: AsRef<str>>(
    target_ips: &[S],
    scope_label: &str,
    ports: &[u16],
    timeout_secs: f64,
) -> SupernovaResult<ScanReport> {
    run_scan_with_cancel(target_ips, scope_label, ports, timeout_secs, &CancellationToken::new())
        .await
}

/// Same as [`run_scan`], interruptible through `cancel`.
pub async fn run_scan_with_cancel<S: AsRef<str>>(
    target_ips: &[S],
    scope_label: &str,
    ports: &[u16],
    timeout_secs: f64,
    cancel: &CancellationToken,
) -> SupernovaResult<ScanReport> {
    let targets = TargetResolver::parse_ip_list(target_ips)?;
    let options = ScanOptions::default().with_timeout(ScanOptions::timeout_from_secs(timeout_secs)?);
    let request = ScanRequest::new(targets, ports.to_vec(), scope_label)?.with_options(options)?;

    Orchestrator::for_options(request.options())
        .run(&request, cancel)
        .await
}
