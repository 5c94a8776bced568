// runner.rs
use anyhow::{Context, Result};
use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use supernova_common::{ScanOptions, ScanReport, ScanRequest, SupernovaError};
use supernova_orchestrator::Orchestrator;
use supernova_target_resolver::TargetResolver;

use crate::args::Cli;
use crate::output::print_report;
use crate::ports::parse_port_spec;

/// Conventional status for a run stopped by SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

pub async fn run(cli: Cli) -> Result<ExitCode> {
    let request = build_request(&cli)?;

    info!("Targets: {} ({} host(s))", request.scope(), request.targets().len());
    info!("Ports: {} port(s)", request.ports().len());
    info!(
        "Timeout: {:?}, concurrency: {}, reprobe: {}",
        request.options().timeout,
        request.options().concurrency,
        request.options().reprobe_silent
    );

    let cancel = CancellationToken::new();
    let interrupt = watch_for_interrupt(cancel.clone());

    let scan_start = Instant::now();
    let outcome = Orchestrator::for_options(request.options())
        .run(&request, &cancel)
        .await;
    let scan_duration = scan_start.elapsed();
    interrupt.abort();

    match outcome {
        Ok(report) => {
            print_report(&report, cli.format, scan_duration)?;
            if let Some(path) = cli.output.as_deref() {
                save_report(&report, path).await?;
                info!("Report saved to {}", path.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(SupernovaError::Cancelled) => {
            eprintln!("\n[!] Scan interrupted by user. No report written.");
            Ok(ExitCode::from(EXIT_INTERRUPTED))
        }
        Err(e) => Err(e.into()),
    }
}

/// Resolve targets and ports and apply the tuning flags.
fn build_request(cli: &Cli) -> Result<ScanRequest> {
    let targets = TargetResolver::resolve_targets(&cli.target)?;
    let ports = parse_port_spec(cli.ports.as_deref())?;
    let mut options = cli.preset.options();
    if let Some(secs) = cli.speed {
        options = options.with_timeout(ScanOptions::timeout_from_secs(secs)?);
    }
    if let Some(concurrency) = cli.concurrency {
        options = options.with_concurrency(concurrency);
    }
    if cli.reprobe {
        options = options.with_reprobe(true);
    }

    let request = ScanRequest::new(targets, ports, cli.target.trim())?
        .with_options(options)?
        .with_team(cli.team.clone());
    Ok(request)
}

fn watch_for_interrupt(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, stopping scan");
                cancel.cancel();
            }
            Err(e) => warn!("Unable to listen for Ctrl-C: {}", e),
        }
    })
}

async fn save_report(report: &ScanReport, path: &Path) -> Result<()> {
    let json = report.to_json_pretty().context("Failed to serialize report")?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;
    use supernova_common::{HostResult, PortResult, ScanMetadata, ServiceMatch};

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["supernova"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_build_request_from_flags() {
        let req = build_request(&cli(&[
            "-t", "192.168.1.1-192.168.1.3", "-p", "80,22", "-s", "0.25", "-c", "7", "--team",
            "BLUE", "--reprobe",
        ]))
        .unwrap();

        assert_eq!(req.targets().len(), 3);
        assert_eq!(req.ports(), &[22, 80]);
        assert_eq!(req.scope(), "192.168.1.1-192.168.1.3");
        assert_eq!(req.team(), "BLUE");
        assert_eq!(req.options().timeout, Duration::from_millis(250));
        assert_eq!(req.options().concurrency, 7);
        assert!(req.options().reprobe_silent);
    }

    #[test]
    fn test_build_request_applies_preset_then_overrides() {
        let fast = build_request(&cli(&["-t", "10.0.0.1", "--preset", "fast"])).unwrap();
        assert_eq!(fast.options(), &ScanOptions::fast());

        let tuned =
            build_request(&cli(&["-t", "10.0.0.1", "--preset", "thorough", "-s", "2", "-c", "9"]))
                .unwrap();
        assert_eq!(tuned.options().timeout, Duration::from_secs(2));
        assert_eq!(tuned.options().concurrency, 9);
        assert_eq!(tuned.options().settle_delay, ScanOptions::thorough().settle_delay);
        assert!(tuned.options().reprobe_silent);

        let plain = build_request(&cli(&["-t", "10.0.0.1"])).unwrap();
        assert_eq!(plain.options(), &ScanOptions::default());
    }

    #[test]
    fn test_build_request_defaults_to_common_ports() {
        let req = build_request(&cli(&["-t", "10.0.0.1"])).unwrap();
        assert_eq!(req.ports().len(), 15);
        assert_eq!(req.targets(), &[IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))]);
    }

    #[test]
    fn test_build_request_rejects_bad_input() {
        let bad_target = build_request(&cli(&["-t", "not-an-ip"])).unwrap_err();
        assert!(matches!(
            bad_target.downcast_ref::<SupernovaError>(),
            Some(SupernovaError::InvalidTarget(_))
        ));

        let bad_ports = build_request(&cli(&["-t", "10.0.0.1", "-p", "0"])).unwrap_err();
        assert!(matches!(
            bad_ports.downcast_ref::<SupernovaError>(),
            Some(SupernovaError::InvalidPortSpec(_))
        ));

        assert!(build_request(&cli(&["-t", "10.0.0.1", "-s", "0"])).is_err());
        assert!(build_request(&cli(&["-t", "10.0.0.1", "-c", "0"])).is_err());
    }

    #[tokio::test]
    async fn test_save_report_round_trip() {
        let meta = ScanMetadata {
            team: "SUPERNOVA".into(),
            scope: "10.0.0.1".into(),
            time: "2026-10-18 09:30:00".into(),
            user: "analyst".into(),
        };
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let mut host = HostResult::up(ip);
        host.insert_port(PortResult::new(21, ServiceMatch::new("FTP").with_version("vsFTPd 3.0.3")));
        let mut report = ScanReport::new(meta);
        report.push_host(host);

        let path = std::env::temp_dir().join(format!("supernova-report-{}.json", std::process::id()));
        save_report(&report, &path).await.unwrap();

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        let _ = tokio::fs::remove_file(&path).await;

        let decoded = ScanReport::from_json(&text).unwrap();
        let port = &decoded.host(&ip).unwrap().ports()[0];
        assert_eq!(port.port, 21);
        assert_eq!(port.service, "FTP");
        assert_eq!(port.version, "vsFTPd 3.0.3");
        assert_eq!(decoded.metadata, report.metadata);
    }

    #[tokio::test]
    async fn test_save_report_bad_path() {
        let report = ScanReport::new(ScanMetadata::capture("SUPERNOVA", "x"));
        let path = Path::new("/nonexistent-dir/supernova/report.json");
        assert!(save_report(&report, path).await.is_err());
    }
}
