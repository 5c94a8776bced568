//! Output formatting for scan reports

use anyhow::Result;
use std::fmt;
use std::time::Duration;

use supernova_common::{HostResult, ScanReport};

use crate::args::OutputFormat;

const RULE_WIDE: usize = 65;
const RULE_TABLE: usize = 55;

/// Print a finished report in the requested format
pub fn print_report(report: &ScanReport, format: OutputFormat, scan_duration: Duration) -> Result<()> {
    match format {
        OutputFormat::Text => print!("{}", TextReport::new(report, scan_duration)),
        OutputFormat::Json => println!("{}", report.to_json_pretty()?),
    }
    Ok(())
}

/// Console rendering: run header, one block per host, summary.
pub struct TextReport<'a> {
    report: &'a ScanReport,
    scan_duration: Duration,
}

impl<'a> TextReport<'a> {
    pub fn new(report: &'a ScanReport, scan_duration: Duration) -> Self {
        Self { report, scan_duration }
    }

    fn write_header(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let meta = &self.report.metadata;
        writeln!(f, "{:=<RULE_WIDE$}", "")?;
        writeln!(f, "[*] Team           : {}", meta.team)?;
        writeln!(
            f,
            "[*] Scope (Target) : {} (Total Hosts: {})",
            meta.scope,
            self.report.hosts().len()
        )?;
        writeln!(f, "[*] Time of Scan   : {}", meta.time)?;
        writeln!(f, "[*] Scan run by    : {}", meta.user)?;
        writeln!(f, "{:=<RULE_WIDE$}", "")
    }

    fn write_host(&self, f: &mut fmt::Formatter<'_>, host: &HostResult) -> fmt::Result {
        let bar = "=".repeat(20);
        writeln!(f, "\n{bar} TARGET: {} {bar}", host.ip)?;

        if !host.is_up() {
            return writeln!(f, "[-] Host {} is DOWN.", host.ip);
        }
        if host.ports().is_empty() {
            return writeln!(f, "[+] Host {} is UP, no open ports found.", host.ip);
        }

        writeln!(f, "[+] Host {} is UP, {} open port(s)", host.ip, host.ports().len())?;
        writeln!(f, "{:-<RULE_TABLE$}", "")?;
        writeln!(f, "{:<8} | {:<10} | VERSION", "PORT", "SERVICE")?;
        writeln!(f, "{:-<RULE_TABLE$}", "")?;
        for port in host.ports() {
            writeln!(f, "{:<8} | {:<10} | {}", port.port, port.service, port.version)?;
        }
        writeln!(f, "{:-<RULE_TABLE$}", "")
    }
}

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_header(f)?;
        for host in self.report.hosts() {
            self.write_host(f, host)?;
        }

        let total = self.report.hosts().len();
        let up = self.report.hosts_up();
        writeln!(f, "\nSummary:")?;
        writeln!(f, "  Hosts up: {} / {}", up, total)?;
        writeln!(f, "  Hosts down: {}", total - up)?;
        writeln!(f, "  Open ports: {}", self.report.open_port_count())?;
        writeln!(f, "  Scan duration: {}", format_duration(self.scan_duration))?;
        writeln!(f, "\n[+] All tasks completed for the given scope!")
    }
}

/// Format duration in a human-readable way
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if total_secs == 0 {
        format!("{}ms", millis)
    } else if total_secs < 60 {
        if millis > 0 {
            format!("{}.{:03}s", total_secs, millis)
        } else {
            format!("{}s", total_secs)
        }
    } else {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        if secs > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}m", mins)
        }
    }
}
