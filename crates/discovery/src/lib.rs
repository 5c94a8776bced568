//! Discovery - host liveness via the system `ping` utility
//!
//! One ICMP echo request per host. Raw ICMP sockets need privileges the
//! scanner does not otherwise require, so the check shells out to `ping`
//! the same way an operator would. Any failure to run it reads as "down".

use async_trait::async_trait;
use std::net::IpAddr;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use supernova_common::HostProbe;

/// Extra time granted to the `ping` process beyond its own deadline.
const PROCESS_GRACE: Duration = Duration::from_secs(1);

/// Which flag dialect the local `ping` speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingFlavor {
    /// `ping -n 1 -w <millis>`
    Windows,
    /// `ping -c 1 -W <seconds>`
    Unix,
}

impl PingFlavor {
    pub fn current() -> Self {
        if cfg!(windows) {
            PingFlavor::Windows
        } else {
            PingFlavor::Unix
        }
    }

    /// Arguments for a single echo request bounded by `limit`.
    pub fn args(&self, ip: IpAddr, limit: Duration) -> Vec<String> {
        match self {
            PingFlavor::Windows => {
                let millis = limit.as_millis().max(1);
                vec!["-n".into(), "1".into(), "-w".into(), millis.to_string(), ip.to_string()]
            }
            PingFlavor::Unix => {
                // -W takes whole seconds; round up so short timeouts still wait.
                let secs = limit.as_secs().saturating_add(u64::from(limit.subsec_nanos() > 0));
                vec!["-c".into(), "1".into(), "-W".into(), secs.max(1).to_string(), ip.to_string()]
            }
        }
    }
}

/// Liveness check backed by the system `ping`.
#[derive(Debug, Clone)]
pub struct PingProbe {
    program: String,
    flavor: PingFlavor,
}

impl PingProbe {
    pub fn new() -> Self {
        Self {
            program: "ping".to_string(),
            flavor: PingFlavor::current(),
        }
    }

    /// Use a different executable, e.g. an absolute path to `ping`.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

}

impl Default for PingProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostProbe for PingProbe {
    #[instrument(skip(self))]
    async fn is_host_up(&self, ip: IpAddr, limit: Duration) -> bool {
        let mut command = Command::new(&self.program);
        command
            .args(self.flavor.args(ip, limit))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Error checking host {}: cannot run {}: {}", ip, self.program, e);
                return false;
            }
        };

        let waited = timeout(limit.saturating_add(PROCESS_GRACE), child.wait()).await;
        match waited {
            Ok(Ok(status)) => {
                debug!("ping {} exited with {}", ip, status);
                status.success()
            }
            Ok(Err(e)) => {
                warn!("Error checking host {}: {}", ip, e);
                false
            }
            Err(_) => {
                debug!("ping {} did not finish in time", ip);
                let _ = child.kill().await;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn target() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))
    }

    #[test]
    fn test_unix_args_round_up_to_seconds() {
        let args = PingFlavor::Unix.args(target(), Duration::from_millis(1500));
        assert_eq!(args, vec!["-c", "1", "-W", "2", "10.0.0.5"]);

        let args = PingFlavor::Unix.args(target(), Duration::from_millis(200));
        assert_eq!(args[3], "1");

        let args = PingFlavor::Unix.args(target(), Duration::from_secs(3));
        assert_eq!(args[3], "3");

        let args = PingFlavor::Unix.args(target(), Duration::MAX);
        assert_eq!(args[3], u64::MAX.to_string());
    }

    #[test]
    fn test_windows_args_use_millis() {
        let args = PingFlavor::Windows.args(target(), Duration::from_millis(1500));
        assert_eq!(args, vec!["-n", "1", "-w", "1500", "10.0.0.5"]);
    }

    #[tokio::test]
    async fn test_missing_utility_reads_as_down() {
        let probe = PingProbe::new().with_program("/nonexistent/supernova-ping");
        assert!(!probe.is_host_up(target(), Duration::from_millis(100)).await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_status_decides() {
        // `true`/`false` ignore their arguments, which isolates the exit-code handling.
        let up = PingProbe::new().with_program("true");
        assert!(up.is_host_up(target(), Duration::from_millis(500)).await);

        let down = PingProbe::new().with_program("false");
        assert!(!down.is_host_up(target(), Duration::from_millis(500)).await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unbounded_timeout_does_not_overflow() {
        let up = PingProbe::new().with_program("true");
        assert!(up.is_host_up(target(), Duration::MAX).await);
    }
}
