//! Progress tracking

use tokio::sync::Mutex;
use tracing::info;

use supernova_common::{HostResult, HostStatus};

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub hosts_up: usize,
    pub hosts_down: usize,
    pub open_ports: usize,
}

impl ProgressSnapshot {
    pub fn completed(&self) -> usize {
        self.hosts_up + self.hosts_down
    }
}

pub struct ProgressTracker {
    total: Mutex<usize>,
    hosts_up: Mutex<usize>,
    hosts_down: Mutex<usize>,
    open_ports: Mutex<usize>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            total: Mutex::new(0),
            hosts_up: Mutex::new(0),
            hosts_down: Mutex::new(0),
            open_ports: Mutex::new(0),
        }
    }

    /// Start a new run: set the host total and zero the counters.
    pub async fn set_total(&self, total: usize) {
        *self.total.lock().await = total;
        *self.hosts_up.lock().await = 0;
        *self.hosts_down.lock().await = 0;
        *self.open_ports.lock().await = 0;
    }

    pub async fn record_host(&self, host: &HostResult) {
        match host.status() {
            HostStatus::Up => *self.hosts_up.lock().await += 1,
            HostStatus::Down => *self.hosts_down.lock().await += 1,
        }
        *self.open_ports.lock().await += host.ports().len();
    }

    pub async fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: *self.total.lock().await,
            hosts_up: *self.hosts_up.lock().await,
            hosts_down: *self.hosts_down.lock().await,
            open_ports: *self.open_ports.lock().await,
        }
    }

    pub async fn print_summary(&self) {
        let snap = self.snapshot().await;

        info!("Scan Summary:");
        info!("  Total hosts: {}", snap.total);
        info!("  Up: {}", snap.hosts_up);
        info!("  Down: {}", snap.hosts_down);
        info!("  Open ports: {}", snap.open_ports);
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
