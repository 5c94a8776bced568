//! Core data types for the Supernova scan core
//!
//! - `ScanRequest` is validated once and never mutated afterwards
//! - `HostResult` keeps its port list unique and ascending on every insert
//! - `ScanReport` serializes `hosts` as an object keyed by IP, in request order

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use crate::error::{SupernovaError, SupernovaResult};

/// Timestamp layout used in report metadata.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Team label stamped on reports when none is configured.
pub const DEFAULT_TEAM: &str = "SUPERNOVA";

/// How a service identification was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Confidence {
    /// Derived from actual banner content.
    Verified,
    /// Inferred from the port number alone.
    Guessed,
    /// No information. Also what a decoded report carries, since the wire
    /// format does not transmit confidence.
    #[default]
    Unknown,
}

impl Confidence {
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Confidence::Verified => "verified",
            Confidence::Guessed => "guessed",
            Confidence::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fingerprint outcome for one (banner, port) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceMatch {
    pub service: String,
    pub version: String,
    pub confidence: Confidence,
}

impl ServiceMatch {
    #[inline]
    #[must_use]
    pub fn new<S: Into<String>>(service: S) -> Self {
        Self {
            service: service.into(),
            version: "Unknown".to_string(),
            confidence: Confidence::Verified,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_version<S: Into<String>>(mut self, version: S) -> Self {
        self.version = version.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }
}

/// One open port with its identified service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortResult {
    pub port: u16,
    pub service: String,
    pub version: String,
    #[serde(skip_serializing, default)]
    pub confidence: Confidence,
}

impl PortResult {
    #[inline]
    #[must_use]
    pub fn new(port: u16, service: ServiceMatch) -> Self {
        Self {
            port,
            service: service.service,
            version: service.version,
            confidence: service.confidence,
        }
    }
}

/// Liveness verdict for a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostStatus {
    Up,
    Down,
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HostStatus::Up => "up",
            HostStatus::Down => "down",
        })
    }
}

/// Per-host outcome. Ports stay unique and ascending; a down host has none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostResult {
    pub ip: IpAddr,
    status: HostStatus,
    ports: Vec<PortResult>,
}

impl HostResult {
    #[must_use]
    pub fn up(ip: IpAddr) -> Self {
        Self {
            ip,
            status: HostStatus::Up,
            ports: Vec::new(),
        }
    }

    #[must_use]
    pub fn down(ip: IpAddr) -> Self {
        Self {
            ip,
            status: HostStatus::Down,
            ports: Vec::new(),
        }
    }

    #[inline]
    pub fn status(&self) -> HostStatus {
        self.status
    }

    #[inline]
    pub fn ports(&self) -> &[PortResult] {
        &self.ports
    }

    #[inline]
    pub fn is_up(&self) -> bool {
        self.status == HostStatus::Up
    }

    /// Insert a port result in ascending position. A result for a port that
    /// is already present replaces it. Ignored on a down host.
    pub fn insert_port(&mut self, result: PortResult) {
        if self.status == HostStatus::Down {
            return;
        }
        match self.ports.binary_search_by_key(&result.port, |p| p.port) {
            Ok(idx) => self.ports[idx] = result,
            Err(idx) => self.ports.insert(idx, result),
        }
    }

    fn from_entry(ip: IpAddr, entry: HostEntry) -> Self {
        let mut host = match entry.status {
            HostStatus::Up => Self::up(ip),
            HostStatus::Down => Self::down(ip),
        };
        for port in entry.ports {
            host.insert_port(port);
        }
        host
    }
}

/// Wire shape of a host value inside the `hosts` object.
#[derive(Serialize)]
struct HostEntryRef<'a> {
    status: HostStatus,
    ports: &'a [PortResult],
}

#[derive(Deserialize)]
struct HostEntry {
    status: HostStatus,
    #[serde(default)]
    ports: Vec<PortResult>,
}

/// Who ran what, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanMetadata {
    pub team: String,
    pub scope: String,
    pub time: String,
    pub user: String,
}

impl ScanMetadata {
    /// Stamp metadata with the local wall clock and the invoking user.
    #[must_use]
    pub fn capture(team: &str, scope: &str) -> Self {
        Self {
            team: team.to_string(),
            scope: scope.to_string(),
            time: chrono::Local::now().format(TIME_FORMAT).to_string(),
            user: current_user(),
        }
    }
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Aggregate result of one scan invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    pub metadata: ScanMetadata,
    #[serde(with = "hosts_map")]
    hosts: Vec<HostResult>,
}

impl ScanReport {
    #[must_use]
    pub fn new(metadata: ScanMetadata) -> Self {
        Self {
            metadata,
            hosts: Vec::new(),
        }
    }

    /// Hosts in the order they were scanned.
    #[inline]
    pub fn hosts(&self) -> &[HostResult] {
        &self.hosts
    }

    pub fn host(&self, ip: &IpAddr) -> Option<&HostResult> {
        self.hosts.iter().find(|h| &h.ip == ip)
    }

    /// Append a finished host. A repeated IP replaces the earlier entry in place.
    pub fn push_host(&mut self, host: HostResult) {
        match self.hosts.iter_mut().find(|h| h.ip == host.ip) {
            Some(existing) => *existing = host,
            None => self.hosts.push(host),
        }
    }

    pub fn hosts_up(&self) -> usize {
        self.hosts.iter().filter(|h| h.is_up()).count()
    }

    pub fn open_port_count(&self) -> usize {
        self.hosts.iter().map(|h| h.ports.len()).sum()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(input: &str) -> serde_json::Result<Self> {
        serde_json::from_str(input)
    }
}

mod hosts_map {
    use super::*;

    pub fn serialize<S: Serializer>(hosts: &[HostResult], serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(hosts.len()))?;
        for host in hosts {
            let entry = HostEntryRef {
                status: host.status,
                ports: &host.ports,
            };
            map.serialize_entry(&host.ip.to_string(), &entry)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<HostResult>, D::Error> {
        deserializer.deserialize_map(HostsVisitor)
    }

    struct HostsVisitor;

    impl<'de> Visitor<'de> for HostsVisitor {
        type Value = Vec<HostResult>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an object keyed by IP address")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut hosts: Vec<HostResult> = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((key, entry)) = access.next_entry::<String, HostEntry>()? {
                let ip: IpAddr = key
                    .parse()
                    .map_err(|_| de::Error::custom(format!("invalid IP address key: {key}")))?;
                let host = HostResult::from_entry(ip, entry);
                match hosts.iter_mut().find(|h| h.ip == ip) {
                    Some(existing) => *existing = host,
                    None => hosts.push(host),
                }
            }
            Ok(hosts)
        }
    }
}

/// Scan behaviour tuning options.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOptions {
    /// Bound for every single network operation (connect, read, ping).
    pub timeout: Duration,
    /// Maximum connection attempts in flight per host.
    pub concurrency: usize,
    /// Pause after the blank-line probe before the final read.
    pub settle_delay: Duration,
    /// Spend one extra active probe on ports that stayed silent.
    pub reprobe_silent: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
            concurrency: 50,
            settle_delay: Duration::from_millis(300),
            reprobe_silent: false,
        }
    }
}

impl ScanOptions {
    /// Fast preset: short timeout, wide pool, minimal settle delay.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            timeout: Duration::from_millis(500),
            concurrency: 200,
            settle_delay: Duration::from_millis(100),
            reprobe_silent: false,
        }
    }

    /// Thorough preset: generous timeout and a re-probe of silent ports.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            concurrency: 50,
            settle_delay: Duration::from_millis(500),
            reprobe_silent: true,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    #[must_use]
    pub fn with_reprobe(mut self, reprobe: bool) -> Self {
        self.reprobe_silent = reprobe;
        self
    }

    /// Convert a user-facing seconds value into a timeout.
    pub fn timeout_from_secs(secs: f64) -> SupernovaResult<Duration> {
        if !secs.is_finite() || secs <= 0.0 {
            return Err(SupernovaError::Config(format!(
                "timeout must be a positive number of seconds, got {secs}"
            )));
        }
        Duration::try_from_secs_f64(secs)
            .map_err(|e| SupernovaError::Config(format!("timeout out of range: {e}")))
    }

    fn validate(&self) -> SupernovaResult<()> {
        if self.timeout.is_zero() {
            return Err(SupernovaError::Config("timeout must be greater than zero".into()));
        }
        if self.concurrency == 0 {
            return Err(SupernovaError::Config("concurrency must be at least 1".into()));
        }
        Ok(())
    }
}

/// Immutable input to one scan.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    targets: Vec<IpAddr>,
    ports: Vec<u16>,
    scope: String,
    team: String,
    options: ScanOptions,
}

impl ScanRequest {
    /// Validate and build a request. Duplicate targets are dropped keeping
    /// first-seen order; duplicate ports are kept, they are only redundant.
    pub fn new(targets: Vec<IpAddr>, ports: Vec<u16>, scope: impl Into<String>) -> SupernovaResult<Self> {
        if targets.is_empty() {
            return Err(SupernovaError::InvalidTarget("no targets specified".into()));
        }
        if ports.is_empty() {
            return Err(SupernovaError::InvalidPortSpec("no ports specified".into()));
        }
        if ports.contains(&0) {
            return Err(SupernovaError::InvalidPortSpec("port 0 is outside 1-65535".into()));
        }

        let mut seen = HashSet::with_capacity(targets.len());
        let mut unique = Vec::with_capacity(targets.len());
        for ip in targets {
            if seen.insert(ip) {
                unique.push(ip);
            }
        }

        Ok(Self {
            targets: unique,
            ports,
            scope: scope.into(),
            team: DEFAULT_TEAM.to_string(),
            options: ScanOptions::default(),
        })
    }

    pub fn with_options(mut self, options: ScanOptions) -> SupernovaResult<Self> {
        options.validate()?;
        self.options = options;
        Ok(self)
    }

    #[must_use]
    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = team.into();
        self
    }

    #[inline]
    pub fn targets(&self) -> &[IpAddr] {
        &self.targets
    }

    #[inline]
    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    #[inline]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    #[inline]
    pub fn team(&self) -> &str {
        &self.team
    }

    #[inline]
    pub fn options(&self) -> &ScanOptions {
        &self.options
    }
}
