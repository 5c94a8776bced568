//! Supernova Common - shared types and traits
//!
//! This crate provides the data model, error taxonomy and the collaborator
//! traits used across the Supernova scan core:
//! - `ScanRequest` / `ScanOptions` as immutable scan input
//! - `ScanReport` / `HostResult` / `PortResult` as scan output
//! - `Connector`, `PortScanner`, `BannerSource`, `HostProbe` as the seams
//!   between components

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{SupernovaError, SupernovaResult};
pub use traits::{BannerSource, Connector, HostProbe, PortScanner};
pub use types::{
    Confidence, HostResult, HostStatus, PortResult, ScanMetadata, ScanOptions, ScanReport,
    ScanRequest, ServiceMatch, DEFAULT_TEAM, TIME_FORMAT,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
