//! Fingerprint Engine - service and version identification
//!
//! This crate maps a (banner, port) pair to a service name, a version string
//! and a confidence level:
//! - `classify` is the pure, ordered rule evaluation
//! - `FingerprintEngine` adds the optional active re-probe of silent ports

mod service_detector;

use std::net::IpAddr;
use supernova_common::{BannerSource, ServiceMatch};

pub use service_detector::{
    classify, detect_service_from_port, is_blank, matching_rule, trim_banner, NO_BANNER,
};

/// Fingerprint Engine for service detection
#[derive(Debug, Clone, Default)]
pub struct FingerprintEngine {
    reprobe_silent: bool,
}

impl FingerprintEngine {
    /// Create a new fingerprint engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Spend one extra active probe on ports whose banner came back empty.
    pub fn with_reprobe(mut self, enabled: bool) -> Self {
        self.reprobe_silent = enabled;
        self
    }

    /// Classify a captured banner, re-probing the port once first when the
    /// banner is blank and re-probing is enabled.
    pub async fn identify(
        &self,
        banner: &str,
        ip: IpAddr,
        port: u16,
        source: &dyn BannerSource,
    ) -> ServiceMatch {
        if self.reprobe_silent && is_blank(banner) {
            let second = source.reprobe(ip, port).await;
            if !is_blank(&second) {
                return classify(&second, port);
            }
        }
        classify(banner, port)
    }
}
