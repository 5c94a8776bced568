//! Target Resolver - CIDR and range expansion
//!
//! Takes a comma-separated target string and expands it into a deduplicated
//! list of IPv4 addresses, first-seen order preserved. Supported token forms:
//! - single IPv4 address: "1.2.3.4"
//! - CIDR: "192.168.1.0/24" (host addresses only; host bits are ignored)
//! - range: "192.168.1.1-192.168.1.10"

use ipnet::Ipv4Net;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};

use supernova_common::{SupernovaError, SupernovaResult};

/// Largest CIDR or range expansion accepted unless `SUPERNOVA_ALLOW_LARGE_CIDR=1`.
pub const MAX_HOSTS: u64 = 4096;

pub const ALLOW_LARGE_CIDR_ENV: &str = "SUPERNOVA_ALLOW_LARGE_CIDR";

pub struct TargetResolver;

impl TargetResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve a comma-separated target string into unique IPv4 addresses.
    pub fn resolve_targets(targets: &str) -> SupernovaResult<Vec<IpAddr>> {
        let allow_large = std::env::var(ALLOW_LARGE_CIDR_ENV)
            .map(|v| v == "1")
            .unwrap_or(false);
        let limit = if allow_large { u64::MAX } else { MAX_HOSTS };
        Self::resolve_targets_with_limit(targets, limit)
    }

    /// Same as `resolve_targets` with an explicit expansion limit.
    pub fn resolve_targets_with_limit(targets: &str, max_hosts: u64) -> SupernovaResult<Vec<IpAddr>> {
        if targets.trim().is_empty() {
            return Err(SupernovaError::InvalidTarget("no targets specified".into()));
        }

        let mut ips: Vec<IpAddr> = Vec::new();
        let mut seen: HashSet<IpAddr> = HashSet::new();
        let mut push = |ip: Ipv4Addr| {
            let ip = IpAddr::V4(ip);
            if seen.insert(ip) {
                ips.push(ip);
            }
        };

        for token in targets.split(',') {
            let t = token.trim();
            if t.is_empty() {
                continue;
            }

            if t.contains('/') {
                let net: Ipv4Net = t
                    .parse()
                    .map_err(|_| SupernovaError::InvalidTarget(format!("invalid CIDR: {t}")))?;
                let prefix = net.prefix_len();
                let hosts_count = if prefix >= 32 { 1u64 } else { 1u64 << (32 - prefix) };
                check_expansion(&net.to_string(), hosts_count, max_hosts)?;
                net.trunc().hosts().for_each(&mut push);
                continue;
            }

            if let Some((start, end)) = t.split_once('-') {
                let (start, end) = parse_ip_range(start.trim(), end.trim())?;
                check_expansion(t, u64::from(end - start) + 1, max_hosts)?;
                (start..=end).map(Ipv4Addr::from).for_each(&mut push);
                continue;
            }

            push(parse_ipv4(t)?);
        }

        if ips.is_empty() {
            return Err(SupernovaError::InvalidTarget(
                "no valid IPv4 addresses found in targets".into(),
            ));
        }

        Ok(ips)
    }

    /// Validate an explicit list of dotted-quad addresses.
    pub fn parse_ip_list<S: AsRef<str>>(targets: &[S]) -> SupernovaResult<Vec<IpAddr>> {
        targets
            .iter()
            .map(|t| parse_ipv4(t.as_ref().trim()).map(IpAddr::V4))
            .collect()
    }
}

fn parse_ipv4(token: &str) -> SupernovaResult<Ipv4Addr> {
    token.parse::<Ipv4Addr>().map_err(|_| {
        SupernovaError::InvalidTarget(format!("'{token}' is not a valid IPv4 address or CIDR"))
    })
}

/// Inclusive range bounds as integers, start <= end.
fn parse_ip_range(start: &str, end: &str) -> SupernovaResult<(u32, u32)> {
    let start_u32 = u32::from(parse_ipv4(start)?);
    let end_u32 = u32::from(parse_ipv4(end)?);
    if start_u32 > end_u32 {
        return Err(SupernovaError::InvalidTarget(format!(
            "invalid IP range {start}-{end}: start > end"
        )));
    }
    Ok((start_u32, end_u32))
}

fn check_expansion(token: &str, hosts_count: u64, max_hosts: u64) -> SupernovaResult<()> {
    if hosts_count > max_hosts {
        return Err(SupernovaError::InvalidTarget(format!(
            "{token} expands to {hosts_count} hosts which exceeds the allowed limit of {max_hosts}. \
             Set {ALLOW_LARGE_CIDR_ENV}=1 to override."
        )));
    }
    Ok(())
}

impl Default for TargetResolver {
    fn default() -> Self {
        Self::new()
    }
}
