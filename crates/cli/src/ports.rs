//! Port specification parsing

use std::collections::BTreeSet;

use supernova_common::{SupernovaError, SupernovaResult};

/// Scanned when no `-p` is given.
pub const DEFAULT_PORTS: &[u16] = &[
    21, 22, 23, 25, 53, 80, 110, 135, 139, 143, 443, 445, 3306, 3389, 8080,
];

/// Top 100 most common TCP ports
pub const TOP_100: &[u16] = &[
    7, 9, 13, 21, 22, 23, 25, 26, 37, 53, 79, 80, 81, 88, 106, 110, 111, 113, 119, 135, 139,
    143, 144, 179, 199, 389, 427, 443, 444, 445, 465, 513, 514, 515, 543, 544, 548, 554, 587,
    631, 646, 873, 990, 993, 995, 1025, 1026, 1027, 1028, 1029, 1110, 1433, 1720, 1723, 1755,
    1900, 2000, 2001, 2049, 2121, 2717, 3000, 3128, 3306, 3389, 3986, 4899, 5000, 5009, 5051,
    5060, 5101, 5190, 5357, 5432, 5631, 5666, 5800, 5900, 6000, 6001, 6646, 7070, 8000, 8008,
    8009, 8080, 8081, 8443, 8888, 9100, 9999, 10000, 32768, 49152, 49153, 49154, 49155, 49156,
    49157,
];

/// Expand a port spec into an ascending, duplicate-free port list.
///
/// Accepts `top15`, `top100`, `all` or `-`, ranges like `1000-1010` and
/// comma lists mixing both, e.g. "22,80-82,443". `None` means the defaults.
pub fn parse_port_spec(spec: Option<&str>) -> SupernovaResult<Vec<u16>> {
    let Some(spec) = spec else {
        return Ok(DEFAULT_PORTS.to_vec());
    };

    let spec = spec.trim();
    match spec.to_ascii_lowercase().as_str() {
        "top15" | "default" => return Ok(sorted(DEFAULT_PORTS)),
        "top100" => return Ok(sorted(TOP_100)),
        "all" | "-" => return Ok((1..=u16::MAX).collect()),
        _ => {}
    }

    let mut ports = BTreeSet::new();
    for part in spec.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if let Some((start, end)) = part.split_once('-') {
            let start = parse_port(start)?;
            let end = parse_port(end)?;
            if start > end {
                return Err(SupernovaError::InvalidPortSpec(format!(
                    "invalid range {part}: start > end"
                )));
            }
            ports.extend(start..=end);
        } else {
            ports.insert(parse_port(part)?);
        }
    }

    if ports.is_empty() {
        return Err(SupernovaError::InvalidPortSpec("no ports specified".into()));
    }
    Ok(ports.into_iter().collect())
}

fn parse_port(token: &str) -> SupernovaResult<u16> {
    let token = token.trim();
    let value: u32 = token
        .parse()
        .map_err(|_| SupernovaError::InvalidPortSpec(format!("'{token}' is not a port number")))?;

    match u16::try_from(value) {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(SupernovaError::InvalidPortSpec(format!(
            "port {value} is outside 1-65535"
        ))),
    }
}

fn sorted(list: &[u16]) -> Vec<u16> {
    let set: BTreeSet<u16> = list.iter().copied().collect();
    set.into_iter().collect()
}
