//! Service detection based on banners and port numbers
//!
//! Classification is an ordered rule table: the first rule whose predicate
//! holds produces the result. Predicates look at the upper-cased banner so
//! keyword matching is case-insensitive.

use once_cell::sync::Lazy;
use regex::Regex;
use supernova_common::{Confidence, ServiceMatch};

/// Version reported when a port is known but nothing was read from it.
pub const NO_BANNER: &str = "Unknown (no banner)";

const UNKNOWN: &str = "Unknown";
const VERSION_LIMIT: usize = 50;

static SSH_VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)SSH-\d\.\d-([^\r\n]+)").expect("static regex"));

static SERVER_HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^[ \t]*Server:[ \t]*([^\r\n]+)").expect("static regex"));

/// Banner text prepared once for all rules.
struct Banner<'a> {
    text: &'a str,
    upper: String,
}

impl<'a> Banner<'a> {
    fn new(raw: &'a str) -> Self {
        let text = trim_banner(raw);
        Self {
            text,
            upper: text.to_uppercase(),
        }
    }

    fn contains(&self, keyword: &str) -> bool {
        self.upper.contains(keyword)
    }
}

struct Rule {
    name: &'static str,
    applies: fn(&Banner<'_>) -> bool,
    extract: fn(&Banner<'_>, u16) -> ServiceMatch,
}

/// Precedence is significant: SMTP must stay ahead of FTP because both
/// greet with "220 ".
static RULES: &[Rule] = &[
    Rule {
        name: "empty",
        applies: |b| b.text.is_empty(),
        extract: |_, port| match detect_service_from_port(port) {
            Some(service) => ServiceMatch::new(service)
                .with_version(NO_BANNER)
                .with_confidence(Confidence::Guessed),
            None => ServiceMatch::new(UNKNOWN)
                .with_version(UNKNOWN)
                .with_confidence(Confidence::Guessed),
        },
    },
    Rule {
        name: "ssh",
        applies: |b| b.contains("SSH-"),
        extract: |b, _| ServiceMatch::new("SSH").with_version(extract_ssh_version(b.text)),
    },
    Rule {
        name: "http",
        applies: |b| b.contains("HTTP/") || b.contains("SERVER:"),
        extract: |b, port| {
            let service = if port == 443 { "HTTPS" } else { "HTTP" };
            ServiceMatch::new(service).with_version(extract_server_header(b.text))
        },
    },
    Rule {
        name: "smtp",
        applies: |b| b.contains("SMTP") || b.contains("ESMTP"),
        extract: |b, _| ServiceMatch::new("SMTP").with_version(clean_greeting(b.text)),
    },
    Rule {
        name: "ftp",
        applies: |b| b.contains("FTP") || b.text.starts_with("220 "),
        extract: |b, _| ServiceMatch::new("FTP").with_version(clean_greeting(b.text)),
    },
    Rule {
        name: "smb",
        applies: |b| b.contains("SMB") || b.contains("SAMBA"),
        extract: |_, _| ServiceMatch::new("SMB").with_version("SMB Service Detected"),
    },
    Rule {
        name: "fallback",
        applies: |_| true,
        extract: |b, port| {
            let service = detect_service_from_banner_port(port).unwrap_or("Unknown Service");
            ServiceMatch::new(service).with_version(first_line(b.text))
        },
    },
];

/// Classify a banner captured from `port`.
///
/// Never fails: every input maps to a service, a version and a confidence.
pub fn classify(banner: &str, port: u16) -> ServiceMatch {
    let banner = Banner::new(banner);
    RULES
        .iter()
        .find(|rule| (rule.applies)(&banner))
        .map(|rule| (rule.extract)(&banner, port))
        .unwrap_or_else(|| ServiceMatch::new(UNKNOWN).with_confidence(Confidence::Unknown))
}

/// Name of the rule that would classify this banner.
pub fn matching_rule(banner: &str) -> &'static str {
    let banner = Banner::new(banner);
    RULES
        .iter()
        .find(|rule| (rule.applies)(&banner))
        .map(|rule| rule.name)
        .unwrap_or("none")
}

/// True when a banner carries no information once control whitespace is gone.
pub fn is_blank(banner: &str) -> bool {
    trim_banner(banner).is_empty()
}

/// Strip the whitespace and control bytes services pad their greetings with.
pub fn trim_banner(raw: &str) -> &str {
    raw.trim_matches(|c: char| c.is_whitespace() || c.is_control())
}

/// Service guess for a silent port.
pub fn detect_service_from_port(port: u16) -> Option<&'static str> {
    let service = match port {
        21 => "FTP",
        22 => "SSH",
        23 => "Telnet",
        25 => "SMTP",
        53 => "DNS",
        80 => "HTTP",
        110 => "POP3",
        135 => "RPC",
        139 => "NetBIOS",
        143 => "IMAP",
        443 => "HTTPS",
        445 => "SMB",
        3306 => "MySQL",
        3389 => "RDP",
        8080 => "HTTP-Proxy",
        _ => return None,
    };
    Some(service)
}

/// Service name for a port that answered with an unrecognised banner.
fn detect_service_from_banner_port(port: u16) -> Option<&'static str> {
    match port {
        21 => Some("FTP"),
        22 => Some("SSH"),
        80 => Some("HTTP"),
        443 => Some("HTTPS"),
        3306 => Some("MySQL"),
        _ => None,
    }
}

/// "SSH-2.0-OpenSSH_8.9" -> "OpenSSH_8.9"; otherwise the first token.
fn extract_ssh_version(text: &str) -> String {
    SSH_VERSION_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|v| !v.is_empty())
        .or_else(|| text.split_whitespace().next())
        .unwrap_or(UNKNOWN)
        .to_string()
}

fn extract_server_header(text: &str) -> String {
    SERVER_HEADER_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|v| !v.is_empty())
        .unwrap_or("Web Server Detected")
        .to_string()
}

/// "220 mail-gw ESMTP\r\n..." -> "mail gw ESMTP"
fn clean_greeting(text: &str) -> String {
    let body = text.strip_prefix("220 ").unwrap_or(text);
    let line = body.split(['\r', '\n']).next().unwrap_or_default();
    let cleaned = line.replace('-', " ");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        UNKNOWN.to_string()
    } else {
        cleaned.to_string()
    }
}

fn first_line(text: &str) -> String {
    text.lines()
        .next()
        .unwrap_or_default()
        .trim()
        .chars()
        .take(VERSION_LIMIT)
        .collect()
}
