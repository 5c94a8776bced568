use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use supernova_common::{ScanOptions, DEFAULT_TEAM};

#[derive(Parser, Debug)]
#[command(name = "supernova")]
#[command(version)]
#[command(about = "SUPERNOVA internal network scanner - core engine", long_about = None)]
pub struct Cli {
    /// Target IP, CIDR, range or comma list. Example: 192.168.1.1 or 192.168.1.0/24
    #[arg(short = 't', long = "target", required = true)]
    pub target: String,

    /// Ports to scan. Examples: 22,80 or 1-1024 or top100 or all. Default: 15 common ports
    #[arg(short, long)]
    pub ports: Option<String>,

    /// Tuning preset; -s, -c and --reprobe override it
    #[arg(long, value_enum, default_value_t = Preset::Default)]
    pub preset: Preset,

    /// Timeout in seconds for every network operation [default: 1.0]
    #[arg(short = 's', long = "speed")]
    pub speed: Option<f64>,

    /// Max concurrent connection attempts per host [default: 50]
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Team label written into the report
    #[arg(long, default_value = DEFAULT_TEAM)]
    pub team: String,

    /// Re-probe ports that stayed silent once more before guessing from the port number
    #[arg(long)]
    pub reprobe: bool,

    /// Write the JSON report to this file after a completed scan
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Console output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    /// 1 s timeout, 50 workers
    Default,
    /// 0.5 s timeout, 200 workers, short settle delay
    Fast,
    /// 3 s timeout, longer settle delay, silent ports re-probed
    Thorough,
}

impl Preset {
    pub fn options(self) -> ScanOptions {
        match self {
            Preset::Default => ScanOptions::default(),
            Preset::Fast => ScanOptions::fast(),
            Preset::Thorough => ScanOptions::thorough(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["supernova", "-t", "10.0.0.1"]).unwrap();
        assert_eq!(cli.target, "10.0.0.1");
        assert!(cli.ports.is_none());
        assert_eq!(cli.preset, Preset::Default);
        assert_eq!(cli.speed, None);
        assert_eq!(cli.concurrency, None);
        assert_eq!(cli.team, DEFAULT_TEAM);
        assert!(!cli.reprobe);
        assert!(cli.output.is_none());
        assert_eq!(cli.format, OutputFormat::Text);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_all_flags() {
        let cli = Cli::try_parse_from([
            "supernova", "-t", "10.0.0.0/30", "-p", "22,80", "-s", "0.5", "-c", "8", "--team",
            "RED", "--reprobe", "-o", "out.json", "-f", "json", "-vv", "--preset", "thorough",
        ])
        .unwrap();
        assert_eq!(cli.ports.as_deref(), Some("22,80"));
        assert_eq!(cli.preset, Preset::Thorough);
        assert_eq!(cli.speed, Some(0.5));
        assert_eq!(cli.concurrency, Some(8));
        assert_eq!(cli.team, "RED");
        assert!(cli.reprobe);
        assert_eq!(cli.output, Some(PathBuf::from("out.json")));
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_target_required() {
        assert!(Cli::try_parse_from(["supernova"]).is_err());
        assert!(Cli::try_parse_from(["supernova", "-t", "10.0.0.1", "-f", "csv"]).is_err());
        assert!(Cli::try_parse_from(["supernova", "-t", "10.0.0.1", "--preset", "stealth"]).is_err());
    }

    #[test]
    fn test_preset_options() {
        assert_eq!(Preset::Default.options(), ScanOptions::default());

        let fast = Preset::Fast.options();
        assert!(fast.timeout < ScanOptions::default().timeout);
        assert!(fast.concurrency > ScanOptions::default().concurrency);
        assert!(!fast.reprobe_silent);

        let thorough = Preset::Thorough.options();
        assert!(thorough.timeout > ScanOptions::default().timeout);
        assert!(thorough.reprobe_silent);
    }
}
