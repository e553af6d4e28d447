use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use scribe_engine::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "scribe",
    version,
    about = "Collect keyword-filtered transcripts from video channels through rotating proxies"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect transcripts from one or more channels
    Collect(CollectArgs),

    /// Show or reset the configuration file
    Config {
        /// Print the effective configuration
        #[arg(long)]
        show: bool,

        /// Overwrite the configuration file with defaults
        #[arg(long)]
        reset: bool,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Flags override values from the configuration file.
#[derive(clap::Args, Debug, Default)]
pub struct CollectArgs {
    /// Comma-separated channel ids
    #[arg(short = 'C', long)]
    pub channels: Option<String>,

    /// File containing the YouTube Data API key
    #[arg(long, env = "SCRIBE_API_KEY_FILE")]
    pub api_key_file: Option<PathBuf>,

    /// Where to write the collected transcripts
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output file layout
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Maximum videos to inspect per channel
    #[arg(short = 'n', long)]
    pub max_videos: Option<usize>,

    /// Minimum video duration in minutes (inclusive)
    #[arg(long)]
    pub min_duration: Option<u32>,

    /// Keep only transcripts containing this word (case-insensitive)
    #[arg(short, long)]
    pub keyword: Option<String>,

    /// Proxy list, one address per line
    #[arg(long, env = "SCRIBE_PROXY_FILE")]
    pub proxy_file: Option<PathBuf>,

    /// Successful requests per proxy before rotating
    #[arg(long)]
    pub rotation_interval: Option<u32>,

    /// Minimum delay between transcript requests, in seconds
    #[arg(long)]
    pub delay_min: Option<u64>,

    /// Maximum delay between transcript requests, in seconds
    #[arg(long)]
    pub delay_max: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Print every progress event as a JSON line on stdout
    #[arg(long)]
    pub json_events: bool,

    /// Do not read operator commands from stdin
    #[arg(long)]
    pub no_console: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_collect_flags() {
        let args = Args::try_parse_from([
            "scribe",
            "collect",
            "-C",
            "UC1,UC2",
            "--keyword",
            "rust",
            "--delay-min",
            "1",
            "--delay-max",
            "2",
            "--format",
            "json",
            "--verbose",
        ])
        .unwrap();

        assert!(args.verbose);
        let Commands::Collect(collect) = args.command else {
            panic!("expected collect");
        };
        assert_eq!(collect.channels.as_deref(), Some("UC1,UC2"));
        assert_eq!(collect.keyword.as_deref(), Some("rust"));
        assert_eq!(collect.delay_min, Some(1));
        assert_eq!(collect.format, Some(OutputFormat::Json));
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        assert!(Args::try_parse_from(["scribe", "-v", "-q", "config", "--show"]).is_err());
    }
}
