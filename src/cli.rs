//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use hidemail_core::DEFAULT_BASE_URL;
use hidemail_core::generate::{DEFAULT_MAX_ATTEMPTS, DEFAULT_REQUESTED_COUNT};

/// Default cookie file, relative to the working directory.
pub(crate) const DEFAULT_COOKIE_FILE: &str = "cookie.txt";

/// Default output file for reserved aliases.
pub(crate) const DEFAULT_OUTPUT_FILE: &str = "emails.txt";

/// Label used when none is given.
pub(crate) const DEFAULT_LABEL: &str = "hidemail";

pub(crate) const DEFAULT_DELAY_MS: u64 = 1500;
pub(crate) const DEFAULT_MAX_BACKOFF_SECS: u64 = 300;
pub(crate) const DEFAULT_COOLDOWN_SECS: u64 = 1800;

/// Create and list iCloud+ Hide My Email aliases.
///
/// hidemail drives the Hide My Email web API with the session cookie of a
/// logged-in browser, reserving labelled aliases at a pace the provider
/// tolerates.
#[derive(Parser, Debug)]
#[command(name = "hidemail")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored log output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Generate and reserve new aliases
    Generate(GenerateArgs),

    /// List existing aliases
    List(ListArgs),
}

/// Arguments for `hidemail generate`.
#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// File holding the session cookie (lines starting with // are ignored)
    #[arg(long, default_value = DEFAULT_COOKIE_FILE)]
    pub cookie_file: PathBuf,

    /// Number of aliases to create
    #[arg(short = 'n', long, default_value_t = DEFAULT_REQUESTED_COUNT)]
    pub count: usize,

    /// Label attached to every created alias
    #[arg(long, default_value = DEFAULT_LABEL)]
    pub label: String,

    /// Maximum failed provider calls per alias (1-10)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_ATTEMPTS, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub max_attempts: u32,

    /// Minimum delay between aliases in milliseconds (0 to disable, max 600000)
    #[arg(short = 'l', long = "delay", default_value_t = DEFAULT_DELAY_MS, value_parser = clap::value_parser!(u64).range(0..=600_000))]
    pub delay_ms: u64,

    /// Ceiling for rate-limit backoff in seconds (1-3600)
    #[arg(long, default_value_t = DEFAULT_MAX_BACKOFF_SECS, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub max_backoff_secs: u64,

    /// Pause after this many reserved aliases (0 to disable)
    #[arg(long, default_value_t = 0)]
    pub cooldown_every: u32,

    /// Length of the pause in seconds
    #[arg(long, default_value_t = DEFAULT_COOLDOWN_SECS, value_parser = clap::value_parser!(u64).range(0..=86_400))]
    pub cooldown_secs: u64,

    /// File that reserved aliases are appended to
    #[arg(short = 'o', long, default_value = DEFAULT_OUTPUT_FILE)]
    pub output: PathBuf,

    /// Write `label;address;created;status` lines instead of bare addresses
    #[arg(long)]
    pub detailed: bool,

    /// Hide My Email service endpoint
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,
}

/// Arguments for `hidemail list`.
#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// File holding the session cookie (lines starting with // are ignored)
    #[arg(long, default_value = DEFAULT_COOKIE_FILE)]
    pub cookie_file: PathBuf,

    /// Show inactive aliases instead of active ones
    #[arg(long)]
    pub inactive: bool,

    /// Only show aliases whose label matches this regular expression
    #[arg(long)]
    pub search: Option<String>,

    /// Also write every listed alias to this file
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Hide My Email service endpoint
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate_args(argv: &[&str]) -> GenerateArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Command::Generate(args) => args,
            Command::List(_) => panic!("expected generate"),
        }
    }

    fn list_args(argv: &[&str]) -> ListArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Command::List(args) => args,
            Command::Generate(_) => panic!("expected list"),
        }
    }

    #[test]
    fn test_cli_generate_defaults() {
        let args = generate_args(&["hidemail", "generate"]);
        assert_eq!(args.cookie_file, PathBuf::from("cookie.txt"));
        assert_eq!(args.count, 5);
        assert_eq!(args.label, "hidemail");
        assert_eq!(args.max_attempts, 3);
        assert_eq!(args.delay_ms, 1500);
        assert_eq!(args.max_backoff_secs, 300);
        assert_eq!(args.cooldown_every, 0);
        assert_eq!(args.output, PathBuf::from("emails.txt"));
        assert!(!args.detailed);
        assert_eq!(args.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_cli_generate_short_flags() {
        let args = generate_args(&[
            "hidemail", "generate", "-n", "12", "-r", "5", "-l", "0", "-o", "out.txt",
        ]);
        assert_eq!(args.count, 12);
        assert_eq!(args.max_attempts, 5);
        assert_eq!(args.delay_ms, 0);
        assert_eq!(args.output, PathBuf::from("out.txt"));
    }

    #[test]
    fn test_cli_generate_label_and_cooldown() {
        let args = generate_args(&[
            "hidemail",
            "generate",
            "--label",
            "shopping",
            "--cooldown-every",
            "5",
            "--cooldown-secs",
            "60",
        ]);
        assert_eq!(args.label, "shopping");
        assert_eq!(args.cooldown_every, 5);
        assert_eq!(args.cooldown_secs, 60);
    }

    #[test]
    fn test_cli_generate_zero_count_accepted() {
        assert_eq!(generate_args(&["hidemail", "generate", "-n", "0"]).count, 0);
    }

    #[test]
    fn test_cli_max_attempts_out_of_range_rejected() {
        for value in ["0", "11"] {
            let err = Cli::try_parse_from(["hidemail", "generate", "-r", value]).unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        }
    }

    #[test]
    fn test_cli_delay_max_value() {
        assert_eq!(
            generate_args(&["hidemail", "generate", "-l", "600000"]).delay_ms,
            600_000
        );
        let err = Cli::try_parse_from(["hidemail", "generate", "-l", "600001"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_list_flags() {
        let args = list_args(&[
            "hidemail", "list", "--inactive", "--search", "^shop", "-o", "all.txt",
        ]);
        assert!(args.inactive);
        assert_eq!(args.search.as_deref(), Some("^shop"));
        assert_eq!(args.output, Some(PathBuf::from("all.txt")));
    }

    #[test]
    fn test_cli_list_defaults() {
        let args = list_args(&["hidemail", "list"]);
        assert!(!args.inactive);
        assert!(args.search.is_none());
        assert!(args.output.is_none());
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["hidemail", "list", "-vv", "--no-color"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(cli.no_color);

        let cli = Cli::try_parse_from(["hidemail", "-q", "generate"]).unwrap();
        assert!(cli.quiet);
    }

    #[test]
    fn test_cli_missing_subcommand_is_error() {
        let err = Cli::try_parse_from(["hidemail"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingSubcommand);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Cli::try_parse_from(["hidemail", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Cli::try_parse_from(["hidemail", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let err = Cli::try_parse_from(["hidemail", "generate", "--invalid-flag"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }
}
