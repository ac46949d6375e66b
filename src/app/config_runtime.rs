use std::time::Duration;

use anyhow::{Result, bail};
use clap::{ArgMatches, CommandFactory, FromArgMatches, parser::ValueSource};
use hidemail_core::generate::{DEFAULT_TRANSIENT_BACKOFF, RunBudget};
use hidemail_core::provider::ClientTimeouts;

use crate::app_config::{FileConfig, VerbositySetting};
use crate::cli::{Cli, Command, GenerateArgs, ListArgs};

/// Which options were given on the command line (and therefore beat the file config).
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CliValueSources {
    pub(crate) verbose: bool,
    pub(crate) quiet: bool,
    pub(crate) cookie_file: bool,
    pub(crate) label: bool,
    pub(crate) count: bool,
    pub(crate) max_attempts: bool,
    pub(crate) delay_ms: bool,
    pub(crate) max_backoff_secs: bool,
    pub(crate) cooldown_every: bool,
    pub(crate) cooldown_secs: bool,
    pub(crate) output: bool,
    pub(crate) detailed: bool,
    pub(crate) base_url: bool,
}

pub(crate) fn parse_cli_with_sources() -> (Cli, CliValueSources) {
    let command = Cli::command();
    let matches = command.get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());
    let sources = sources_from_matches(&matches);
    (cli, sources)
}

pub(crate) fn sources_from_matches(matches: &ArgMatches) -> CliValueSources {
    let mut sources = CliValueSources {
        verbose: is_commandline_value(matches, "verbose"),
        quiet: is_commandline_value(matches, "quiet"),
        ..CliValueSources::default()
    };

    match matches.subcommand() {
        Some(("generate", sub)) => {
            sources.verbose |= is_commandline_value(sub, "verbose");
            sources.quiet |= is_commandline_value(sub, "quiet");
            sources.cookie_file = is_commandline_value(sub, "cookie_file");
            sources.label = is_commandline_value(sub, "label");
            sources.count = is_commandline_value(sub, "count");
            sources.max_attempts = is_commandline_value(sub, "max_attempts");
            sources.delay_ms = is_commandline_value(sub, "delay_ms");
            sources.max_backoff_secs = is_commandline_value(sub, "max_backoff_secs");
            sources.cooldown_every = is_commandline_value(sub, "cooldown_every");
            sources.cooldown_secs = is_commandline_value(sub, "cooldown_secs");
            sources.output = is_commandline_value(sub, "output");
            sources.detailed = is_commandline_value(sub, "detailed");
            sources.base_url = is_commandline_value(sub, "base_url");
        }
        Some(("list", sub)) => {
            sources.verbose |= is_commandline_value(sub, "verbose");
            sources.quiet |= is_commandline_value(sub, "quiet");
            sources.cookie_file = is_commandline_value(sub, "cookie_file");
            sources.output = is_commandline_value(sub, "output");
            sources.base_url = is_commandline_value(sub, "base_url");
        }
        _ => {}
    }
    sources
}

fn is_commandline_value(matches: &ArgMatches, id: &str) -> bool {
    matches.value_source(id) == Some(ValueSource::CommandLine)
}

/// Applies file config values to `generate` options not set on the command line.
pub(crate) fn apply_generate_defaults(
    mut args: GenerateArgs,
    cli_sources: &CliValueSources,
    file_config: Option<&FileConfig>,
) -> Result<GenerateArgs> {
    if let Some(file_config) = file_config {
        if !cli_sources.cookie_file
            && let Some(cookie_file) = &file_config.cookie_file
        {
            args.cookie_file = cookie_file.clone();
        }
        if !cli_sources.label
            && let Some(label) = &file_config.label
        {
            args.label = label.clone();
        }
        if !cli_sources.count
            && let Some(count) = file_config.count
        {
            args.count = count;
        }
        if !cli_sources.max_attempts
            && let Some(max_attempts) = file_config.max_attempts
        {
            args.max_attempts = max_attempts;
        }
        if !cli_sources.delay_ms
            && let Some(delay_ms) = file_config.delay_ms
        {
            args.delay_ms = delay_ms;
        }
        if !cli_sources.max_backoff_secs
            && let Some(max_backoff_secs) = file_config.max_backoff_secs
        {
            args.max_backoff_secs = max_backoff_secs;
        }
        if !cli_sources.cooldown_every
            && let Some(cooldown_every) = file_config.cooldown_every
        {
            args.cooldown_every = cooldown_every;
        }
        if !cli_sources.cooldown_secs
            && let Some(cooldown_secs) = file_config.cooldown_secs
        {
            args.cooldown_secs = cooldown_secs;
        }
        if !cli_sources.output
            && let Some(output) = &file_config.output
        {
            args.output = output.clone();
        }
        if !cli_sources.detailed
            && !args.detailed
            && let Some(detailed) = file_config.detailed
        {
            args.detailed = detailed;
        }
        if !cli_sources.base_url
            && let Some(base_url) = &file_config.base_url
        {
            args.base_url = base_url.clone();
        }
    }

    if args.label.trim().is_empty() {
        bail!("Invalid effective label: must not be empty");
    }
    if !(1..=10).contains(&args.max_attempts) {
        bail!(
            "Invalid effective max_attempts value: {}. Expected range: 1..=10",
            args.max_attempts
        );
    }

    Ok(args)
}

/// Applies file config values to `list` options not set on the command line.
pub(crate) fn apply_list_defaults(
    mut args: ListArgs,
    cli_sources: &CliValueSources,
    file_config: Option<&FileConfig>,
) -> ListArgs {
    let Some(file_config) = file_config else {
        return args;
    };
    if !cli_sources.cookie_file
        && let Some(cookie_file) = &file_config.cookie_file
    {
        args.cookie_file = cookie_file.clone();
    }
    if !cli_sources.base_url
        && let Some(base_url) = &file_config.base_url
    {
        args.base_url = base_url.clone();
    }
    args
}

/// Applies the config verbosity when neither `-v` nor `-q` was given.
pub(crate) fn apply_config_verbosity(
    cli: &mut Cli,
    cli_sources: &CliValueSources,
    file_config: Option<&FileConfig>,
) {
    if cli_sources.verbose || cli_sources.quiet {
        return;
    }
    let Some(verbosity) = file_config.and_then(|config| config.verbosity) else {
        return;
    };
    let (verbose, quiet) = match verbosity {
        VerbositySetting::Default => (0, false),
        VerbositySetting::Verbose => (1, false),
        VerbositySetting::Quiet => (0, true),
        VerbositySetting::Debug => (2, false),
    };
    cli.verbose = verbose;
    cli.quiet = quiet;
}

/// Builds the run budget from effective `generate` options.
pub(crate) fn build_run_budget(args: &GenerateArgs) -> RunBudget {
    RunBudget {
        requested_count: args.count,
        max_attempts_per_alias: args.max_attempts,
        delay_between_requests: Duration::from_millis(args.delay_ms),
        max_backoff: Duration::from_secs(args.max_backoff_secs),
        transient_backoff: DEFAULT_TRANSIENT_BACKOFF,
        cooldown_every: args.cooldown_every,
        cooldown: Duration::from_secs(args.cooldown_secs),
    }
}

pub(crate) fn resolve_client_timeouts(file_config: Option<&FileConfig>) -> ClientTimeouts {
    let mut timeouts = ClientTimeouts::default();
    let Some(file_config) = file_config else {
        return timeouts;
    };
    if let Some(value) = file_config.connect_timeout_secs {
        timeouts.connect_timeout_secs = value;
    }
    if let Some(value) = file_config.read_timeout_secs {
        timeouts.read_timeout_secs = value;
    }
    timeouts
}

pub(crate) fn resolve_default_log_level(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

pub(crate) fn should_force_cli_log_level(cli_sources: &CliValueSources) -> bool {
    cli_sources.verbose || cli_sources.quiet
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::Parser;

    use super::*;

    fn parse(argv: &[&str]) -> (Cli, CliValueSources) {
        let matches = Cli::command().try_get_matches_from(argv).unwrap();
        let cli = Cli::from_arg_matches(&matches).unwrap();
        (cli, sources_from_matches(&matches))
    }

    fn generate(cli: Cli) -> GenerateArgs {
        match cli.command {
            Command::Generate(args) => args,
            Command::List(_) => panic!("expected generate"),
        }
    }

    #[test]
    fn test_sources_track_commandline_values_only() {
        let (_, sources) = parse(&["hidemail", "generate", "-n", "3", "--label", "x"]);
        assert!(sources.count);
        assert!(sources.label);
        assert!(!sources.delay_ms);
        assert!(!sources.output);
        assert!(!sources.verbose);
    }

    #[test]
    fn test_sources_global_flag_after_subcommand() {
        let (_, sources) = parse(&["hidemail", "list", "-v"]);
        assert!(sources.verbose);
        assert!(!sources.count);
    }

    #[test]
    fn test_file_config_fills_unset_generate_options() {
        let (cli, sources) = parse(&["hidemail", "generate", "-n", "2"]);
        let config = FileConfig {
            count: Some(9),
            label: Some("from-file".to_string()),
            delay_ms: Some(0),
            detailed: Some(true),
            ..FileConfig::default()
        };
        let args = apply_generate_defaults(generate(cli), &sources, Some(&config)).unwrap();
        assert_eq!(args.count, 2, "CLI value wins");
        assert_eq!(args.label, "from-file");
        assert_eq!(args.delay_ms, 0);
        assert!(args.detailed);
    }

    #[test]
    fn test_generate_defaults_without_file_config() {
        let (cli, sources) = parse(&["hidemail", "generate"]);
        let args = apply_generate_defaults(generate(cli), &sources, None).unwrap();
        assert_eq!(args.count, 5);
        assert_eq!(args.output, PathBuf::from("emails.txt"));
    }

    #[test]
    fn test_empty_label_rejected() {
        let (cli, sources) = parse(&["hidemail", "generate", "--label", " "]);
        assert!(apply_generate_defaults(generate(cli), &sources, None).is_err());
    }

    #[test]
    fn test_list_defaults_take_cookie_file_from_config() {
        let (cli, sources) = parse(&["hidemail", "list"]);
        let Command::List(args) = cli.command else {
            panic!("expected list");
        };
        let config = FileConfig {
            cookie_file: Some(PathBuf::from("/secure/cookie.txt")),
            ..FileConfig::default()
        };
        let args = apply_list_defaults(args, &sources, Some(&config));
        assert_eq!(args.cookie_file, PathBuf::from("/secure/cookie.txt"));
    }

    #[test]
    fn test_config_verbosity_applies_only_without_cli_flags() {
        let config = FileConfig {
            verbosity: Some(VerbositySetting::Quiet),
            ..FileConfig::default()
        };

        let (mut cli, sources) = parse(&["hidemail", "generate"]);
        apply_config_verbosity(&mut cli, &sources, Some(&config));
        assert!(cli.quiet);

        let (mut cli, sources) = parse(&["hidemail", "-v", "generate"]);
        apply_config_verbosity(&mut cli, &sources, Some(&config));
        assert!(!cli.quiet);
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn test_build_run_budget_maps_units() {
        let args = generate(Cli::try_parse_from(["hidemail", "generate", "-l", "250"]).unwrap());
        let budget = build_run_budget(&args);
        assert_eq!(budget.requested_count, 5);
        assert_eq!(budget.delay_between_requests, Duration::from_millis(250));
        assert_eq!(budget.max_backoff, Duration::from_secs(300));
        assert_eq!(budget.cooldown, Duration::from_secs(1800));
    }

    #[test]
    fn test_resolve_client_timeouts_overrides() {
        let config = FileConfig {
            read_timeout_secs: Some(90),
            ..FileConfig::default()
        };
        let timeouts = resolve_client_timeouts(Some(&config));
        assert_eq!(timeouts.connect_timeout_secs, 10);
        assert_eq!(timeouts.read_timeout_secs, 90);
    }

    #[test]
    fn test_resolve_default_log_level() {
        assert_eq!(resolve_default_log_level(0, false), "info");
        assert_eq!(resolve_default_log_level(1, false), "debug");
        assert_eq!(resolve_default_log_level(3, false), "trace");
        assert_eq!(resolve_default_log_level(2, true), "error");
    }
}
