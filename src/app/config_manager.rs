//! Configuration lifecycle: load file config, merge CLI, resolve client timeouts.

use anyhow::Result;
use hidemail_core::provider::ClientTimeouts;
use tracing::debug;

use crate::app::config_runtime::{self, CliValueSources};
use crate::app_config::{FileConfig, load_default_file_config};
use crate::cli::{Cli, Command};

/// Effective command plus the settings that do not live on the command line.
pub(crate) struct ResolvedConfig {
    pub(crate) cli: Cli,
    pub(crate) timeouts: ClientTimeouts,
}

/// Loads the default config file and merges it under the command line.
pub(crate) fn resolve_config(cli: Cli, cli_sources: &CliValueSources) -> Result<ResolvedConfig> {
    let loaded = load_default_file_config()?;
    if let Some(path) = &loaded.path {
        debug!(
            path = %path.display(),
            loaded = loaded.config.is_some(),
            "config file lookup"
        );
    }
    merge_config(cli, cli_sources, loaded.config.as_ref())
}

pub(crate) fn merge_config(
    mut cli: Cli,
    cli_sources: &CliValueSources,
    file_config: Option<&FileConfig>,
) -> Result<ResolvedConfig> {
    config_runtime::apply_config_verbosity(&mut cli, cli_sources, file_config);
    cli.command = match cli.command {
        Command::Generate(args) => Command::Generate(config_runtime::apply_generate_defaults(
            args,
            cli_sources,
            file_config,
        )?),
        Command::List(args) => Command::List(config_runtime::apply_list_defaults(
            args,
            cli_sources,
            file_config,
        )),
    };
    let timeouts = config_runtime::resolve_client_timeouts(file_config);
    Ok(ResolvedConfig { cli, timeouts })
}

#[cfg(test)]
mod tests {
    use super::merge_config;
    use crate::app::config_runtime::CliValueSources;
    use crate::app_config::FileConfig;
    use crate::cli::{Cli, Command};
    use clap::Parser;

    #[test]
    fn test_merge_config_no_config_file_returns_defaults() {
        let cli = Cli::try_parse_from(["hidemail", "generate"]).unwrap();
        let resolved = merge_config(cli, &CliValueSources::default(), None).unwrap();

        let Command::Generate(args) = resolved.cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.count, 5);
        assert_eq!(resolved.timeouts.connect_timeout_secs, 10);
        assert_eq!(resolved.timeouts.read_timeout_secs, 30);
    }

    #[test]
    fn test_merge_config_rejects_invalid_effective_values() {
        let cli = Cli::try_parse_from(["hidemail", "generate"]).unwrap();
        let config = FileConfig {
            label: Some(String::new()),
            ..FileConfig::default()
        };
        assert!(merge_config(cli, &CliValueSources::default(), Some(&config)).is_err());
    }
}
