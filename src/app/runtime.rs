use anyhow::Result;
use tracing::{debug, info};

use crate::app::{config_manager, config_runtime, terminal};
use crate::cli::Command;
use crate::{ProcessExit, commands};

pub(crate) async fn run_hidemail() -> Result<ProcessExit> {
    let (cli, cli_sources) = config_runtime::parse_cli_with_sources();
    let resolved = config_manager::resolve_config(cli, &cli_sources)?;
    let cli = resolved.cli;

    let default_level = config_runtime::resolve_default_log_level(cli.verbose, cli.quiet);
    let force_cli_log_level = config_runtime::should_force_cli_log_level(&cli_sources);
    let no_color = terminal::is_no_color_requested(cli.no_color);
    terminal::init_tracing(default_level, force_cli_log_level, no_color);

    debug!(?cli, "CLI arguments resolved");
    info!("hidemail starting");

    match &cli.command {
        Command::Generate(args) => {
            commands::run_generate_command(args, resolved.timeouts, cli.quiet).await
        }
        Command::List(args) => commands::run_list_command(args, resolved.timeouts).await,
    }
}
