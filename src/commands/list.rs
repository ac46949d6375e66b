//! `hidemail list`: show existing aliases.

use anyhow::{Context, Result};
use hidemail_core::provider::ClientTimeouts;
use hidemail_core::{HttpSessionClient, ListedAlias};
use regex::Regex;
use tracing::info;

use crate::ProcessExit;
use crate::app::input_processor;
use crate::cli::ListArgs;
use crate::output;

pub(crate) async fn run_list_command(
    args: &ListArgs,
    timeouts: ClientTimeouts,
) -> Result<ProcessExit> {
    let search = args
        .search
        .as_deref()
        .map(Regex::new)
        .transpose()
        .context("Invalid --search pattern")?;

    let session = input_processor::load_session(&args.cookie_file, &args.base_url)?;
    let client = HttpSessionClient::with_timeouts(session, timeouts)
        .context("Failed to create provider client")?;

    let aliases = client
        .list_aliases()
        .await
        .context("Failed to list aliases")?;

    let shown = filter_aliases(&aliases, !args.inactive, search.as_ref());
    output::print_alias_table(&shown);
    info!(total = aliases.len(), shown = shown.len(), "Listed aliases");

    if let Some(path) = &args.output {
        output::write_alias_file(path, &aliases)?;
        info!(path = %path.display(), count = aliases.len(), "Wrote alias list");
    }

    Ok(ProcessExit::Success)
}

/// Keeps aliases with the wanted activity whose label matches `search`.
pub(crate) fn filter_aliases<'a>(
    aliases: &'a [ListedAlias],
    active: bool,
    search: Option<&Regex>,
) -> Vec<&'a ListedAlias> {
    aliases
        .iter()
        .filter(|alias| alias.active == active)
        .filter(|alias| search.is_none_or(|pattern| pattern.is_match(&alias.label)))
        .collect()
}
