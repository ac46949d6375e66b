//! `hidemail generate`: reserve a batch of aliases.

use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use hidemail_core::provider::ClientTimeouts;
use hidemail_core::{GenerationLoop, HttpSessionClient, LineFileSink, RecordFormat, RunStats};
use tracing::{error, info, warn};

use crate::ProcessExit;
use crate::app::config_runtime::build_run_budget;
use crate::app::{exit_handler, input_processor, progress_manager, terminal};
use crate::cli::GenerateArgs;
use crate::output;

pub(crate) async fn run_generate_command(
    args: &GenerateArgs,
    timeouts: ClientTimeouts,
    quiet: bool,
) -> Result<ProcessExit> {
    let budget = build_run_budget(args);
    if budget.requested_count == 0 {
        info!("Nothing to generate (count is 0)");
        return Ok(ProcessExit::Success);
    }

    let session = input_processor::load_session(&args.cookie_file, &args.base_url)?;
    let client = HttpSessionClient::with_timeouts(session, timeouts)
        .context("Failed to create provider client")?;

    let format = if args.detailed {
        RecordFormat::Detailed
    } else {
        RecordFormat::Address
    };
    let mut sink = LineFileSink::append(&args.output, format)
        .with_context(|| format!("Failed to open output file '{}'", args.output.display()))?;

    let interrupted = Arc::new(AtomicBool::new(false));
    spawn_interrupt_listener(Arc::clone(&interrupted));

    let stats = Arc::new(RunStats::new());
    let use_spinner = terminal::should_use_spinner(
        io::stderr().is_terminal(),
        quiet,
        terminal::is_dumb_terminal(),
    );
    let (progress_handle, progress_stop) = progress_manager::spawn_progress_ui(
        use_spinner,
        Arc::clone(&stats),
        budget.requested_count,
    );

    info!(
        count = budget.requested_count,
        label = %args.label,
        output = %args.output.display(),
        "Generating aliases"
    );

    let result = GenerationLoop::new(budget)
        .run_with(&client, &args.label, &mut sink, &stats, &interrupted)
        .await;

    progress_stop.store(true, Ordering::SeqCst);
    if let Some(handle) = progress_handle {
        let _ = handle.await;
    }

    match result {
        Ok(report) => {
            output::print_run_summary(&report, &args.label, sink.path());
            Ok(exit_handler::exit_outcome_for_report(&report))
        }
        Err(error) => {
            output::print_run_summary(error.report(), &args.label, sink.path());
            if error.is_session_rejected() {
                error!(
                    reserved = error.reserved_before_abort(),
                    output = %sink.path().display(),
                    "Session rejected"
                );
            }
            Err(error.into())
        }
    }
}

fn spawn_interrupt_listener(interrupted: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; stopping after the current request");
            interrupted.store(true, Ordering::SeqCst);
        }
    });
}
