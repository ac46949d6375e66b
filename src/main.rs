//! CLI entry point for hidemail.

use anyhow::Result;

mod app;
mod app_config;
mod cli;
mod commands;
mod output;

/// Process outcome, mapped to the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// Every requested alias was reserved (or none were requested).
    Success,
    /// Some aliases were reserved, some failed.
    Partial,
    /// Nothing was reserved, or the run was interrupted.
    Failure,
}

impl ProcessExit {
    fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Partial => 2,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let exit = app::runtime::run_hidemail().await?;
    if exit != ProcessExit::Success {
        std::process::exit(exit.code());
    }
    Ok(())
}
