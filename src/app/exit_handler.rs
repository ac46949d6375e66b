//! Exit code logic for the hidemail process.
//!
//! Single responsibility: map a run report to the process exit outcome.

use hidemail_core::RunReport;

use crate::ProcessExit;

/// Determines the process exit outcome from reserved and failed alias counts.
pub(crate) fn determine_exit_outcome(reserved: usize, failed: usize) -> ProcessExit {
    if failed == 0 {
        ProcessExit::Success
    } else if reserved > 0 {
        ProcessExit::Partial
    } else {
        ProcessExit::Failure
    }
}

/// Interrupted runs are failures regardless of what they reserved.
pub(crate) fn exit_outcome_for_report(report: &RunReport) -> ProcessExit {
    if report.interrupted {
        return ProcessExit::Failure;
    }
    determine_exit_outcome(report.reserved(), report.failed())
}
