//! Termination analysis for worker processes.
//!
//! Turns raw wait statuses into reasons the orchestrator can log and act on.

use super::launcher::{EXIT_CONNECT_TIMEOUT, EXIT_FAILURE};
use nix::sys::signal::Signal;
use nix::sys::wait::WaitStatus;

/// Reason why a worker process terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    /// Normal exit with status code.
    Exited(i32),
    /// Killed by signal.
    Signaled(Signal),
    /// Process is still running.
    StillAlive,
    /// The status could not be determined (e.g. the pid was reaped elsewhere).
    Unknown,
}

impl TerminationReason {
    /// Check if this is a clean exit with status 0.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }

    /// Check if the process has finished one way or another.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::StillAlive)
    }

    /// Get a human-readable description.
    pub fn description(&self) -> String {
        match self {
            Self::Exited(0) => "exited successfully".to_string(),
            Self::Exited(EXIT_CONNECT_TIMEOUT) => {
                format!("exited with code {} (connect timeout)", EXIT_CONNECT_TIMEOUT)
            }
            Self::Exited(EXIT_FAILURE) => {
                format!("exited with code {} (worker fault)", EXIT_FAILURE)
            }
            Self::Exited(code) => format!("exited with code {}", code),
            Self::Signaled(sig) => format!("killed by signal {:?}", sig),
            Self::StillAlive => "still running".to_string(),
            Self::Unknown => "unknown reason".to_string(),
        }
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Analyze a `WaitStatus` to determine the termination reason.
pub fn analyze_wait_status(status: WaitStatus) -> TerminationReason {
    match status {
        WaitStatus::Exited(_, code) => TerminationReason::Exited(code),
        WaitStatus::Signaled(_, signal, _) => TerminationReason::Signaled(signal),
        WaitStatus::StillAlive => TerminationReason::StillAlive,
        // Stopped/continued children have not terminated.
        WaitStatus::Stopped(..) | WaitStatus::Continued(_) => TerminationReason::StillAlive,
        #[allow(unreachable_patterns)]
        _ => TerminationReason::Unknown,
    }
}
