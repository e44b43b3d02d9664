//! Worker process entry point.
//!
//! Runs inside the freshly forked child: produce, send, exit. Control never
//! returns to the coordinator's call stack.

use super::channel::WorkerEnd;
use super::unit::Producer;
use crate::error::{PoolError, Result};
use nix::sys::signal::{self, SigHandler, Signal};
use std::panic::{self, AssertUnwindSafe, PanicHookInfo};

/// Exit status of a worker that delivered its payload.
pub const EXIT_OK: i32 = 0;
/// Exit status of a worker that hit a fatal local error or fault.
pub const EXIT_FAILURE: i32 = 1;
/// Exit status of a worker that could not reach the coordinator's socket.
pub const EXIT_CONNECT_TIMEOUT: i32 = 2;

/// Run one unit of work in the current (child) process and exit.
pub fn run_worker(unit: usize, producer: Box<dyn Producer>, end: WorkerEnd) -> ! {
    install_fault_hook(unit);
    reset_signals();

    let outcome = panic::catch_unwind(AssertUnwindSafe(move || send_payload(unit, producer, end)));
    let code = match outcome {
        Ok(Ok(bytes)) => {
            tracing::debug!(unit, bytes, "Worker delivered payload");
            EXIT_OK
        }
        Ok(Err(e)) => {
            tracing::error!(unit, error = %e, "Worker failed before delivering payload");
            exit_code_for(&e)
        }
        // Already reported by the fault hook.
        Err(_) => EXIT_FAILURE,
    };

    // _exit skips atexit handlers and stdio buffers inherited from the coordinator.
    // Safety: terminates the process immediately; nothing on this stack runs again.
    unsafe { nix::libc::_exit(code) }
}

/// Invoke the producer and write its trimmed output to the channel.
fn send_payload(unit: usize, mut producer: Box<dyn Producer>, end: WorkerEnd) -> Result<usize> {
    let payload = match panic::catch_unwind(AssertUnwindSafe(|| producer.produce())) {
        Ok(Some(payload)) => payload,
        Ok(None) => Vec::new(),
        Err(_) => {
            tracing::warn!(unit, "Producer panicked, sending an empty payload");
            Vec::new()
        }
    };
    end.send(trim_payload(&payload))
}

/// Strip surrounding ASCII whitespace from a payload.
pub fn trim_payload(payload: &[u8]) -> &[u8] {
    payload.trim_ascii()
}

/// Map a worker error onto its exit status.
pub fn exit_code_for(err: &PoolError) -> i32 {
    match err {
        PoolError::ConnectTimeout { .. } => EXIT_CONNECT_TIMEOUT,
        _ => EXIT_FAILURE,
    }
}

/// Report any panic in this process before it exits.
fn install_fault_hook(unit: usize) {
    panic::set_hook(Box::new(move |info| {
        let pid = std::process::id();
        let message = panic_message(info);
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown".to_string());

        if tracing::enabled!(tracing::Level::ERROR) {
            tracing::error!(pid, unit, %location, "Worker panicked: {}", message);
        } else {
            eprintln!("forkpool worker {pid} (unit {unit}) panicked at {location}: {message}");
        }
    }));
}

fn panic_message(info: &PanicHookInfo<'_>) -> String {
    if let Some(s) = info.payload().downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = info.payload().downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Give the worker default interrupt handling so eviction terminates it, and
/// turn broken pipes into write errors.
fn reset_signals() {
    // Safety: the child is single-threaded right after fork and neither
    // disposition installs a Rust handler.
    unsafe {
        signal::signal(Signal::SIGINT, SigHandler::SigDfl).ok();
        signal::signal(Signal::SIGPIPE, SigHandler::SigIgn).ok();
    }
}
