//! Worker process creation.
//!
//! Workers are created with `fork()` so each one inherits its producer and
//! channel end by value. Nothing mutable is shared after the fork.

use super::channel::PendingChannel;
use super::handle::WorkerHandle;
use super::launcher;
use super::unit::Producer;
use crate::error::{PoolError, Result};
use nix::sys::signal::{self, Signal};
use nix::sys::wait::waitpid;
use nix::unistd::{ForkResult, Pid, fork};

/// Which side of the fork the current process is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkRole {
    /// The original process, holding the child's pid.
    Coordinator { child: Pid },
    /// The new worker process, running the given unit.
    Worker(usize),
}

/// Fork the current process for `unit`.
pub fn fork_worker(unit: usize) -> Result<ForkRole> {
    // Safety: the child never returns into the caller's stack; it runs the
    // launcher and ends in `_exit`. Locks held by other threads at the fork
    // stay held in the child, hence the single-threaded contract on
    // `Orchestrator::run`.
    match unsafe { fork() } {
        Ok(ForkResult::Parent { child }) => Ok(ForkRole::Coordinator { child }),
        Ok(ForkResult::Child) => Ok(ForkRole::Worker(unit)),
        Err(source) => Err(PoolError::Spawn { unit, source }),
    }
}

/// Spawn a worker bound to `channel` running `producer`.
///
/// In the child this never returns. In the coordinator it returns the new
/// worker's handle.
pub fn spawn_worker(channel: PendingChannel, producer: Box<dyn Producer>) -> Result<WorkerHandle> {
    let unit = channel.unit();
    match fork_worker(unit)? {
        ForkRole::Worker(unit) => launcher::run_worker(unit, producer, channel.into_worker()),
        ForkRole::Coordinator { child } => {
            drop(producer);
            match channel.into_coordinator() {
                Ok(end) => {
                    tracing::debug!(pid = child.as_raw(), unit, "Spawned worker");
                    Ok(WorkerHandle::new(child, unit, end))
                }
                Err(e) => {
                    // Untrackable without its channel: stop it now.
                    let _ = signal::kill(child, Signal::SIGKILL);
                    let _ = waitpid(child, None);
                    Err(e)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths;
    use crate::pool::channel;
    use crate::pool::config::Transport;
    use crate::pool::launcher::EXIT_CONNECT_TIMEOUT;
    use crate::pool::signals::TerminationReason;
    use std::io;
    use std::time::{Duration, Instant};

    fn wait_for_exit(handle: &mut WorkerHandle) -> TerminationReason {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            handle.pump().ok();
            if let Some(reason) = handle.try_reap().unwrap() {
                return reason;
            }
            assert!(Instant::now() < deadline, "worker never exited");
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_spawned_worker_sends_payload_and_exits_cleanly() {
        let channel = channel::open(&Transport::Pair, 3).unwrap();
        let mut handle = spawn_worker(channel, Box::new(|| Some(b" hi ".to_vec()))).unwrap();

        assert_eq!(handle.unit(), 3);
        assert_eq!(wait_for_exit(&mut handle), TerminationReason::Exited(0));
        assert_eq!(handle.collect().unwrap(), b"hi");
    }

    #[test]
    fn test_unreachable_rendezvous_exits_with_connect_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Transport::Rendezvous {
            dir: dir.path().to_path_buf(),
            connect_timeout: Duration::from_millis(100),
        };
        let channel = channel::open(&transport, 0).unwrap();
        let socket = paths::socket_path(dir.path(), std::process::id(), 0);
        let producer = Box::new(move || {
            std::fs::remove_file(&socket).ok();
            Some(b"lost".to_vec())
        });

        let mut handle = spawn_worker(channel, producer).unwrap();

        assert_eq!(
            wait_for_exit(&mut handle),
            TerminationReason::Exited(EXIT_CONNECT_TIMEOUT)
        );
        // Nothing was transmitted.
        let err = handle.collect().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }
}
