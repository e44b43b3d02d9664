//! Handles for live worker processes and the set that tracks them.

use super::channel::{CoordinatorEnd, StreamState};
use super::signals::{TerminationReason, analyze_wait_status};
use crate::error::{PoolError, Result};
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use std::collections::HashMap;
use std::io;
use std::time::{Duration, Instant};

/// Lifecycle of a tracked worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerState {
    /// Spawned and not yet seen to exit.
    Running,
    /// Reaped by the coordinator.
    Exited(TerminationReason),
}

/// Coordinator-side record of one worker process.
pub struct WorkerHandle {
    pid: Pid,
    unit: usize,
    channel: CoordinatorEnd,
    started: Instant,
    state: WorkerState,
}

impl WorkerHandle {
    pub fn new(pid: Pid, unit: usize, channel: CoordinatorEnd) -> Self {
        Self {
            pid,
            unit,
            channel,
            started: Instant::now(),
            state: WorkerState::Running,
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Index of the producer this worker runs.
    pub fn unit(&self) -> usize {
        self.unit
    }

    pub fn state(&self) -> &WorkerState {
        &self.state
    }

    /// Time since the worker was spawned.
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started)
    }

    /// Buffer whatever the worker has written so far, without blocking.
    pub fn pump(&mut self) -> io::Result<StreamState> {
        self.channel.pump()
    }

    /// Check whether the worker has exited (non-blocking).
    ///
    /// Returns the termination reason once the process is gone. A pid that
    /// is no longer our child reports [`TerminationReason::Unknown`].
    pub fn try_reap(&mut self) -> Result<Option<TerminationReason>> {
        if let WorkerState::Exited(reason) = &self.state {
            return Ok(Some(reason.clone()));
        }
        let reason = match waitpid(self.pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => return Ok(None),
            Ok(status) => analyze_wait_status(status),
            Err(Errno::ECHILD) => TerminationReason::Unknown,
            Err(e) => return Err(PoolError::Worker(format!("waitpid failed: {}", e))),
        };
        if !reason.is_terminal() {
            return Ok(None);
        }
        self.state = WorkerState::Exited(reason.clone());
        Ok(Some(reason))
    }

    /// Read the remaining payload to end-of-stream and close the channel.
    pub fn collect(self) -> io::Result<Vec<u8>> {
        self.channel.finish()
    }

    /// Close the channel unread. Returns how many buffered bytes were dropped.
    pub fn discard(self) -> usize {
        self.channel.discard()
    }

    /// Send `sig` to the worker.
    pub fn signal(&self, sig: Signal) -> Result<()> {
        signal::kill(self.pid, sig)
            .map_err(|e| PoolError::Worker(format!("Failed to send {:?}: {}", sig, e)))
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("pid", &self.pid)
            .field("unit", &self.unit)
            .field("received", &self.channel.received_len())
            .field("state", &self.state)
            .finish()
    }
}

/// The set of tracked workers, keyed by pid.
#[derive(Debug, Default)]
pub struct Pool {
    workers: HashMap<Pid, WorkerHandle>,
    peak: usize,
}

impl Pool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a worker.
    pub fn insert(&mut self, handle: WorkerHandle) {
        self.workers.insert(handle.pid(), handle);
        self.peak = self.peak.max(self.workers.len());
    }

    /// Stop tracking a worker. The pid is never addressed again.
    pub fn remove(&mut self, pid: Pid) -> Option<WorkerHandle> {
        self.workers.remove(&pid)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Largest number of workers tracked at once.
    pub fn peak(&self) -> usize {
        self.peak
    }

    pub fn handles(&self) -> impl Iterator<Item = &WorkerHandle> {
        self.workers.values()
    }

    pub fn handles_mut(&mut self) -> impl Iterator<Item = &mut WorkerHandle> {
        self.workers.values_mut()
    }
}
