//! Time-budget eviction for overdue workers.
//!
//! An evicted worker's channel is closed unread, its handle leaves the pool,
//! and it is sent an interrupt. The process is not tracked afterwards: if it
//! ignores the interrupt it lives on as an orphan until it exits by itself,
//! and an exited one stays a zombie until the coordinator exits.

use super::handle::Pool;
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use std::time::{Duration, Instant};

/// Signal delivered to overdue workers.
pub const EVICTION_SIGNAL: Signal = Signal::SIGINT;

/// Record of one eviction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eviction {
    pub pid: Pid,
    pub unit: usize,
    pub elapsed: Duration,
    /// Bytes the worker had already written, now discarded.
    pub discarded_bytes: usize,
}

/// Decides which workers have exceeded their time budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionPolicy {
    budget: Option<Duration>,
}

impl EvictionPolicy {
    /// `None` disables eviction.
    pub fn new(budget: Option<Duration>) -> Self {
        Self { budget }
    }

    pub fn budget(&self) -> Option<Duration> {
        self.budget
    }

    /// A worker is overdue once its elapsed time reaches the budget.
    pub fn is_overdue(&self, elapsed: Duration) -> bool {
        self.budget.is_some_and(|budget| elapsed >= budget)
    }

    /// Pids of every overdue worker at `now`.
    pub fn overdue(&self, pool: &Pool, now: Instant) -> Vec<Pid> {
        if self.budget.is_none() {
            return Vec::new();
        }
        pool.handles()
            .filter(|handle| self.is_overdue(handle.elapsed(now)))
            .map(|handle| handle.pid())
            .collect()
    }

    /// Evict every overdue worker from `pool`.
    pub fn sweep(&self, pool: &mut Pool, now: Instant) -> Vec<Eviction> {
        let mut evicted = Vec::new();
        for pid in self.overdue(pool, now) {
            let Some(handle) = pool.remove(pid) else {
                continue;
            };
            let unit = handle.unit();
            let elapsed = handle.elapsed(now);

            // Take the pid out before signalling so it is never addressed again.
            let signal_result = handle.signal(EVICTION_SIGNAL);
            let discarded_bytes = handle.discard();

            tracing::warn!(
                pid = pid.as_raw(),
                unit,
                elapsed_ms = elapsed.as_millis() as u64,
                discarded_bytes,
                "Worker exceeded its time budget, evicting"
            );
            if let Err(e) = signal_result {
                tracing::debug!(pid = pid.as_raw(), error = %e, "Evicted worker could not be signalled");
            }

            evicted.push(Eviction {
                pid,
                unit,
                elapsed,
                discarded_bytes,
            });
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::channel;
    use crate::pool::config::Transport;
    use crate::pool::handle::WorkerHandle;
    use nix::sys::wait::waitpid;
    use std::process::Command;

    fn tracked_sleeper(pool: &mut Pool, unit: usize) -> Pid {
        let child = Command::new("sleep")
            .arg("60")
            .spawn()
            .expect("Failed to spawn sleep");
        let pid = Pid::from_raw(child.id() as i32);
        let end = channel::open(&Transport::Pair, unit)
            .unwrap()
            .into_coordinator()
            .unwrap();
        pool.insert(WorkerHandle::new(pid, unit, end));
        pid
    }

    #[test]
    fn test_unlimited_budget_never_overdue() {
        let policy = EvictionPolicy::new(None);
        assert!(!policy.is_overdue(Duration::from_secs(u32::MAX as u64)));
    }

    #[test]
    fn test_budget_boundary_is_inclusive() {
        let policy = EvictionPolicy::new(Some(Duration::from_secs(2)));
        assert!(!policy.is_overdue(Duration::from_millis(1999)));
        assert!(policy.is_overdue(Duration::from_secs(2)));
        assert!(policy.is_overdue(Duration::from_secs(3)));
    }

    #[test]
    fn test_sweep_skips_everything_without_budget() {
        let mut pool = Pool::new();
        let pid = tracked_sleeper(&mut pool, 0);
        let far_future = Instant::now() + Duration::from_secs(3600);

        assert!(EvictionPolicy::new(None).sweep(&mut pool, far_future).is_empty());
        assert_eq!(pool.len(), 1);

        let handle = pool.remove(pid).unwrap();
        handle.signal(Signal::SIGKILL).unwrap();
        waitpid(pid, None).unwrap();
    }

    #[test]
    fn test_sweep_evicts_and_interrupts_overdue_workers() {
        let mut pool = Pool::new();
        let pid = tracked_sleeper(&mut pool, 5);
        let policy = EvictionPolicy::new(Some(Duration::from_secs(1)));

        assert!(policy.sweep(&mut pool, Instant::now()).is_empty());

        let later = Instant::now() + Duration::from_secs(2);
        let evicted = policy.sweep(&mut pool, later);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].pid, pid);
        assert_eq!(evicted[0].unit, 5);
        assert_eq!(evicted[0].discarded_bytes, 0);
        assert!(pool.is_empty());

        // The sleeper received SIGINT.
        let status = waitpid(pid, None).unwrap();
        assert_eq!(
            crate::pool::signals::analyze_wait_status(status),
            crate::pool::signals::TerminationReason::Signaled(Signal::SIGINT)
        );
    }
}
