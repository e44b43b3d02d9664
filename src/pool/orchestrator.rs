//! The process-pool orchestrator.
//!
//! Spawns one worker per producer, keeps at most `admission_limit` of them
//! alive, reaps finished workers and hands their payloads to the consumer,
//! and evicts workers that exceed the time budget.

use super::channel;
use super::config::PoolConfig;
use super::eviction::EvictionPolicy;
use super::handle::{Pool, WorkerHandle};
use super::signals::TerminationReason;
use super::spawn;
use super::unit::{Consumer, Producer};
use crate::error::{PoolError, Result};
use nix::unistd::Pid;
use serde::Serialize;
use std::thread;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Outcome counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Producers handed to the run.
    pub units: usize,
    /// Workers successfully forked.
    pub spawned: usize,
    /// Payloads handed to the consumer, one per reaped worker.
    pub delivered: usize,
    /// Delivered workers that exited abnormally (non-zero status, signal, or
    /// unknown). Their payload is whatever reached the channel.
    pub failed: usize,
    /// Workers evicted for exceeding the time budget.
    pub evicted: usize,
    /// Units skipped because the channel or process could not be created.
    pub spawn_failures: usize,
    /// Largest number of workers alive at once.
    pub peak_workers: usize,
    /// Wall-clock duration of the run in milliseconds.
    pub elapsed_ms: u64,
}

/// What a single scheduler tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub reaped: usize,
    pub evicted: usize,
}

/// Runs each producer in its own worker process and feeds results to one consumer.
pub struct Orchestrator<C: Consumer> {
    consumer: C,
    producers: Vec<Box<dyn Producer>>,
    config: PoolConfig,
}

impl<C: Consumer> Orchestrator<C> {
    /// Create an orchestrator with unlimited admission and time budget.
    pub fn new(consumer: C, producers: Vec<Box<dyn Producer>>) -> Self {
        Self {
            consumer,
            producers,
            config: PoolConfig::default(),
        }
    }

    /// Append one more unit of work.
    pub fn add_producer(&mut self, producer: impl Producer + 'static) -> &mut Self {
        self.producers.push(Box::new(producer));
        self
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the admission limit and time budget (0 = unlimited for both).
    ///
    /// Negative values are rejected before anything is spawned.
    pub fn configure(mut self, admission_limit: i64, time_budget_secs: i64) -> Result<Self> {
        self.config = self
            .config
            .with_admission_limit(admission_limit)?
            .with_time_budget(time_budget_secs)?;
        Ok(self)
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Number of units not yet run.
    pub fn pending_units(&self) -> usize {
        self.producers.len()
    }

    pub fn consumer(&self) -> &C {
        &self.consumer
    }

    pub fn into_consumer(self) -> C {
        self.consumer
    }

    /// Run every pending unit to completion.
    ///
    /// Returns once every worker has been reaped or evicted and every
    /// payload has been delivered. Each unit runs at most once; a second call
    /// has nothing left to run.
    ///
    /// Workers are forked from the calling process, so call this from a
    /// single-threaded process. A fork copies only the calling thread: a lock
    /// another thread holds at that moment (allocator, logging sink, stdio)
    /// stays locked forever in the worker, which then hangs until evicted.
    #[instrument(level = "debug", skip(self), fields(units = self.producers.len()))]
    pub fn run(&mut self) -> Result<RunReport> {
        let started = Instant::now();
        let producers = std::mem::take(&mut self.producers);
        let limit = self.config.admission_limit();
        let eviction = EvictionPolicy::new(self.config.time_budget());

        let mut report = RunReport {
            units: producers.len(),
            ..Default::default()
        };
        let mut pool = Pool::new();

        info!(
            units = report.units,
            admission_limit = limit,
            time_budget_secs = self.config.time_budget_secs(),
            transport = self.config.transport().name(),
            "Starting worker pool"
        );

        for (unit, producer) in producers.into_iter().enumerate() {
            match self.spawn(unit, producer) {
                Ok(handle) => {
                    pool.insert(handle);
                    report.spawned += 1;
                }
                Err(e) => {
                    warn!(unit, error = %e, "Skipping unit, worker could not be started");
                    report.spawn_failures += 1;
                }
            }

            if limit > 0 && pool.len() >= limit {
                self.drain_to(&mut pool, &eviction, limit - 1, &mut report);
            }
        }
        self.drain_to(&mut pool, &eviction, 0, &mut report);

        report.peak_workers = pool.peak();
        report.elapsed_ms = started.elapsed().as_millis() as u64;

        if report.units > 0 && report.spawned == 0 {
            return Err(PoolError::SpawnExhausted(report.units));
        }

        info!(
            delivered = report.delivered,
            failed = report.failed,
            evicted = report.evicted,
            spawn_failures = report.spawn_failures,
            elapsed_ms = report.elapsed_ms,
            "Worker pool finished"
        );
        Ok(report)
    }

    fn spawn(&self, unit: usize, producer: Box<dyn Producer>) -> Result<WorkerHandle> {
        let channel = channel::open(self.config.transport(), unit)?;
        spawn::spawn_worker(channel, producer)
    }

    /// Tick until at most `target` workers remain, sleeping whenever a tick
    /// reaps nothing.
    fn drain_to(
        &mut self,
        pool: &mut Pool,
        eviction: &EvictionPolicy,
        target: usize,
        report: &mut RunReport,
    ) {
        while pool.len() > target {
            let outcome = self.tick(pool, eviction, report);
            if outcome.reaped == 0 && pool.len() > target {
                thread::sleep(self.config.poll_interval());
            }
        }
    }

    /// One scheduler step: buffer channel data, reap exited workers, and run
    /// the eviction sweep when nothing was reaped.
    pub fn tick(
        &mut self,
        pool: &mut Pool,
        eviction: &EvictionPolicy,
        report: &mut RunReport,
    ) -> TickOutcome {
        let mut exited: Vec<(Pid, TerminationReason)> = Vec::new();

        for handle in pool.handles_mut() {
            if let Err(e) = handle.pump() {
                debug!(pid = handle.pid().as_raw(), error = %e, "Channel read failed");
            }
            match handle.try_reap() {
                Ok(Some(reason)) => exited.push((handle.pid(), reason)),
                Ok(None) => {}
                Err(e) => warn!(pid = handle.pid().as_raw(), error = %e, "Could not poll worker"),
            }
        }

        let mut outcome = TickOutcome {
            reaped: exited.len(),
            evicted: 0,
        };

        for (pid, reason) in exited {
            if let Some(handle) = pool.remove(pid) {
                self.finalize(handle, reason, report);
            }
        }

        if outcome.reaped == 0 {
            outcome.evicted = eviction.sweep(pool, Instant::now()).len();
            report.evicted += outcome.evicted;
        }
        outcome
    }

    /// Deliver whatever a reaped worker left in its channel, possibly nothing.
    ///
    /// Abnormal exits are still delivered; they are logged and counted as
    /// failed. Only eviction withholds a payload.
    fn finalize(&mut self, handle: WorkerHandle, reason: TerminationReason, report: &mut RunReport) {
        let pid = handle.pid().as_raw();
        let unit = handle.unit();

        if !reason.is_success() {
            warn!(pid, unit, reason = %reason, "Worker did not exit cleanly, delivering what it sent");
            report.failed += 1;
        }

        let payload = handle.collect().unwrap_or_else(|e| {
            warn!(pid, unit, error = %e, "Could not read worker payload, delivering it empty");
            Vec::new()
        });

        debug!(pid, unit, bytes = payload.len(), "Delivering payload");
        self.consumer.consume(payload);
        report.delivered += 1;
    }
}
