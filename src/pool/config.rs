//! Validated configuration for a pool run.

use crate::error::{PoolError, Result};
use std::path::PathBuf;
use std::time::Duration;

/// How long the drain loop sleeps when a tick finds nothing to reap.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// How long a worker keeps retrying its rendezvous connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Byte transport between a worker and the coordinator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Transport {
    /// Anonymous pre-connected socket pair created before the fork.
    #[default]
    Pair,
    /// Named Unix socket the coordinator listens on and the worker connects to.
    Rendezvous {
        /// Directory holding the per-unit socket files.
        dir: PathBuf,
        /// How long the worker retries before giving up.
        connect_timeout: Duration,
    },
}

impl Transport {
    /// Rendezvous transport in `dir` with the default connect timeout.
    pub fn rendezvous(dir: impl Into<PathBuf>) -> Self {
        Self::Rendezvous {
            dir: dir.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Short name used in logs and the CLI.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pair => "pair",
            Self::Rendezvous { .. } => "rendezvous",
        }
    }
}

/// Configuration for an [`Orchestrator`](super::Orchestrator) run.
///
/// Built once before any worker is spawned and never mutated afterwards.
/// Limits are accepted as signed integers so out-of-range input from config
/// surfaces is rejected here instead of wrapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    admission_limit: usize,
    time_budget_secs: u64,
    transport: Transport,
    poll_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            admission_limit: 0,
            time_budget_secs: 0,
            transport: Transport::Pair,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl PoolConfig {
    /// Create a configuration with unlimited admission and time budget.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum number of workers alive at once (0 = unlimited).
    pub fn with_admission_limit(mut self, limit: i64) -> Result<Self> {
        self.admission_limit = non_negative("admission limit", limit)? as usize;
        Ok(self)
    }

    /// Seconds a worker may run before it is evicted (0 = unlimited).
    pub fn with_time_budget(mut self, seconds: i64) -> Result<Self> {
        self.time_budget_secs = non_negative("time budget", seconds)?;
        Ok(self)
    }

    /// Select the worker/coordinator transport.
    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    /// Sleep between idle drain ticks. Must be non-zero.
    pub fn with_poll_interval(mut self, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(PoolError::InvalidArgument(
                "poll interval must be greater than 0".into(),
            ));
        }
        self.poll_interval = interval;
        Ok(self)
    }

    pub fn admission_limit(&self) -> usize {
        self.admission_limit
    }

    pub fn time_budget_secs(&self) -> u64 {
        self.time_budget_secs
    }

    /// Time budget as a duration, `None` when unlimited.
    pub fn time_budget(&self) -> Option<Duration> {
        (self.time_budget_secs > 0).then(|| Duration::from_secs(self.time_budget_secs))
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

fn non_negative(name: &str, value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| {
        PoolError::InvalidArgument(format!(
            "{name} must be greater than or equal to 0, got {value}"
        ))
    })
}
