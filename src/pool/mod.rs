//! Process pool that fans units of work out to forked workers.
//!
//! Each unit runs in its own worker process and sends a single payload back
//! to the coordinator over a private channel.
//!
//! # Architecture
//!
//! ```text
//!                     ┌──────────────────┐
//!                     │   Coordinator    │
//!                     │  (Orchestrator)  │──► Consumer
//!                     └────────┬─────────┘
//!                              │ one channel per worker
//!               ┌──────────────┼──────────────┐
//!               │              │              │
//!         ┌─────▼─────┐  ┌─────▼─────┐  ┌─────▼─────┐
//!         │ Worker 1  │  │ Worker 2  │  │ Worker N  │
//!         │ (process) │  │ (process) │  │ (process) │
//!         │ Producer  │  │ Producer  │  │ Producer  │
//!         └───────────┘  └───────────┘  └───────────┘
//! ```
//!
//! # Features
//!
//! - **Process isolation**: a crashing or hanging producer cannot touch the coordinator
//! - **Admission limit**: at most N workers alive at once
//! - **Time budget**: overdue workers are interrupted and their output discarded
//! - **Two transports**: anonymous socket pairs or named rendezvous sockets
//!
//! # Example
//!
//! ```no_run
//! use forkpool::pool::{Orchestrator, Producer};
//!
//! let producers: Vec<Box<dyn Producer>> = vec![
//!     Box::new(|| Some(b"a".to_vec())),
//!     Box::new(|| Some(b"bb".to_vec())),
//! ];
//! let mut pool = Orchestrator::new(Vec::<Vec<u8>>::new(), producers)
//!     .configure(4, 30)
//!     .expect("valid limits");
//! let report = pool.run().expect("pool run failed");
//! assert_eq!(report.delivered, pool.consumer().len());
//! ```

pub mod channel;
mod config;
mod eviction;
mod handle;
mod launcher;
mod orchestrator;
mod signals;
mod spawn;
mod unit;

pub use config::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_POLL_INTERVAL, PoolConfig, Transport};
pub use eviction::{EVICTION_SIGNAL, Eviction, EvictionPolicy};
pub use handle::{Pool, WorkerHandle, WorkerState};
pub use launcher::{EXIT_CONNECT_TIMEOUT, EXIT_FAILURE, EXIT_OK};
pub use orchestrator::{Orchestrator, RunReport, TickOutcome};
pub use signals::TerminationReason;
pub use spawn::{ForkRole, fork_worker};
pub use unit::{Consumer, Producer};
