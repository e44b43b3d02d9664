//! Fan units of work out to forked worker processes and collect one payload
//! from each.
//!
//! See [`pool`] for the orchestrator and [`producers`] for ready-made units.

pub mod error;
pub mod logging;
pub mod paths;
pub mod pool;
pub mod producers;

pub use error::{PoolError, Result};
