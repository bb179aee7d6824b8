//! Acquisition scheduler.
//!
//! One worker task per provider pulls jobs from a bounded queue and fetches;
//! every request of a fetch waits on the shared rate limiter. The dispatcher
//! assigns at most one job per instrument at a time, ingests results and
//! re-evaluates the instrument until nothing more can be served. Instruments
//! whose providers are all out of budget wait a bounded time, then are
//! skipped for the rest of the pass.

mod config;
mod dispatcher;
mod model;
mod worker;

#[cfg(test)]
mod dispatcher_tests;

pub use config::SchedulerConfig;
pub use dispatcher::{resolve_instruments, Dispatcher};
pub use model::{Assignment, Horizon, InstrumentState, Job, JobOutcome, JobResult, PassSummary};
