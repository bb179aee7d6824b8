//! Failed-attempt memo.
//!
//! An attempt is recorded when a provider, asked for exactly `[start, end]`
//! of an instrument, produced no new rows. Gap boundaries are canonical, so
//! the same hole yields the same key on the next pass and the provider is
//! not asked again.

mod ledger;
mod model;
mod store;

pub use ledger::AttemptLedger;
pub use model::AttemptRecord;
pub use store::AttemptStore;
