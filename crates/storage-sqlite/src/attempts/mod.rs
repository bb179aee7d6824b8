//! SQLite storage implementation for the attempt ledger.

mod model;
mod repository;

pub use model::AttemptDB;
pub use repository::AttemptRepository;
