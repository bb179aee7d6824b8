//! SQLite storage implementation for tracked instruments.

mod model;
mod repository;

pub use model::{InstrumentDB, NewInstrumentDB};
pub use repository::InstrumentRepository;
