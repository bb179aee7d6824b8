//! Gap detection over stored minute series.

mod detector;
mod model;

pub use detector::GapDetector;
pub use model::{Boundary, Gap};
