//! Domain types and models

pub mod field;
pub mod measurement;
pub mod state;

pub use field::FieldValue;
pub use measurement::Measurement;
pub use state::{Lifecycle, SchedulerState};
