//! HTTP adapters

pub mod writer;

pub use writer::{InfluxWriter, InfluxWriterBuilder};
