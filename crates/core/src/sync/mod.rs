//! Submission to the time-series database
//!
//! Ports for the write endpoint and the submitter that drives them.

pub mod ports;
pub mod submitter;

pub use ports::{LineWriter, TransportError, WriteResponse};
pub use submitter::{SubmitOutcome, Submitter};
