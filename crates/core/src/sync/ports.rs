//! Port interfaces for writing line protocol to the database
//!
//! The HTTP collaborator lives in infrastructure; the submitter only needs
//! "send this body to that database and tell me the status".

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Status and body returned by the write endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteResponse {
    pub status: u16,
    pub body: String,
}

impl WriteResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }

    /// Any 2xx status counts as accepted.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The write produced no usable response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request could not be built: {0}")]
    Request(String),
}

/// Trait for submitting newline-delimited line protocol to one database
#[async_trait]
pub trait LineWriter: Send + Sync {
    /// Write `body` to `database`. Non-2xx statuses are returned as
    /// responses, not errors.
    async fn write(&self, database: &str, body: String) -> Result<WriteResponse, TransportError>;
}
