//! Global application error types.
//!
//! Configuration problems (missing inputs, missing reference columns, bad
//! identifiers) are fatal and reported to the user as-is. Adapter failures
//! from the store or from authentication abort the run. Per-appointment fetch
//! failures never reach this type; the reconciler logs and skips them.

use adapters::AdapterError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{0}")]
    Configuration(String),

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

impl SyncError {
    pub fn configuration(message: impl Into<String>) -> Self {
        SyncError::Configuration(message.into())
    }
}
