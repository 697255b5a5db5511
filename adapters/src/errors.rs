//! Custom error types specific to the `adapters` crate.
//!
//! This module defines errors that can occur while talking to the file store,
//! the appointment API, or the credential store, and while converting their
//! payloads into tables and records.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    /// The request never produced a response (DNS, TLS, timeout, reset).
    #[error("transport error calling {service}: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },

    /// A response arrived with a non-success status.
    #[error("{service} returned {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// A credential exchange or refresh was rejected.
    #[error("authentication with {service} failed: {message}")]
    Authentication {
        service: &'static str,
        message: String,
    },

    #[error("unexpected payload from {service}: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },

    #[error("csv error: {0}")]
    Csv(String),

    #[error("credential store error: {0}")]
    CredentialStore(String),
}

impl AdapterError {
    pub(crate) fn transport(service: &'static str, err: reqwest::Error) -> Self {
        AdapterError::Transport {
            service,
            message: err.to_string(),
        }
    }

    pub(crate) fn decode(service: &'static str, message: impl ToString) -> Self {
        AdapterError::Decode {
            service,
            message: message.to_string(),
        }
    }

    pub(crate) fn auth(service: &'static str, message: impl ToString) -> Self {
        AdapterError::Authentication {
            service,
            message: message.to_string(),
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            AdapterError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<csv::Error> for AdapterError {
    fn from(err: csv::Error) -> Self {
        AdapterError::Csv(err.to_string())
    }
}

/// Turns a non-success response into [`AdapterError::Status`], passing
/// successful responses through untouched.
pub(crate) async fn check_status(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, AdapterError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AdapterError::Status {
        service,
        status: status.as_u16(),
        body,
    })
}
