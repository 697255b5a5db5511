//! Generic data models for the `adapters` crate.
//!
//! These models are the shapes that cross the adapter boundary: opaque file
//! handles from the store, bearer tokens from the appointment API, and the
//! appointment records themselves. Backend services only ever see these types,
//! never a provider's wire format.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};

use crate::errors::AdapterError;

/// Status value written for an appointment the API reports as unknown.
pub const NOT_FOUND_STATUS: &str = "NOT_FOUND";

/// Opaque identifier of a file in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileHandle(String);

impl FileHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Short-lived bearer token. Debug output never shows the secret.
#[derive(Debug)]
pub struct AccessToken(SecretString);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

/// One appointment as returned by the API, keyed by field name.
///
/// Always carries an `id` field. Field order follows the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentRecord {
    id: i64,
    fields: Map<String, Value>,
}

impl AppointmentRecord {
    /// Builds a record from an API payload, inserting `id` when the payload
    /// lacks one.
    pub fn from_payload(id: i64, payload: Value) -> Result<Self, AdapterError> {
        let Value::Object(payload) = payload else {
            return Err(AdapterError::decode(
                "servicetitan",
                format!("appointment {id} is not a JSON object"),
            ));
        };

        if payload.contains_key("id") {
            return Ok(Self {
                id,
                fields: payload,
            });
        }

        let mut fields = Map::with_capacity(payload.len() + 1);
        fields.insert("id".to_string(), Value::from(id));
        fields.extend(payload);
        Ok(Self { id, fields })
    }

    /// Placeholder for an ID the API confirmed does not exist.
    pub fn not_found(id: i64) -> Self {
        let mut fields = Map::new();
        fields.insert("id".to_string(), Value::from(id));
        fields.insert("status".to_string(), Value::from(NOT_FOUND_STATUS));
        Self { id, fields }
    }

    /// The identifier this record was requested under.
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn is_not_found(&self) -> bool {
        self.fields.len() == 2
            && self.fields.get("status").and_then(Value::as_str) == Some(NOT_FOUND_STATUS)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Fields flattened to CSV cell text, in payload order.
    pub fn cells(&self) -> impl Iterator<Item = (&str, String)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), cell_text(value)))
    }
}

/// Renders a JSON value as a single CSV cell.
fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        nested @ (Value::Array(_) | Value::Object(_)) => nested.to_string(),
    }
}
