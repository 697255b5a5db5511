//! Module for core business logic services.
//!
//! This module encapsulates the reconciliation engine, which works out and
//! fetches the missing appointments, and the workflow that sequences a whole
//! run around it.

pub mod reconciler;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;
