//! Core `adapters` crate for the remote collaborators of titansync.
//!
//! This crate defines the [`FileStore`] and [`AppointmentApi`] traits, which
//! outline what the sync engine needs from a cloud file store and from a
//! job-tracking API, and provides the concrete implementations (Google Drive,
//! ServiceTitan).

use async_trait::async_trait;

pub mod credentials;
pub mod drive;
pub mod errors;
pub mod models;
pub mod servicetitan;
pub mod table;

pub use credentials::{
    CredentialStore, FileCredentialStore, MemoryCredentialStore, StoredCredentials,
};
pub use drive::{DriveConfig, GoogleDrive};
pub use errors::AdapterError;
pub use models::{AccessToken, AppointmentRecord, FileHandle, NOT_FOUND_STATUS};
pub use servicetitan::{ServiceTitan, ServiceTitanConfig};
pub use table::Table;

/// A folder-scoped cloud file store holding CSV tables.
///
/// None of the operations retry; transport and authorization failures are
/// returned to the caller.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Finds a non-trashed file by exact name inside `folder`. Zero matches
    /// is `Ok(None)`; several matches return the first.
    async fn locate_file(&self, name: &str, folder: &str)
        -> Result<Option<FileHandle>, AdapterError>;

    /// Downloads and parses a file. An empty file is an empty table.
    async fn read_table(&self, file: &FileHandle) -> Result<Table, AdapterError>;

    async fn create_file(
        &self,
        name: &str,
        folder: &str,
        initial: &Table,
    ) -> Result<FileHandle, AdapterError>;

    /// Replaces the whole content of `file` with `table`.
    async fn write_table(&self, file: &FileHandle, table: &Table) -> Result<(), AdapterError>;

    /// Reads the current table, appends `rows` below it and writes the result
    /// back. Not atomic: a concurrent writer between the read and the write
    /// loses its update.
    async fn append_table(&self, file: &FileHandle, rows: Table) -> Result<(), AdapterError> {
        let mut current = self.read_table(file).await?;
        current.concat(rows);
        self.write_table(file, &current).await
    }
}

/// Read access to appointments in the job-tracking service.
#[async_trait]
pub trait AppointmentApi: Send + Sync {
    /// Exchanges client credentials for a short-lived bearer token.
    async fn authenticate(&self) -> Result<AccessToken, AdapterError>;

    /// Fetches one appointment. An unknown ID yields
    /// [`AppointmentRecord::not_found`]; any other failure is an error.
    async fn fetch_appointment(
        &self,
        id: i64,
        token: &AccessToken,
    ) -> Result<AppointmentRecord, AdapterError>;
}
