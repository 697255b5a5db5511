//! In-memory stand-ins for the remote store and the appointment API.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use adapters::{
    AccessToken, AdapterError, AppointmentApi, AppointmentRecord, FileHandle, FileStore, Table,
};
use async_trait::async_trait;
use serde_json::json;

struct StoredFile {
    handle: FileHandle,
    name: String,
    folder: String,
    table: Table,
}

/// File store keeping every file in one folder-agnostic list.
#[derive(Default)]
pub struct MemoryStore {
    files: Mutex<Vec<StoredFile>>,
    appends: Mutex<Vec<usize>>,
}

impl MemoryStore {
    pub const FOLDER: &'static str = "folder";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: &str, csv: &str) -> FileHandle {
        let mut files = self.files.lock().unwrap();
        let handle = FileHandle::new(format!("file-{}", files.len() + 1));
        files.push(StoredFile {
            handle: handle.clone(),
            name: name.to_string(),
            folder: Self::FOLDER.to_string(),
            table: Table::parse(csv.as_bytes()).unwrap(),
        });
        handle
    }

    pub fn content(&self, handle: &FileHandle) -> Table {
        self.files
            .lock()
            .unwrap()
            .iter()
            .find(|f| &f.handle == handle)
            .map(|f| f.table.clone())
            .unwrap()
    }

    /// Values of the `id` column, as integers.
    pub fn ids_in(&self, handle: &FileHandle) -> Vec<i64> {
        let table = self.content(handle);
        let index = table.column_index("id").unwrap();
        table
            .column_values(index)
            .map(|cell| cell.parse().unwrap())
            .collect()
    }

    pub fn handle_of(&self, name: &str) -> Option<FileHandle> {
        self.files
            .lock()
            .unwrap()
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.handle.clone())
    }

    /// Row counts of every append, in call order.
    pub fn append_sizes(&self) -> Vec<usize> {
        self.appends.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileStore for MemoryStore {
    async fn locate_file(
        &self,
        name: &str,
        folder: &str,
    ) -> Result<Option<FileHandle>, AdapterError> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .iter()
            .find(|f| f.name == name && f.folder == folder)
            .map(|f| f.handle.clone()))
    }

    async fn read_table(&self, file: &FileHandle) -> Result<Table, AdapterError> {
        self.files
            .lock()
            .unwrap()
            .iter()
            .find(|f| &f.handle == file)
            .map(|f| f.table.clone())
            .ok_or(AdapterError::Status {
                service: "memory",
                status: 404,
                body: file.to_string(),
            })
    }

    async fn create_file(
        &self,
        name: &str,
        folder: &str,
        initial: &Table,
    ) -> Result<FileHandle, AdapterError> {
        let mut files = self.files.lock().unwrap();
        let handle = FileHandle::new(format!("file-{}", files.len() + 1));
        files.push(StoredFile {
            handle: handle.clone(),
            name: name.to_string(),
            folder: folder.to_string(),
            table: initial.clone(),
        });
        Ok(handle)
    }

    async fn write_table(&self, file: &FileHandle, table: &Table) -> Result<(), AdapterError> {
        let mut files = self.files.lock().unwrap();
        let stored = files
            .iter_mut()
            .find(|f| &f.handle == file)
            .ok_or(AdapterError::Status {
                service: "memory",
                status: 404,
                body: file.to_string(),
            })?;
        stored.table = table.clone();
        Ok(())
    }

    async fn append_table(&self, file: &FileHandle, rows: Table) -> Result<(), AdapterError> {
        self.appends.lock().unwrap().push(rows.len());
        let mut current = self.read_table(file).await?;
        current.concat(rows);
        self.write_table(file, &current).await
    }
}

/// Appointment API answering from fixed rules.
#[derive(Default)]
pub struct FakeApi {
    failing: HashSet<i64>,
    missing: HashSet<i64>,
    reject_credentials: bool,
    auth_calls: AtomicUsize,
    fetched: Mutex<Vec<i64>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// IDs whose fetch returns a server error.
    pub fn failing(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.failing.extend(ids);
        self
    }

    /// IDs the API reports as unknown.
    pub fn missing(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.missing.extend(ids);
        self
    }

    pub fn rejecting_credentials(mut self) -> Self {
        self.reject_credentials = true;
        self
    }

    pub fn auth_calls(&self) -> usize {
        self.auth_calls.load(Ordering::SeqCst)
    }

    /// Every ID a fetch was attempted for, in order.
    pub fn fetched(&self) -> Vec<i64> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl AppointmentApi for FakeApi {
    async fn authenticate(&self) -> Result<AccessToken, AdapterError> {
        let n = self.auth_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_credentials {
            return Err(AdapterError::Authentication {
                service: "fake",
                message: "invalid_client".into(),
            });
        }
        Ok(AccessToken::new(format!("token-{n}")))
    }

    async fn fetch_appointment(
        &self,
        id: i64,
        _token: &AccessToken,
    ) -> Result<AppointmentRecord, AdapterError> {
        self.fetched.lock().unwrap().push(id);
        if self.failing.contains(&id) {
            return Err(AdapterError::Status {
                service: "fake",
                status: 503,
                body: "unavailable".into(),
            });
        }
        if self.missing.contains(&id) {
            return Ok(AppointmentRecord::not_found(id));
        }
        AppointmentRecord::from_payload(id, json!({"status": "Scheduled", "jobId": id * 10}))
    }
}
