//! Decides which appointments still need fetching and drives the batched
//! fetch-and-append loop against the dump file.
//!
//! The to-do list is every appointment ID referenced by the job table that
//! the dump does not already contain, in first-seen order. Fetched records
//! are flushed to the dump every `batch_size` successes, and the API token is
//! renewed after each flush.

use std::collections::HashSet;
use std::num::NonZeroUsize;

use adapters::{AppointmentApi, AppointmentRecord, FileHandle, FileStore, Table};

use crate::errors::SyncError;

/// Lower-cased job table headers that carry appointment IDs.
pub const REFERENCE_COLUMNS: [&str; 2] = ["firstappointmentid", "lastappointmentid"];

/// Dump column holding the appointment ID.
pub const ID_COLUMN: &str = "id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Every referenced appointment was already in the dump.
    UpToDate,
    Appended {
        /// Records fetched and written to the dump.
        fetched: usize,
        /// IDs whose fetch failed and were skipped for this run.
        failed: Vec<i64>,
        /// Number of append operations issued.
        flushes: usize,
    },
}

/// Parses an ID cell. Empty cells are missing values; integral float text
/// such as `12.0` is accepted.
fn parse_id(column: &str, cell: &str) -> Result<Option<i64>, SyncError> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(None);
    }
    if let Ok(id) = cell.parse::<i64>() {
        return Ok(Some(id));
    }
    match cell.parse::<f64>() {
        Ok(value) if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 => {
            Ok(Some(value as i64))
        }
        _ => Err(SyncError::configuration(format!(
            "column {column} holds {cell:?}, which is not an appointment id"
        ))),
    }
}

/// Appointment IDs referenced by the job table, deduplicated in first-seen
/// order. Matching columns are taken whole, one after another, in header
/// order.
pub fn referenced_ids(job: &Table) -> Result<Vec<i64>, SyncError> {
    let columns: Vec<(usize, &str)> = job
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, name)| REFERENCE_COLUMNS.contains(&name.to_lowercase().as_str()))
        .map(|(index, name)| (index, name.as_str()))
        .collect();

    if columns.is_empty() {
        return Err(SyncError::configuration(format!(
            "job table lacks {} / {} columns",
            REFERENCE_COLUMNS[0], REFERENCE_COLUMNS[1]
        )));
    }

    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for (index, name) in columns {
        for cell in job.column_values(index) {
            if let Some(id) = parse_id(name, cell)? {
                if seen.insert(id) {
                    ids.push(id);
                }
            }
        }
    }
    Ok(ids)
}

/// IDs already present in the dump. An empty dump has none.
pub fn fetched_ids(dump: &Table) -> Result<HashSet<i64>, SyncError> {
    if dump.is_empty() {
        return Ok(HashSet::new());
    }
    let index = dump.column_index(ID_COLUMN).ok_or_else(|| {
        SyncError::configuration(format!("dump table has rows but no {ID_COLUMN} column"))
    })?;

    let mut done = HashSet::new();
    for cell in dump.column_values(index) {
        if let Some(id) = parse_id(ID_COLUMN, cell)? {
            done.insert(id);
        }
    }
    Ok(done)
}

/// Referenced IDs minus those already in the dump, order preserved.
pub fn pending_ids(job: &Table, dump: &Table) -> Result<Vec<i64>, SyncError> {
    let done = fetched_ids(dump)?;
    let mut ids = referenced_ids(job)?;
    ids.retain(|id| !done.contains(id));
    Ok(ids)
}

pub struct Reconciler<'a> {
    store: &'a dyn FileStore,
    api: &'a dyn AppointmentApi,
    batch_size: NonZeroUsize,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        store: &'a dyn FileStore,
        api: &'a dyn AppointmentApi,
        batch_size: NonZeroUsize,
    ) -> Self {
        Self {
            store,
            api,
            batch_size,
        }
    }

    /// Reads both tables, fetches every pending appointment and appends the
    /// results to `dump`.
    pub async fn reconcile(
        &self,
        job: &FileHandle,
        dump: &FileHandle,
    ) -> Result<SyncOutcome, SyncError> {
        let job_table = self.store.read_table(job).await?;
        let dump_table = self.store.read_table(dump).await?;
        let pending = pending_ids(&job_table, &dump_table)?;

        if pending.is_empty() {
            tracing::info!("no pending appointments");
            return Ok(SyncOutcome::UpToDate);
        }

        println!("{} new appointments to fetch", pending.len());
        self.fetch_and_append(dump, pending).await
    }

    async fn fetch_and_append(
        &self,
        dump: &FileHandle,
        pending: Vec<i64>,
    ) -> Result<SyncOutcome, SyncError> {
        let batch_size = self.batch_size.get();
        let mut token = self.api.authenticate().await?;
        let mut batch: Vec<AppointmentRecord> = Vec::with_capacity(batch_size);
        let mut failed = Vec::new();
        let mut fetched = 0usize;
        let mut flushes = 0usize;

        for id in pending {
            match self.api.fetch_appointment(id, &token).await {
                Ok(record) => batch.push(record),
                Err(err) => {
                    tracing::warn!(id, error = %err, "skipping appointment");
                    failed.push(id);
                    continue;
                }
            }

            fetched += 1;
            if fetched % batch_size == 0 {
                self.flush(dump, &mut batch).await?;
                flushes += 1;
                println!("{fetched} downloaded, dump updated");
                token = self.api.authenticate().await?;
            }
        }

        // Skipped when the last batch boundary divided the total exactly.
        if !batch.is_empty() {
            self.flush(dump, &mut batch).await?;
            flushes += 1;
        }

        Ok(SyncOutcome::Appended {
            fetched,
            failed,
            flushes,
        })
    }

    async fn flush(
        &self,
        dump: &FileHandle,
        batch: &mut Vec<AppointmentRecord>,
    ) -> Result<(), SyncError> {
        let rows = Table::from_records(batch.iter());
        tracing::debug!(rows = rows.len(), dump = %dump, "appending batch");
        self.store.append_table(dump, rows).await?;
        batch.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{FakeApi, MemoryStore};

    fn nz(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn table(csv: &str) -> Table {
        Table::parse(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_reference_columns_match_case_insensitively() {
        let job = table("JobId,FirstAppointmentID,LastAppointmentId\n100,1,2\n101,2,3\n");
        assert_eq!(referenced_ids(&job).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_columns_stacked_in_header_order() {
        let job = table("firstappointmentid,lastappointmentid\n1,9\n2,8\n");
        assert_eq!(referenced_ids(&job).unwrap(), vec![1, 2, 9, 8]);
    }

    #[test]
    fn test_missing_cells_dropped_and_floats_coerced() {
        let job = table("FirstAppointmentID,LastAppointmentID\n5.0,\n,6\n5,7.0\n");
        assert_eq!(referenced_ids(&job).unwrap(), vec![5, 6, 7]);
    }

    #[test]
    fn test_missing_reference_columns_is_configuration_error() {
        let job = table("jobid,appointmentid\n1,2\n");
        assert!(matches!(
            referenced_ids(&job),
            Err(SyncError::Configuration(_))
        ));
    }

    #[test]
    fn test_non_numeric_id_is_configuration_error() {
        let job = table("firstappointmentid\nabc\n");
        let err = referenced_ids(&job).unwrap_err();
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_pending_excludes_dump_ids() {
        let job = table("FirstAppointmentID,LastAppointmentID\n1,2\n3,4\n");
        let dump = table("id,status\n2,\n4,NOT_FOUND\n");
        assert_eq!(pending_ids(&job, &dump).unwrap(), vec![1, 3]);
    }

    #[test]
    fn test_header_only_dump_has_no_ids() {
        assert!(fetched_ids(&table("id\n")).unwrap().is_empty());
        assert!(fetched_ids(&Table::default()).unwrap().is_empty());
    }

    #[test]
    fn test_dump_rows_without_id_column_rejected() {
        assert!(matches!(
            fetched_ids(&table("status\nNOT_FOUND\n")),
            Err(SyncError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_up_to_date_makes_no_api_calls() {
        let store = MemoryStore::new();
        let job = store.insert("job_data.csv", "FirstAppointmentID\n1\n2\n");
        let dump = store.insert("appointments_dump.csv", "id\n1\n2\n");
        let api = FakeApi::new();

        let outcome = Reconciler::new(&store, &api, nz(50))
            .reconcile(&job, &dump)
            .await
            .unwrap();

        assert_eq!(outcome, SyncOutcome::UpToDate);
        assert_eq!(api.auth_calls(), 0);
        assert!(api.fetched().is_empty());
        assert!(store.append_sizes().is_empty());
    }

    #[tokio::test]
    async fn test_flushes_every_batch_and_remainder() {
        let ids: Vec<String> = (1..=120).map(|i| i.to_string()).collect();
        let store = MemoryStore::new();
        let job = store.insert(
            "job_data.csv",
            &format!("FirstAppointmentID\n{}\n", ids.join("\n")),
        );
        let dump = store.insert("appointments_dump.csv", "id\n");
        let api = FakeApi::new();

        let outcome = Reconciler::new(&store, &api, nz(50))
            .reconcile(&job, &dump)
            .await
            .unwrap();

        assert_eq!(store.append_sizes(), vec![50, 50, 20]);
        assert_eq!(
            outcome,
            SyncOutcome::Appended {
                fetched: 120,
                failed: vec![],
                flushes: 3
            }
        );
        // one initial token plus one after each full batch
        assert_eq!(api.auth_calls(), 3);
    }

    #[tokio::test]
    async fn test_exact_multiple_skips_empty_flush() {
        let store = MemoryStore::new();
        let job = store.insert("job_data.csv", "FirstAppointmentID\n1\n2\n3\n4\n");
        let dump = store.insert("appointments_dump.csv", "id\n");
        let api = FakeApi::new();

        Reconciler::new(&store, &api, nz(2))
            .reconcile(&job, &dump)
            .await
            .unwrap();

        assert_eq!(store.append_sizes(), vec![2, 2]);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_skipped_not_counted() {
        let store = MemoryStore::new();
        let job = store.insert("job_data.csv", "FirstAppointmentID\n10\n11\n12\n");
        let dump = store.insert("appointments_dump.csv", "id\n");
        let api = FakeApi::new().failing([11]);

        let outcome = Reconciler::new(&store, &api, nz(50))
            .reconcile(&job, &dump)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            SyncOutcome::Appended {
                fetched: 2,
                failed: vec![11],
                flushes: 1
            }
        );
        assert_eq!(api.fetched(), vec![10, 11, 12]);
        assert_eq!(store.ids_in(&dump), vec![10, 12]);
    }

    #[tokio::test]
    async fn test_batch_boundary_counts_successes_not_attempts() {
        let store = MemoryStore::new();
        let job = store.insert("job_data.csv", "FirstAppointmentID\n1\n2\n3\n4\n5\n");
        let dump = store.insert("appointments_dump.csv", "id\n");
        let api = FakeApi::new().failing([2]);

        Reconciler::new(&store, &api, nz(2))
            .reconcile(&job, &dump)
            .await
            .unwrap();

        // attempts 1,2(fail),3 fill the first batch; 4,5 fill the second
        assert_eq!(store.append_sizes(), vec![2, 2]);
        assert_eq!(store.ids_in(&dump), vec![1, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_not_found_rows_are_recorded() {
        let store = MemoryStore::new();
        let job = store.insert("job_data.csv", "LastAppointmentID\n1\n404\n");
        let dump = store.insert("appointments_dump.csv", "id\n");
        let api = FakeApi::new().missing([404]);

        Reconciler::new(&store, &api, nz(50))
            .reconcile(&job, &dump)
            .await
            .unwrap();

        let content = store.content(&dump);
        assert_eq!(content.cell(1, "id"), Some("404"));
        assert_eq!(content.cell(1, "status"), Some("NOT_FOUND"));
        assert_eq!(content.cell(0, "status"), Some("Scheduled"));
    }

    #[tokio::test]
    async fn test_second_run_appends_nothing() {
        let store = MemoryStore::new();
        let job = store.insert(
            "job_data.csv",
            "FirstAppointmentID,LastAppointmentID\n1,2\n3,\n",
        );
        let dump = store.insert("appointments_dump.csv", "id\n");
        let api = FakeApi::new();
        let reconciler = Reconciler::new(&store, &api, nz(50));

        let first = reconciler.reconcile(&job, &dump).await.unwrap();
        assert!(matches!(first, SyncOutcome::Appended { fetched: 3, .. }));

        let second = reconciler.reconcile(&job, &dump).await.unwrap();
        assert_eq!(second, SyncOutcome::UpToDate);
        assert_eq!(store.append_sizes(), vec![3]);
        assert_eq!(api.fetched(), vec![1, 3, 2]);
    }

    #[tokio::test]
    async fn test_auth_failure_aborts() {
        let store = MemoryStore::new();
        let job = store.insert("job_data.csv", "FirstAppointmentID\n1\n");
        let dump = store.insert("appointments_dump.csv", "id\n");
        let api = FakeApi::new().rejecting_credentials();

        let err = Reconciler::new(&store, &api, nz(50))
            .reconcile(&job, &dump)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Adapter(_)));
        assert!(store.append_sizes().is_empty());
    }
}
