//! Top-level sync run: resolve both files in the configured folder,
//! bootstrap the dump on first run, then hand over to the reconciler.

use adapters::{AppointmentApi, FileStore, Table};

use crate::config::SyncSettings;
use crate::errors::SyncError;
use crate::services::reconciler::{Reconciler, SyncOutcome, ID_COLUMN};

pub struct Workflow<'a> {
    store: &'a dyn FileStore,
    api: &'a dyn AppointmentApi,
    settings: &'a SyncSettings,
}

impl<'a> Workflow<'a> {
    pub fn new(
        store: &'a dyn FileStore,
        api: &'a dyn AppointmentApi,
        settings: &'a SyncSettings,
    ) -> Self {
        Self {
            store,
            api,
            settings,
        }
    }

    pub async fn run(&self) -> Result<SyncOutcome, SyncError> {
        let SyncSettings {
            folder_id,
            job_file,
            dump_file,
            batch_size,
        } = self.settings;

        let job = self.store.locate_file(job_file, folder_id).await?;
        let dump = self.store.locate_file(dump_file, folder_id).await?;

        let job = job.ok_or_else(|| {
            SyncError::configuration(format!("{job_file} not found in folder {folder_id}"))
        })?;

        let dump = match dump {
            Some(dump) => dump,
            None => {
                let created = self
                    .store
                    .create_file(dump_file, folder_id, &Table::with_columns([ID_COLUMN]))
                    .await?;
                println!("Created {dump_file} in folder {folder_id}");
                created
            }
        };

        tracing::info!(job = %job, dump = %dump, batch_size = batch_size.get(), "starting sync");
        Reconciler::new(self.store, self.api, *batch_size)
            .reconcile(&job, &dump)
            .await
    }
}

/// One-line summary printed when a run completes.
pub fn summary(outcome: &SyncOutcome, dump_file: &str) -> String {
    match outcome {
        SyncOutcome::UpToDate => format!("{dump_file} already up-to-date"),
        SyncOutcome::Appended {
            fetched, failed, ..
        } if failed.is_empty() => {
            format!("Finished: {fetched} new rows appended to {dump_file}")
        }
        SyncOutcome::Appended {
            fetched, failed, ..
        } => format!(
            "Finished: {fetched} new rows appended to {dump_file} ({} appointments skipped)",
            failed.len()
        ),
    }
}
