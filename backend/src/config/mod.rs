//! Central module for application-wide configuration settings.
//!
//! Every setting is a command-line flag backed by an environment variable, so
//! the binary runs with no arguments once the environment is populated.
//! Secrets are only ever held as [`SecretString`] after parsing.

use std::num::NonZeroUsize;
use std::path::PathBuf;

use adapters::{drive, servicetitan, DriveConfig, ServiceTitanConfig};
use clap::Parser;
use secrecy::SecretString;

#[derive(Parser)]
#[command(name = "titansync")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Drive folder holding both CSV files.
    #[arg(long, env = "TITANSYNC_DRIVE_FOLDER_ID")]
    pub folder_id: String,

    /// Job reference table.
    #[arg(long, env = "TITANSYNC_JOB_FILE", default_value = "job_data.csv")]
    pub job_file: String,

    /// Accumulated appointment dump.
    #[arg(long, env = "TITANSYNC_DUMP_FILE", default_value = "appointments_dump.csv")]
    pub dump_file: String,

    /// Successful fetches per dump flush.
    #[arg(long, env = "TITANSYNC_BATCH_SIZE", default_value = "50")]
    pub batch_size: NonZeroUsize,

    #[arg(long, env = "TITANSYNC_DRIVE_API_URL", default_value = drive::DEFAULT_DRIVE_API_URL)]
    pub drive_api_url: String,

    #[arg(long, env = "GOOGLE_TOKEN_URL", default_value = drive::DEFAULT_GOOGLE_TOKEN_URL)]
    pub google_token_url: String,

    #[arg(long, env = "GOOGLE_CLIENT_ID")]
    pub google_client_id: String,

    #[arg(long, env = "GOOGLE_CLIENT_SECRET", hide_env_values = true)]
    pub google_client_secret: String,

    /// Seeds the credential file on first run.
    #[arg(long, env = "GOOGLE_REFRESH_TOKEN", hide_env_values = true)]
    pub google_refresh_token: Option<String>,

    /// Where refreshed Drive credentials are kept between runs.
    #[arg(long, env = "TITANSYNC_CREDENTIALS_FILE", default_value = "token.json")]
    pub credentials_file: PathBuf,

    #[arg(long, env = "SERVICETITAN_AUTH_URL", default_value = servicetitan::DEFAULT_AUTH_URL)]
    pub servicetitan_auth_url: String,

    #[arg(long, env = "SERVICETITAN_API_URL", default_value = servicetitan::DEFAULT_API_URL)]
    pub servicetitan_api_url: String,

    #[arg(long, env = "SERVICETITAN_TENANT_ID")]
    pub servicetitan_tenant_id: String,

    #[arg(long, env = "SERVICETITAN_CLIENT_ID")]
    pub servicetitan_client_id: String,

    #[arg(long, env = "SERVICETITAN_CLIENT_SECRET", hide_env_values = true)]
    pub servicetitan_client_secret: String,

    #[arg(long, env = "SERVICETITAN_APP_KEY", hide_env_values = true)]
    pub servicetitan_app_key: String,
}

/// The non-secret part of the configuration the sync workflow needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub folder_id: String,
    pub job_file: String,
    pub dump_file: String,
    pub batch_size: NonZeroUsize,
}

impl Config {
    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            folder_id: self.folder_id.clone(),
            job_file: self.job_file.clone(),
            dump_file: self.dump_file.clone(),
            batch_size: self.batch_size,
        }
    }

    pub fn drive(&self) -> DriveConfig {
        DriveConfig {
            api_url: self.drive_api_url.clone(),
            token_url: self.google_token_url.clone(),
            client_id: self.google_client_id.clone(),
            client_secret: SecretString::from(self.google_client_secret.clone()),
            refresh_token: self.google_refresh_token.clone().map(SecretString::from),
        }
    }

    pub fn servicetitan(&self) -> ServiceTitanConfig {
        ServiceTitanConfig {
            auth_url: self.servicetitan_auth_url.clone(),
            api_url: self.servicetitan_api_url.clone(),
            tenant_id: self.servicetitan_tenant_id.clone(),
            client_id: self.servicetitan_client_id.clone(),
            client_secret: SecretString::from(self.servicetitan_client_secret.clone()),
            app_key: SecretString::from(self.servicetitan_app_key.clone()),
        }
    }
}
