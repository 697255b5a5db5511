//! Google Drive implementation of the [`FileStore`] trait.
//!
//! This file contains the client wrapper, the OAuth refresh logic backed by a
//! [`CredentialStore`], and the Drive v3 REST calls used to find, download,
//! create and overwrite CSV files inside one folder.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::credentials::{unix_now, CredentialStore, StoredCredentials};
use crate::errors::{check_status, AdapterError};
use crate::models::{AccessToken, FileHandle};
use crate::table::Table;
use crate::FileStore;

const SERVICE: &str = "google-drive";
const MULTIPART_BOUNDARY: &str = "titansync-multipart-boundary";

pub const DEFAULT_DRIVE_API_URL: &str = "https://www.googleapis.com";
pub const DEFAULT_GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug)]
pub struct DriveConfig {
    /// Base for both `/drive/v3` and `/upload/drive/v3` paths.
    pub api_url: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: SecretString,
    /// Seeds an empty credential store.
    pub refresh_token: Option<SecretString>,
}

pub struct GoogleDrive {
    http: Client,
    config: DriveConfig,
    credentials: Arc<dyn CredentialStore>,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    id: String,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Escapes a literal for use inside a single-quoted Drive query string.
fn escape_query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn search_query(name: &str, folder: &str) -> String {
    format!(
        "name='{}' and '{}' in parents and trashed=false",
        escape_query_literal(name),
        escape_query_literal(folder)
    )
}

fn multipart_related_body(metadata: &serde_json::Value, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(content.len() + 256);
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata.to_string().as_bytes());
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: text/csv\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
    body
}

impl GoogleDrive {
    pub fn new(
        config: DriveConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, AdapterError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| AdapterError::transport(SERVICE, err))?;

        Ok(Self {
            http,
            config,
            credentials,
        })
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.config.api_url.trim_end_matches('/'))
    }

    fn upload_url(&self) -> String {
        format!(
            "{}/upload/drive/v3/files",
            self.config.api_url.trim_end_matches('/')
        )
    }

    /// Returns a valid access token, refreshing and persisting it when the
    /// stored one is missing or about to expire.
    async fn access_token(&self) -> Result<AccessToken, AdapterError> {
        let stored = match self.credentials.load().await? {
            Some(stored) => stored,
            None => match &self.config.refresh_token {
                Some(seed) => StoredCredentials::from_refresh_token(seed.expose_secret()),
                None => {
                    return Err(AdapterError::auth(
                        SERVICE,
                        "no stored credentials and no refresh token configured",
                    ))
                }
            },
        };

        let now = unix_now();
        if let Some(token) = stored.usable_access_token(now) {
            return Ok(AccessToken::new(token));
        }

        let refreshed = self.refresh(stored, now).await?;
        self.credentials.save(&refreshed).await?;
        let token = refreshed
            .access_token
            .ok_or_else(|| AdapterError::auth(SERVICE, "refresh returned no access token"))?;
        Ok(AccessToken::new(token))
    }

    async fn refresh(
        &self,
        stored: StoredCredentials,
        now: u64,
    ) -> Result<StoredCredentials, AdapterError> {
        tracing::debug!("refreshing drive access token");
        let response = self
            .http
            .post(&self.config.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", stored.refresh_token.as_str()),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.expose_secret()),
            ])
            .send()
            .await
            .map_err(|err| AdapterError::transport(SERVICE, err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::auth(
                SERVICE,
                format!("token refresh returned {status}: {body}"),
            ));
        }

        let payload: RefreshResponse = response
            .json()
            .await
            .map_err(|err| AdapterError::auth(SERVICE, err))?;

        Ok(StoredCredentials {
            access_token: Some(payload.access_token),
            refresh_token: payload.refresh_token.unwrap_or(stored.refresh_token),
            expires_at: payload.expires_in.map(|secs| now + secs),
        })
    }
}

#[async_trait]
impl FileStore for GoogleDrive {
    async fn locate_file(
        &self,
        name: &str,
        folder: &str,
    ) -> Result<Option<FileHandle>, AdapterError> {
        let token = self.access_token().await?;
        let query = search_query(name, folder);
        let response = self
            .http
            .get(self.files_url())
            .bearer_auth(token.expose())
            .query(&[
                ("q", query.as_str()),
                ("spaces", "drive"),
                ("fields", "files(id,name)"),
                ("pageSize", "1"),
            ])
            .send()
            .await
            .map_err(|err| AdapterError::transport(SERVICE, err))?;

        let list: FileList = check_status(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|err| AdapterError::decode(SERVICE, err))?;

        let found = list.files.into_iter().next().map(|f| FileHandle::new(f.id));
        tracing::debug!(name, folder, found = found.is_some(), "drive lookup");
        Ok(found)
    }

    async fn read_table(&self, file: &FileHandle) -> Result<Table, AdapterError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(format!("{}/{}", self.files_url(), file))
            .bearer_auth(token.expose())
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(|err| AdapterError::transport(SERVICE, err))?;

        let bytes = check_status(SERVICE, response)
            .await?
            .bytes()
            .await
            .map_err(|err| AdapterError::transport(SERVICE, err))?;

        Table::parse(&bytes)
    }

    async fn create_file(
        &self,
        name: &str,
        folder: &str,
        initial: &Table,
    ) -> Result<FileHandle, AdapterError> {
        let token = self.access_token().await?;
        let metadata = json!({
            "name": name,
            "parents": [folder],
            "mimeType": "text/csv",
        });
        let body = multipart_related_body(&metadata, &initial.to_csv()?);

        let response = self
            .http
            .post(self.upload_url())
            .bearer_auth(token.expose())
            .query(&[("uploadType", "multipart")])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={MULTIPART_BOUNDARY}"),
            )
            .body(body)
            .send()
            .await
            .map_err(|err| AdapterError::transport(SERVICE, err))?;

        let created: FileEntry = check_status(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|err| AdapterError::decode(SERVICE, err))?;

        tracing::info!(name, id = %created.id, "created drive file");
        Ok(FileHandle::new(created.id))
    }

    async fn write_table(&self, file: &FileHandle, table: &Table) -> Result<(), AdapterError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .patch(format!("{}/{}", self.upload_url(), file))
            .bearer_auth(token.expose())
            .query(&[("uploadType", "media")])
            .header(reqwest::header::CONTENT_TYPE, "text/csv")
            .body(table.to_csv()?)
            .send()
            .await
            .map_err(|err| AdapterError::transport(SERVICE, err))?;

        check_status(SERVICE, response).await?;
        tracing::debug!(id = %file, rows = table.len(), "overwrote drive file");
        Ok(())
    }
}
