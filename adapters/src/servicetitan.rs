//! ServiceTitan implementation of the [`AppointmentApi`] trait.
//!
//! Covers the client-credentials token exchange and the single-appointment
//! lookup on the job planning API. A 404 on lookup is domain data, not a
//! failure, and comes back as a sentinel record.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;

use crate::errors::{check_status, AdapterError};
use crate::models::{AccessToken, AppointmentRecord};
use crate::AppointmentApi;

const SERVICE: &str = "servicetitan";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_AUTH_URL: &str = "https://auth.servicetitan.io";
pub const DEFAULT_API_URL: &str = "https://api.servicetitan.io";

#[derive(Debug)]
pub struct ServiceTitanConfig {
    pub auth_url: String,
    pub api_url: String,
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub app_key: SecretString,
}

pub struct ServiceTitan {
    http: Client,
    config: ServiceTitanConfig,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

impl ServiceTitan {
    pub fn new(config: ServiceTitanConfig) -> Result<Self, AdapterError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| AdapterError::transport(SERVICE, err))?;
        Ok(Self { http, config })
    }

    fn token_url(&self) -> String {
        format!("{}/connect/token", self.config.auth_url.trim_end_matches('/'))
    }

    fn appointment_url(&self, id: i64) -> String {
        format!(
            "{}/jpm/v2/tenant/{}/appointments/{id}",
            self.config.api_url.trim_end_matches('/'),
            self.config.tenant_id
        )
    }
}

#[async_trait]
impl AppointmentApi for ServiceTitan {
    async fn authenticate(&self) -> Result<AccessToken, AdapterError> {
        let response = self
            .http
            .post(self.token_url())
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.expose_secret()),
            ])
            .send()
            .await
            .map_err(|err| AdapterError::auth(SERVICE, err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::auth(
                SERVICE,
                format!("token endpoint returned {status}: {body}"),
            ));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|err| AdapterError::auth(SERVICE, err))?;
        tracing::debug!(expires_in = ?token.expires_in, "obtained servicetitan token");
        Ok(AccessToken::new(token.access_token))
    }

    async fn fetch_appointment(
        &self,
        id: i64,
        token: &AccessToken,
    ) -> Result<AppointmentRecord, AdapterError> {
        let response = self
            .http
            .get(self.appointment_url(id))
            .bearer_auth(token.expose())
            .header("ST-App-Key", self.config.app_key.expose_secret())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| AdapterError::transport(SERVICE, err))?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(id, "appointment not found upstream");
            return Ok(AppointmentRecord::not_found(id));
        }

        let payload: Value = check_status(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|err| AdapterError::decode(SERVICE, err))?;

        AppointmentRecord::from_payload(id, payload)
    }
}
