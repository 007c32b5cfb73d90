//! Cloud SQL Admin API client.
//!
//! Thin HTTP client for the two control-plane operations the connector
//! needs: reading an instance's connect settings and minting an ephemeral
//! client certificate. Error bodies follow the Google JSON error shape; the
//! first error's `reason` drives the user-facing mapping.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::config::ConnectorConfig;
use crate::error::{ConnectError, ConnectResult};
use crate::instance::InstanceName;

const DEFAULT_ROOT_URL: &str = "https://sqladmin.googleapis.com/";
const DEFAULT_SERVICE_PATH: &str = "sql/v1beta4/";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("cloudsql-connector/", env!("CARGO_PKG_VERSION"));

/// Instance connect settings returned by the control plane.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConnectSettings {
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub backend_type: String,
    #[serde(default)]
    pub database_version: String,
    #[serde(default)]
    pub ip_addresses: Vec<IpMapping>,
    #[serde(default)]
    pub dns_name: Option<String>,
    #[serde(default)]
    pub server_ca_cert: Option<SslCert>,
}

/// One assigned endpoint of an instance.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IpMapping {
    #[serde(rename = "type", default)]
    pub ip_type: String,
    #[serde(default)]
    pub ip_address: String,
}

/// PEM-encoded certificate wrapper used in several responses.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SslCert {
    #[serde(default)]
    pub cert: String,
}

/// Request body for `:generateEphemeralCert`.
#[derive(Debug, Serialize)]
pub(crate) struct GenerateEphemeralCertRequest {
    pub public_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

/// Response body for `:generateEphemeralCert`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateEphemeralCertResponse {
    #[serde(default)]
    pub ephemeral_cert: Option<SslCert>,
}

/// Google JSON error envelope.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetails,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetails {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorItem>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorItem {
    #[serde(default)]
    reason: String,
}

/// Failure of an Admin API call, before instance context is attached.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub(crate) struct ApiFailure {
    /// Reason code of the first error entry, when the body carried one.
    pub reason: Option<String>,
    pub message: String,
    #[source]
    pub source: Option<reqwest::Error>,
}

impl ApiFailure {
    fn transport(err: reqwest::Error) -> Self {
        ApiFailure {
            reason: None,
            message: err.to_string(),
            source: Some(err),
        }
    }

    fn from_error_body(status: reqwest::StatusCode, body: &str) -> Self {
        match serde_json::from_str::<ApiErrorBody>(body) {
            Ok(parsed) => ApiFailure {
                reason: parsed
                    .error
                    .errors
                    .first()
                    .map(|item| item.reason.clone())
                    .filter(|reason| !reason.is_empty()),
                message: format!("[{}] {}", status.as_u16(), parsed.error.message),
                source: None,
            },
            Err(_) => ApiFailure {
                reason: None,
                message: format!("[{}] {}", status.as_u16(), body.trim()),
                source: None,
            },
        }
    }

    fn decode(err: serde_json::Error) -> Self {
        ApiFailure {
            reason: None,
            message: format!("failed to decode Admin API response: {err}"),
            source: None,
        }
    }
}

/// HTTP client for the Cloud SQL Admin API.
///
/// Cheap to clone; safe to share across concurrent refresh cycles.
#[derive(Debug, Clone)]
pub struct SqlAdminApi {
    http: reqwest::Client,
    base_url: String,
}

impl SqlAdminApi {
    /// Build a client from the connector configuration, applying the default
    /// endpoint for any part the configuration does not override.
    pub fn new(config: &ConnectorConfig) -> ConnectResult<Self> {
        let root_url = config.admin_root_url().unwrap_or(DEFAULT_ROOT_URL);
        let service_path = config.admin_service_path().unwrap_or(DEFAULT_SERVICE_PATH);
        let base_url = join_base_url(root_url, service_path);

        Url::parse(&base_url).map_err(|err| {
            ConnectError::invalid_configuration(format!(
                "invalid Admin API base URL {base_url:?}: {err}"
            ))
        })?;

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| {
                ConnectError::invalid_configuration(format!("failed to create HTTP client: {err}"))
            })?;

        Ok(SqlAdminApi { http, base_url })
    }

    /// `GET projects/{project}/instances/{instance}/connectSettings`.
    pub(crate) async fn get_connect_settings(
        &self,
        instance: &InstanceName,
    ) -> Result<ConnectSettings, ApiFailure> {
        let url = format!(
            "{}projects/{}/instances/{}/connectSettings",
            self.base_url,
            instance.project_id(),
            instance.instance_id()
        );

        debug!(instance = %instance, "fetching connect settings");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(ApiFailure::transport)?;
        let status = response.status();
        let body = response.text().await.map_err(ApiFailure::transport)?;

        if !status.is_success() {
            return Err(ApiFailure::from_error_body(status, &body));
        }
        serde_json::from_str(&body).map_err(ApiFailure::decode)
    }

    /// `POST projects/{project}/instances/{instance}:generateEphemeralCert`.
    pub(crate) async fn generate_ephemeral_cert(
        &self,
        instance: &InstanceName,
        request: &GenerateEphemeralCertRequest,
    ) -> Result<GenerateEphemeralCertResponse, ApiFailure> {
        let url = format!(
            "{}projects/{}/instances/{}:generateEphemeralCert",
            self.base_url,
            instance.project_id(),
            instance.instance_id()
        );

        debug!(instance = %instance, "requesting ephemeral certificate");

        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(ApiFailure::transport)?;
        let status = response.status();
        let body = response.text().await.map_err(ApiFailure::transport)?;

        if !status.is_success() {
            return Err(ApiFailure::from_error_body(status, &body));
        }
        serde_json::from_str(&body).map_err(ApiFailure::decode)
    }
}

/// Map an Admin API failure to a user-facing error, keyed on the reason code
/// when one is present, falling back to the call site's generic description.
pub(crate) fn add_error_context(
    failure: ApiFailure,
    instance: &InstanceName,
    fallback: &str,
) -> ConnectError {
    match failure.reason.as_deref() {
        Some("accessNotConfigured") => ConnectError::ApiNotEnabled {
            instance: instance.connection_name().to_string(),
            project: instance.project_id().to_string(),
        },
        Some("notAuthorized") => ConnectError::NotAuthorized {
            instance: instance.connection_name().to_string(),
            project: instance.project_id().to_string(),
        },
        _ => ConnectError::ApiError {
            instance: instance.connection_name().to_string(),
            message: fallback.to_string(),
            source: Some(Box::new(failure)),
        },
    }
}

fn join_base_url(root_url: &str, service_path: &str) -> String {
    let mut base = root_url.trim_end_matches('/').to_string();
    base.push('/');
    base.push_str(service_path.trim_matches('/'));
    if !base.ends_with('/') {
        base.push('/');
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_join_base_url_normalizes_slashes() {
        assert_eq!(
            join_base_url("https://sqladmin.googleapis.com", "sql/v1beta4"),
            "https://sqladmin.googleapis.com/sql/v1beta4/"
        );
        assert_eq!(
            join_base_url("https://sqladmin.googleapis.com/", "/sql/v1beta4/"),
            "https://sqladmin.googleapis.com/sql/v1beta4/"
        );
        assert_eq!(
            join_base_url("http://localhost:3000", ""),
            "http://localhost:3000/"
        );
    }

    #[test]
    fn test_error_body_reason_extraction() {
        let body = r#"{"error":{"code":403,"message":"Access Not Configured.","errors":[{"reason":"accessNotConfigured"}]}}"#;
        let failure = ApiFailure::from_error_body(reqwest::StatusCode::FORBIDDEN, body);
        assert_eq!(failure.reason.as_deref(), Some("accessNotConfigured"));
        assert!(failure.message.contains("403"));
    }

    #[test]
    fn test_error_body_without_errors_array() {
        let body = r#"{"error":{"code":500,"message":"boom"}}"#;
        let failure =
            ApiFailure::from_error_body(reqwest::StatusCode::INTERNAL_SERVER_ERROR, body);
        assert!(failure.reason.is_none());
        assert!(failure.message.contains("boom"));
    }

    #[test]
    fn test_error_body_plaintext_fallback() {
        let failure =
            ApiFailure::from_error_body(reqwest::StatusCode::BAD_GATEWAY, "upstream broke");
        assert!(failure.reason.is_none());
        assert!(failure.message.contains("upstream broke"));
    }

    #[test]
    fn test_add_error_context_maps_reasons() {
        let instance = InstanceName::parse("myproj:us-central1:db").unwrap();

        let disabled = add_error_context(
            ApiFailure {
                reason: Some("accessNotConfigured".to_string()),
                message: "Access Not Configured.".to_string(),
                source: None,
            },
            &instance,
            "Failed to update metadata for Cloud SQL instance.",
        );
        assert_eq!(disabled.kind(), ErrorKind::ApiDisabled);

        let denied = add_error_context(
            ApiFailure {
                reason: Some("notAuthorized".to_string()),
                message: "The client is not authorized.".to_string(),
                source: None,
            },
            &instance,
            "Failed to update metadata for Cloud SQL instance.",
        );
        assert_eq!(denied.kind(), ErrorKind::AccessDenied);

        let fallback = add_error_context(
            ApiFailure {
                reason: None,
                message: "connection reset".to_string(),
                source: None,
            },
            &instance,
            "Failed to create ephemeral certificate for the Cloud SQL instance.",
        );
        assert_eq!(fallback.kind(), ErrorKind::Transient);
        assert!(fallback
            .to_string()
            .contains("Failed to create ephemeral certificate"));
    }

    #[test]
    fn test_ephemeral_cert_request_omits_absent_token() {
        let request = GenerateEphemeralCertRequest {
            public_key: "PEM".to_string(),
            access_token: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"public_key":"PEM"}"#);

        let request = GenerateEphemeralCertRequest {
            public_key: "PEM".to_string(),
            access_token: Some("tok".to_string()),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"public_key":"PEM","access_token":"tok"}"#);
    }

    #[test]
    fn test_connect_settings_decoding() {
        let body = r#"{
            "region": "us-central1",
            "backendType": "SECOND_GEN",
            "databaseVersion": "POSTGRES_14",
            "ipAddresses": [
                {"type": "PRIMARY", "ipAddress": "1.2.3.4"},
                {"type": "PRIVATE", "ipAddress": "10.0.0.4"}
            ],
            "dnsName": "abc.psc.example.",
            "serverCaCert": {"cert": "PEM"}
        }"#;

        let settings: ConnectSettings = serde_json::from_str(body).unwrap();
        assert_eq!(settings.region, "us-central1");
        assert_eq!(settings.backend_type, "SECOND_GEN");
        assert_eq!(settings.ip_addresses.len(), 2);
        assert_eq!(settings.ip_addresses[0].ip_type, "PRIMARY");
        assert_eq!(settings.dns_name.as_deref(), Some("abc.psc.example."));
        assert_eq!(settings.server_ca_cert.unwrap().cert, "PEM");
    }
}
