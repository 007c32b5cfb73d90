//! Connection info orchestration.
//!
//! For one refresh cycle the repository runs the token fetch and the
//! metadata fetch in parallel, mints the ephemeral certificate as soon as the
//! token is known, assembles the TLS material once both API calls complete,
//! and computes the effective expiration. Dropping the returned future aborts
//! the pending sub-tasks; in-flight HTTP calls may still complete and their
//! results are discarded.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, instrument};

use crate::admin::{self, GenerateEphemeralCertRequest, SqlAdminApi};
use crate::auth::{AccessToken, AccessTokenSupplier, AuthType};
use crate::certs::{self, EphemeralCertificate};
use crate::error::{ConnectError, ConnectResult};
use crate::instance::InstanceName;
use crate::keys::ClientKeyPair;
use crate::metadata::{self, InstanceMetadata};
use crate::tls::{self, TlsMaterial};

const METADATA_FAILURE: &str = "Failed to update metadata for Cloud SQL instance.";
const CERT_FAILURE: &str = "Failed to create ephemeral certificate for the Cloud SQL instance.";

/// Everything a driver needs to open an authenticated socket to an instance.
///
/// Created on each refresh cycle and replaced, never mutated; consumers hold
/// it until `expires_at`.
#[derive(Debug)]
pub struct ConnectionInfo {
    metadata: InstanceMetadata,
    tls_material: TlsMaterial,
    expires_at: DateTime<Utc>,
}

impl ConnectionInfo {
    /// The instance's validated endpoints and server CA.
    pub fn metadata(&self) -> &InstanceMetadata {
        &self.metadata
    }

    /// The TLS material binding the client identity to the instance CA.
    pub fn tls_material(&self) -> &TlsMaterial {
        &self.tls_material
    }

    /// When this connection info stops being usable: the certificate's
    /// `notAfter`, clamped to the token expiry under IAM authentication.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

/// Resolves fresh [`ConnectionInfo`] from the Cloud SQL Admin API.
#[derive(Debug, Clone)]
pub struct ConnectionInfoRepository {
    api: SqlAdminApi,
}

impl ConnectionInfoRepository {
    pub fn new(api: SqlAdminApi) -> Self {
        ConnectionInfoRepository { api }
    }

    /// Resolve connection info for the instance.
    ///
    /// The key pair is produced externally (typically once, shared across
    /// refresh cycles) and treated as immutable. No timeout is enforced here;
    /// callers bound the returned future themselves.
    #[instrument(skip(self, token_supplier, key_pair), fields(instance = %instance))]
    pub async fn get_connection_info(
        &self,
        instance: &InstanceName,
        token_supplier: Arc<dyn AccessTokenSupplier>,
        auth_type: AuthType,
        key_pair: Arc<ClientKeyPair>,
    ) -> ConnectResult<ConnectionInfo> {
        let token_task = TaskGuard::spawn({
            let instance = instance.clone();
            async move { fetch_token(token_supplier, instance, auth_type).await }
        });
        let metadata_task = TaskGuard::spawn({
            let api = self.api.clone();
            let instance = instance.clone();
            async move { fetch_metadata(api, instance, auth_type).await }
        });

        // Joins happen in dependency order; the earliest failing stage wins.
        let token = token_task.join(instance).await??;
        let cert_task = TaskGuard::spawn({
            let api = self.api.clone();
            let key_pair = Arc::clone(&key_pair);
            let instance = instance.clone();
            let token = token.clone();
            async move { fetch_ephemeral_cert(api, key_pair, instance, token, auth_type).await }
        });

        let instance_metadata = metadata_task.join(instance).await??;
        let ephemeral_cert = cert_task.join(instance).await??;

        let tls_material = tls::assemble(
            &key_pair,
            &instance_metadata,
            &ephemeral_cert,
            auth_type,
            instance,
        )?;
        let expires_at = effective_expiration(
            ephemeral_cert.not_after(),
            token.as_ref().and_then(AccessToken::expires_at),
            auth_type,
        );

        debug!(instance = %instance, %expires_at, "connection info resolved");

        Ok(ConnectionInfo {
            metadata: instance_metadata,
            tls_material,
            expires_at,
        })
    }
}

async fn fetch_token(
    token_supplier: Arc<dyn AccessTokenSupplier>,
    instance: InstanceName,
    auth_type: AuthType,
) -> ConnectResult<Option<AccessToken>> {
    let token = token_supplier.get().await?;
    if auth_type == AuthType::Iam && token.is_none() {
        return Err(ConnectError::AccessTokenRequired {
            instance: instance.connection_name().to_string(),
        });
    }
    Ok(token)
}

async fn fetch_metadata(
    api: SqlAdminApi,
    instance: InstanceName,
    auth_type: AuthType,
) -> ConnectResult<InstanceMetadata> {
    let settings = api
        .get_connect_settings(&instance)
        .await
        .map_err(|failure| admin::add_error_context(failure, &instance, METADATA_FAILURE))?;
    metadata::metadata_from_settings(settings, &instance, auth_type)
}

async fn fetch_ephemeral_cert(
    api: SqlAdminApi,
    key_pair: Arc<ClientKeyPair>,
    instance: InstanceName,
    token: Option<AccessToken>,
    auth_type: AuthType,
) -> ConnectResult<EphemeralCertificate> {
    let mut request = GenerateEphemeralCertRequest {
        public_key: certs::public_key_pem(&key_pair),
        access_token: None,
    };
    if auth_type == AuthType::Iam {
        if let Some(token) = &token {
            request.access_token = Some(certs::trim_trailing_dots(token.value()).to_string());
        }
    }

    let response = api
        .generate_ephemeral_cert(&instance, &request)
        .await
        .map_err(|failure| admin::add_error_context(failure, &instance, CERT_FAILURE))?;

    let cert_pem = response
        .ephemeral_cert
        .map(|cert| cert.cert)
        .unwrap_or_default();
    certs::ephemeral_from_pem(&cert_pem).map_err(|err| ConnectError::InvalidEphemeralCert {
        instance: instance.connection_name().to_string(),
        source: Some(err),
    })
}

/// The earlier of the certificate's `notAfter` and, under IAM auth, the
/// token expiry.
fn effective_expiration(
    cert_not_after: DateTime<Utc>,
    token_expires_at: Option<DateTime<Utc>>,
    auth_type: AuthType,
) -> DateTime<Utc> {
    match (auth_type, token_expires_at) {
        (AuthType::Iam, Some(token_expires_at)) if cert_not_after > token_expires_at => {
            token_expires_at
        }
        _ => cert_not_after,
    }
}

/// Sub-task handle that aborts the task when dropped, so cancelling the
/// orchestration cancels pending fetches best-effort.
struct TaskGuard<T> {
    handle: JoinHandle<T>,
}

impl<T: Send + 'static> TaskGuard<T> {
    fn spawn<F>(future: F) -> Self
    where
        F: std::future::Future<Output = T> + Send + 'static,
    {
        TaskGuard {
            handle: tokio::spawn(future),
        }
    }

    async fn join(mut self, instance: &InstanceName) -> ConnectResult<T> {
        match (&mut self.handle).await {
            Ok(value) => Ok(value),
            Err(err) if err.is_cancelled() => Err(ConnectError::Cancelled {
                instance: instance.connection_name().to_string(),
            }),
            Err(err) => std::panic::resume_unwind(err.into_panic()),
        }
    }
}

impl<T> Drop for TaskGuard<T> {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
