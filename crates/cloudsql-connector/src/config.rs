//! Connector configuration record.
//!
//! [`ConnectorConfig`] is an immutable value with structural equality and
//! hashing, used by the outer connector registry to key shared state. The
//! three credential sources are mutually exclusive and collapse into a
//! single [`CredentialSource`] variant at build time.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::auth::Credentials;
use crate::error::{ConnectError, ConnectResult};

/// Supplier of credentials, for callers that manage their own refresh.
pub type CredentialsSupplier = Arc<dyn Fn() -> Credentials + Send + Sync>;

/// Where the connector obtains its API credentials.
///
/// Suppliers compare equal only when they are the same allocation; two
/// independently created suppliers with identical behavior are unequal.
#[derive(Clone, Default)]
pub enum CredentialSource {
    /// Use the environment's default credentials.
    #[default]
    Default,
    /// Load credentials from a file path.
    Path(String),
    /// Use the given credentials value.
    Value(Credentials),
    /// Obtain credentials from the supplier on demand.
    Supplier(CredentialsSupplier),
}

impl std::fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialSource::Default => f.write_str("Default"),
            CredentialSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            CredentialSource::Value(credentials) => {
                f.debug_tuple("Value").field(credentials).finish()
            }
            CredentialSource::Supplier(_) => f.write_str("Supplier(..)"),
        }
    }
}

impl PartialEq for CredentialSource {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CredentialSource::Default, CredentialSource::Default) => true,
            (CredentialSource::Path(a), CredentialSource::Path(b)) => a == b,
            (CredentialSource::Value(a), CredentialSource::Value(b)) => a == b,
            (CredentialSource::Supplier(a), CredentialSource::Supplier(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for CredentialSource {}

impl Hash for CredentialSource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            CredentialSource::Default => 0u8.hash(state),
            CredentialSource::Path(path) => {
                1u8.hash(state);
                path.hash(state);
            }
            CredentialSource::Value(credentials) => {
                2u8.hash(state);
                credentials.hash(state);
            }
            CredentialSource::Supplier(supplier) => {
                3u8.hash(state);
                (Arc::as_ptr(supplier) as *const () as usize).hash(state);
            }
        }
    }
}

/// Immutable connector configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ConnectorConfig {
    target_principal: Option<String>,
    delegates: Vec<String>,
    admin_root_url: Option<String>,
    admin_service_path: Option<String>,
    credentials: CredentialSource,
}

impl ConnectorConfig {
    pub fn builder() -> ConnectorConfigBuilder {
        ConnectorConfigBuilder::default()
    }

    /// Service account to impersonate, if any.
    pub fn target_principal(&self) -> Option<&str> {
        self.target_principal.as_deref()
    }

    /// Ordered impersonation delegation chain.
    pub fn delegates(&self) -> &[String] {
        &self.delegates
    }

    /// Admin API root URL override.
    pub fn admin_root_url(&self) -> Option<&str> {
        self.admin_root_url.as_deref()
    }

    /// Admin API service path override.
    pub fn admin_service_path(&self) -> Option<&str> {
        self.admin_service_path.as_deref()
    }

    /// The configured credential source.
    pub fn credential_source(&self) -> &CredentialSource {
        &self.credentials
    }

    /// The credentials file path, when that source is configured.
    pub fn credentials_path(&self) -> Option<&str> {
        match &self.credentials {
            CredentialSource::Path(path) => Some(path),
            _ => None,
        }
    }

    /// The credentials value, when that source is configured.
    pub fn credentials(&self) -> Option<&Credentials> {
        match &self.credentials {
            CredentialSource::Value(credentials) => Some(credentials),
            _ => None,
        }
    }

    /// The credentials supplier, when that source is configured.
    pub fn credentials_supplier(&self) -> Option<&CredentialsSupplier> {
        match &self.credentials {
            CredentialSource::Supplier(supplier) => Some(supplier),
            _ => None,
        }
    }
}

/// Builder for [`ConnectorConfig`].
#[derive(Default)]
pub struct ConnectorConfigBuilder {
    target_principal: Option<String>,
    delegates: Vec<String>,
    admin_root_url: Option<String>,
    admin_service_path: Option<String>,
    credentials_path: Option<String>,
    credentials: Option<Credentials>,
    credentials_supplier: Option<CredentialsSupplier>,
}

impl ConnectorConfigBuilder {
    pub fn with_target_principal(mut self, target_principal: impl Into<String>) -> Self {
        self.target_principal = Some(target_principal.into());
        self
    }

    pub fn with_delegates(mut self, delegates: Vec<String>) -> Self {
        self.delegates = delegates;
        self
    }

    pub fn with_admin_root_url(mut self, admin_root_url: impl Into<String>) -> Self {
        self.admin_root_url = Some(admin_root_url.into());
        self
    }

    pub fn with_admin_service_path(mut self, admin_service_path: impl Into<String>) -> Self {
        self.admin_service_path = Some(admin_service_path.into());
        self
    }

    pub fn with_credentials_path(mut self, credentials_path: impl Into<String>) -> Self {
        self.credentials_path = Some(credentials_path.into());
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_credentials_supplier(mut self, supplier: CredentialsSupplier) -> Self {
        self.credentials_supplier = Some(supplier);
        self
    }

    /// Build the configuration, enforcing that at most one credential source
    /// is set.
    pub fn build(self) -> ConnectResult<ConnectorConfig> {
        let sources_set = [
            self.credentials_path.is_some(),
            self.credentials.is_some(),
            self.credentials_supplier.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();
        if sources_set > 1 {
            return Err(ConnectError::invalid_configuration(
                "more than one credentials source has a value \
                 (credentials, credentials_path, credentials_supplier)",
            ));
        }

        let credentials = if let Some(path) = self.credentials_path {
            CredentialSource::Path(path)
        } else if let Some(credentials) = self.credentials {
            CredentialSource::Value(credentials)
        } else if let Some(supplier) = self.credentials_supplier {
            CredentialSource::Supplier(supplier)
        } else {
            CredentialSource::Default
        };

        Ok(ConnectorConfig {
            target_principal: self.target_principal,
            delegates: self.delegates,
            admin_root_url: self.admin_root_url,
            admin_service_path: self.admin_service_path,
            credentials,
        })
    }
}
