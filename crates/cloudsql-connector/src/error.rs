//! Connector error types.
//!
//! Error definitions with a stable [`ErrorKind`] classification that callers
//! use to decide between retrying, reconfiguring, and surfacing to the user.
//! Instance-scoped errors carry the connection name and render it as a
//! `[project:region:instance]` prefix.

use thiserror::Error;

/// Error that can occur while resolving connection info for an instance.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The instance connection name is not a `project:region:instance` triple.
    #[error(
        "invalid instance connection name, expected <PROJECT>:<REGION>:<INSTANCE>, got: {name}"
    )]
    MalformedInstanceName { name: String },

    /// The control plane reported a different region than the connection name.
    #[error(
        "[{instance}] The region specified for the Cloud SQL instance is incorrect. \
         Please verify the instance connection name."
    )]
    RegionMismatch { instance: String },

    /// The instance is not a Second Generation instance.
    #[error(
        "[{instance}] Connections to Cloud SQL instance not supported - not a Second \
         Generation instance."
    )]
    UnsupportedBackendType { instance: String },

    /// IAM authentication was requested against a SQL Server instance.
    #[error("[{instance}] IAM Authentication is not supported for SQL Server instances.")]
    IamAuthNotSupported { instance: String },

    /// The crypto provider cannot offer TLS 1.3, which IAM authentication requires.
    #[error(
        "[{instance}] Unable to create a TLS client configuration for the Cloud SQL \
         instance. TLSv1.3 is not supported by the crypto provider and is required to \
         connect using IAM authentication"
    )]
    TlsVersionNotSupported { instance: String },

    /// IAM authentication without an access token.
    #[error(
        "[{instance}] An access token is required for IAM authentication, but the \
         token supplier did not return one."
    )]
    AccessTokenRequired { instance: String },

    /// The supplied access token is already expired.
    #[error("access token has expired and cannot be used to authenticate")]
    AccessTokenExpired,

    /// The instance has no endpoint the connector can reach.
    #[error(
        "[{instance}] Unable to connect to Cloud SQL instance: instance does not have \
         an assigned IP address."
    )]
    NoAssignedIp { instance: String },

    /// The server CA certificate in the instance metadata failed to parse.
    #[error(
        "[{instance}] Unable to parse the server CA certificate for the Cloud SQL instance."
    )]
    InvalidServerCaCert {
        instance: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The minted ephemeral certificate failed to parse.
    #[error(
        "[{instance}] Unable to parse the ephemeral certificate for the Cloud SQL instance."
    )]
    InvalidEphemeralCert {
        instance: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// TLS client configuration could not be built from the key material.
    #[error(
        "[{instance}] Unable to create a TLS client configuration for the Cloud SQL \
         instance: {message}"
    )]
    TlsConfig { instance: String, message: String },

    /// The Admin API is not enabled for the project.
    #[error(
        "[{instance}] The Google Cloud SQL Admin API is not enabled for the project \
         \"{project}\". Please use the Google Developers Console to enable it: \
         https://console.cloud.google.com/apis/api/sqladmin/overview?project={project}"
    )]
    ApiNotEnabled { instance: String, project: String },

    /// The instance does not exist or the caller lacks permission to see it.
    #[error(
        "[{instance}] The Cloud SQL Instance does not exist or your account is not \
         authorized to access it. Please verify the instance connection name and check \
         the IAM permissions for project \"{project}\""
    )]
    NotAuthorized { instance: String, project: String },

    /// Any other Admin API or transport failure.
    #[error("[{instance}] {message}")]
    ApiError {
        instance: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The connector configuration is invalid.
    #[error("invalid connector configuration: {message}")]
    InvalidConfiguration { message: String },

    /// The orchestration was cancelled before connection info was resolved.
    #[error("[{instance}] connection info refresh was cancelled")]
    Cancelled { instance: String },
}

/// Abstract classification of a [`ConnectError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    Unsupported,
    AuthRequired,
    NotAvailable,
    CertificateInvalid,
    AccessDenied,
    ApiDisabled,
    Transient,
    Cancelled,
}

impl ConnectError {
    /// Classify this error into the abstract taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConnectError::MalformedInstanceName { .. }
            | ConnectError::RegionMismatch { .. }
            | ConnectError::InvalidConfiguration { .. } => ErrorKind::InvalidArgument,
            ConnectError::UnsupportedBackendType { .. }
            | ConnectError::IamAuthNotSupported { .. }
            | ConnectError::TlsVersionNotSupported { .. } => ErrorKind::Unsupported,
            ConnectError::AccessTokenRequired { .. } | ConnectError::AccessTokenExpired => {
                ErrorKind::AuthRequired
            }
            ConnectError::NoAssignedIp { .. } => ErrorKind::NotAvailable,
            ConnectError::InvalidServerCaCert { .. }
            | ConnectError::InvalidEphemeralCert { .. }
            | ConnectError::TlsConfig { .. } => ErrorKind::CertificateInvalid,
            ConnectError::NotAuthorized { .. } => ErrorKind::AccessDenied,
            ConnectError::ApiNotEnabled { .. } => ErrorKind::ApiDisabled,
            ConnectError::ApiError { .. } => ErrorKind::Transient,
            ConnectError::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// Check if retrying the operation may succeed without intervention.
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Create a transient Admin API error with an underlying cause.
    pub fn api_error(
        instance: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConnectError::ApiError {
            instance: instance.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid-configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        ConnectError::InvalidConfiguration {
            message: message.into(),
        }
    }
}

/// Result type for connector operations.
pub type ConnectResult<T> = Result<T, ConnectError>;
