//! # Cloud SQL Connector
//!
//! Mediates secure connections to managed Cloud SQL instances. Given an
//! instance connection name, the connector fetches the instance's endpoints
//! and server certificate authority from the Admin API, submits a public key
//! to mint a short-lived client certificate, and assembles reusable TLS
//! material that drivers use to open a mutually-authenticated socket.
//!
//! The core entry point is [`ConnectionInfoRepository`]: one call resolves a
//! [`ConnectionInfo`] bundling the endpoint map, the TLS material, and the
//! expiration an outer refresh scheduler keys on.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use cloudsql_connector::{
//!     AuthType, ClientKeyPair, ConnectionInfoRepository, ConnectorConfig, InstanceName,
//!     NoTokenSupplier, SqlAdminApi,
//! };
//!
//! let config = ConnectorConfig::builder().build()?;
//! let repository = ConnectionInfoRepository::new(SqlAdminApi::new(&config)?);
//!
//! let instance = InstanceName::parse("my-project:us-central1:my-db")?;
//! let info = repository
//!     .get_connection_info(
//!         &instance,
//!         Arc::new(NoTokenSupplier),
//!         AuthType::Password,
//!         Arc::new(key_pair),
//!     )
//!     .await?;
//!
//! let tls = info.tls_material().client_config();
//! ```
//!
//! Connection caching, refresh scheduling, and the socket factory live in
//! outer layers; this crate resolves one cycle of connection info.

pub mod admin;
pub mod auth;
pub mod certs;
pub mod config;
pub mod error;
pub mod instance;
pub mod keys;
pub mod metadata;
pub mod repository;
pub mod tls;

pub use admin::SqlAdminApi;
pub use auth::{
    AccessToken, AccessTokenSupplier, AuthType, Credentials, NoTokenSupplier, StaticTokenSupplier,
};
pub use certs::EphemeralCertificate;
pub use config::{ConnectorConfig, ConnectorConfigBuilder, CredentialSource, CredentialsSupplier};
pub use error::{ConnectError, ConnectResult, ErrorKind};
pub use instance::InstanceName;
pub use keys::ClientKeyPair;
pub use metadata::{InstanceMetadata, IpType};
pub use repository::{ConnectionInfo, ConnectionInfoRepository};
pub use tls::TlsMaterial;
