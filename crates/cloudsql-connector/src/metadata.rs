//! Instance metadata: endpoints and the server certificate authority.

use std::collections::HashMap;

use rustls_pki_types::CertificateDer;
use tracing::debug;

use crate::admin::ConnectSettings;
use crate::auth::AuthType;
use crate::certs;
use crate::error::{ConnectError, ConnectResult};
use crate::instance::InstanceName;

/// Kind of endpoint used to reach an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpType {
    /// Publicly routable IP address.
    Public,
    /// VPC-internal IP address.
    Private,
    /// Private Service Connect DNS name, resolved by the socket layer.
    Psc,
}

/// Validated instance metadata.
///
/// `Public` and `Private` entries hold IP literals; a `Psc` entry holds the
/// instance's DNS name.
#[derive(Debug, Clone)]
pub struct InstanceMetadata {
    ip_addresses: HashMap<IpType, String>,
    server_ca_cert: CertificateDer<'static>,
}

impl InstanceMetadata {
    /// All endpoints assigned to the instance. Never empty.
    pub fn ip_addresses(&self) -> &HashMap<IpType, String> {
        &self.ip_addresses
    }

    /// The endpoint of the given kind, if assigned.
    pub fn ip_address(&self, ip_type: IpType) -> Option<&str> {
        self.ip_addresses.get(&ip_type).map(String::as_str)
    }

    /// The instance's certificate authority, the sole TLS trust anchor.
    pub fn server_ca_cert(&self) -> &CertificateDer<'static> {
        &self.server_ca_cert
    }
}

/// Validate connect settings and extract the metadata the connector needs.
///
/// Checks run in a fixed order: region, backend generation, database engine
/// compatibility, then the endpoint list and server CA.
pub(crate) fn metadata_from_settings(
    settings: ConnectSettings,
    instance: &InstanceName,
    auth_type: AuthType,
) -> ConnectResult<InstanceMetadata> {
    if settings.region != instance.region_id() {
        return Err(ConnectError::RegionMismatch {
            instance: instance.connection_name().to_string(),
        });
    }
    if settings.backend_type != "SECOND_GEN" {
        return Err(ConnectError::UnsupportedBackendType {
            instance: instance.connection_name().to_string(),
        });
    }
    if auth_type == AuthType::Iam && settings.database_version.contains("SQLSERVER") {
        return Err(ConnectError::IamAuthNotSupported {
            instance: instance.connection_name().to_string(),
        });
    }

    let mut ip_addresses = HashMap::new();
    for mapping in settings.ip_addresses {
        match mapping.ip_type.as_str() {
            "PRIMARY" => {
                ip_addresses.insert(IpType::Public, mapping.ip_address);
            }
            "PRIVATE" => {
                ip_addresses.insert(IpType::Private, mapping.ip_address);
            }
            // Unknown endpoint kinds are ignored.
            _ => {}
        }
    }
    if let Some(dns_name) = settings.dns_name.filter(|name| !name.is_empty()) {
        ip_addresses.insert(IpType::Psc, dns_name);
    }
    if ip_addresses.is_empty() {
        return Err(ConnectError::NoAssignedIp {
            instance: instance.connection_name().to_string(),
        });
    }

    let ca_pem = settings
        .server_ca_cert
        .map(|cert| cert.cert)
        .unwrap_or_default();
    let server_ca_cert = certs::certificate_from_pem(&ca_pem).map_err(|err| {
        ConnectError::InvalidServerCaCert {
            instance: instance.connection_name().to_string(),
            source: Some(err),
        }
    })?;

    debug!(instance = %instance, endpoints = ip_addresses.len(), "instance metadata validated");

    Ok(InstanceMetadata {
        ip_addresses,
        server_ca_cert,
    })
}
