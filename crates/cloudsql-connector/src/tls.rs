//! TLS material assembly.
//!
//! Binds the client key pair, the minted ephemeral certificate, and the
//! instance's server CA into a reusable rustls client configuration. The
//! material is safe to share across connections to the same instance until
//! the connection info expires.

use std::sync::Arc;

use rustls::{ClientConfig, RootCertStore};
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use tracing::{debug, warn};

use crate::auth::AuthType;
use crate::certs::EphemeralCertificate;
use crate::error::{ConnectError, ConnectResult};
use crate::instance::InstanceName;
use crate::keys::ClientKeyPair;
use crate::metadata::InstanceMetadata;

/// TLS artifacts for one instance: the client identity (private key plus
/// ephemeral certificate chain), the single trust anchor, and a ready
/// [`ClientConfig`] built from them.
pub struct TlsMaterial {
    client_config: Arc<ClientConfig>,
    client_cert_chain: Vec<CertificateDer<'static>>,
    private_key: PrivateKeyDer<'static>,
    trust_anchor: CertificateDer<'static>,
}

impl TlsMaterial {
    /// The assembled client configuration, shareable across sockets.
    pub fn client_config(&self) -> Arc<ClientConfig> {
        Arc::clone(&self.client_config)
    }

    /// The ephemeral certificate chain presented to the instance.
    pub fn client_cert_chain(&self) -> &[CertificateDer<'static>] {
        &self.client_cert_chain
    }

    /// The client private key, for drivers that build their own TLS stack.
    pub fn private_key(&self) -> PrivateKeyDer<'static> {
        self.private_key.clone_key()
    }

    /// The server CA certificate, the sole trust anchor.
    pub fn trust_anchor(&self) -> &CertificateDer<'static> {
        &self.trust_anchor
    }
}

impl std::fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("client_cert_chain_len", &self.client_cert_chain.len())
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// Assemble TLS material for the instance.
///
/// Prefers a TLS 1.3-only configuration. When the crypto provider cannot
/// offer TLS 1.3, IAM authentication fails outright and password mode falls
/// back to TLS 1.2 with a warning.
pub(crate) fn assemble(
    key_pair: &ClientKeyPair,
    metadata: &InstanceMetadata,
    ephemeral_cert: &EphemeralCertificate,
    auth_type: AuthType,
    instance: &InstanceName,
) -> ConnectResult<TlsMaterial> {
    let tls_config_error = |message: String| ConnectError::TlsConfig {
        instance: instance.connection_name().to_string(),
        message,
    };

    let mut roots = RootCertStore::empty();
    roots
        .add(metadata.server_ca_cert().clone())
        .map_err(|err| tls_config_error(format!("unusable server CA certificate: {err}")))?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = match ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_protocol_versions(&[&rustls::version::TLS13])
    {
        Ok(builder) => builder,
        Err(_) if auth_type == AuthType::Iam => {
            return Err(ConnectError::TlsVersionNotSupported {
                instance: instance.connection_name().to_string(),
            });
        }
        Err(_) => {
            warn!("TLSv1.3 is not supported by the crypto provider, falling back to TLSv1.2");
            ClientConfig::builder_with_provider(provider)
                .with_protocol_versions(&[&rustls::version::TLS12])
                .map_err(|err| tls_config_error(err.to_string()))?
        }
    };

    let client_cert_chain = vec![ephemeral_cert.der().clone()];
    let client_config = builder
        .with_root_certificates(roots)
        .with_client_auth_cert(client_cert_chain.clone(), key_pair.private_key())
        .map_err(|err| tls_config_error(err.to_string()))?;

    debug!(instance = %instance, "TLS client configuration assembled");

    Ok(TlsMaterial {
        client_config: Arc::new(client_config),
        client_cert_chain,
        private_key: key_pair.private_key(),
        trust_anchor: metadata.server_ca_cert().clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::{ConnectSettings, IpMapping, SslCert};
    use crate::certs;
    use crate::error::ErrorKind;
    use crate::metadata::metadata_from_settings;
    use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair};

    struct Fixture {
        keys: ClientKeyPair,
        metadata: InstanceMetadata,
        ephemeral: EphemeralCertificate,
        instance: InstanceName,
    }

    fn fixture() -> Fixture {
        let ca_key = KeyPair::generate().unwrap();
        let mut ca_params = CertificateParams::default();
        ca_params
            .distinguished_name
            .push(DnType::CommonName, "Cloud SQL Server CA");
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let ca_cert = ca_params.self_signed(&ca_key).unwrap();

        let client_key = KeyPair::generate().unwrap();
        let mut cert_params = CertificateParams::default();
        cert_params
            .distinguished_name
            .push(DnType::CommonName, "ephemeral");
        cert_params.not_after = rcgen::date_time_ymd(2030, 1, 1);
        let ephemeral_pem = cert_params
            .signed_by(&client_key, &ca_cert, &ca_key)
            .unwrap()
            .pem();

        let instance = InstanceName::parse("p:us-central1:i").unwrap();
        let settings = ConnectSettings {
            region: "us-central1".to_string(),
            backend_type: "SECOND_GEN".to_string(),
            database_version: "POSTGRES_14".to_string(),
            ip_addresses: vec![IpMapping {
                ip_type: "PRIMARY".to_string(),
                ip_address: "1.2.3.4".to_string(),
            }],
            dns_name: None,
            server_ca_cert: Some(SslCert {
                cert: ca_cert.pem(),
            }),
        };

        Fixture {
            keys: ClientKeyPair::from_pkcs8_der(
                client_key.serialize_der(),
                client_key.public_key_der(),
            ),
            metadata: metadata_from_settings(settings, &instance, AuthType::Password).unwrap(),
            ephemeral: certs::ephemeral_from_pem(&ephemeral_pem).unwrap(),
            instance,
        }
    }

    #[test]
    fn test_assemble_password_mode() {
        let f = fixture();
        let material =
            assemble(&f.keys, &f.metadata, &f.ephemeral, AuthType::Password, &f.instance).unwrap();

        assert_eq!(material.client_cert_chain().len(), 1);
        assert_eq!(material.trust_anchor(), f.metadata.server_ca_cert());
    }

    #[test]
    fn test_assemble_iam_mode() {
        let f = fixture();
        let material =
            assemble(&f.keys, &f.metadata, &f.ephemeral, AuthType::Iam, &f.instance).unwrap();
        assert_eq!(material.client_cert_chain().len(), 1);
    }

    #[test]
    fn test_assemble_rejects_invalid_key() {
        let f = fixture();
        let broken = ClientKeyPair::from_pkcs8_der(vec![0u8; 8], f.keys.public_key_der().to_vec());

        let err = assemble(&broken, &f.metadata, &f.ephemeral, AuthType::Password, &f.instance)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CertificateInvalid);
        assert!(err.to_string().starts_with("[p:us-central1:i] "));
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let f = fixture();
        let material =
            assemble(&f.keys, &f.metadata, &f.ephemeral, AuthType::Password, &f.instance).unwrap();
        assert!(format!("{material:?}").contains("[REDACTED]"));
    }
}
