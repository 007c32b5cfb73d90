//! Certificate parsing and the public-key wire envelope.
//!
//! The control plane accepts the public key in a PEM envelope whose label is
//! `RSA PUBLIC KEY` for any key algorithm; the header is part of the wire
//! contract and must be emitted verbatim.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use rustls_pki_types::CertificateDer;
use x509_parser::prelude::*;

use crate::keys::ClientKeyPair;

type ParseError = Box<dyn std::error::Error + Send + Sync>;

/// Ephemeral client certificate minted by the control plane.
#[derive(Debug, Clone)]
pub struct EphemeralCertificate {
    der: CertificateDer<'static>,
    not_after: DateTime<Utc>,
}

impl EphemeralCertificate {
    /// The DER-encoded certificate.
    pub fn der(&self) -> &CertificateDer<'static> {
        &self.der
    }

    /// The certificate's `notAfter` validity bound.
    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }
}

/// Encode the public key as the PEM envelope the control plane accepts:
/// an `RSA PUBLIC KEY` header regardless of key algorithm, with the Base64
/// SubjectPublicKeyInfo body wrapped at 64 columns.
pub(crate) fn public_key_pem(key_pair: &ClientKeyPair) -> String {
    let body = BASE64.encode(key_pair.public_key_der());
    let mut wrapped = String::with_capacity(body.len() + body.len() / 64 + 1);
    for (i, chunk) in body.as_bytes().chunks(64).enumerate() {
        if i > 0 {
            wrapped.push('\n');
        }
        wrapped.push_str(std::str::from_utf8(chunk).expect("base64 output is ASCII"));
    }
    format!("-----BEGIN RSA PUBLIC KEY-----\n{wrapped}\n-----END RSA PUBLIC KEY-----\n")
}

/// Parse a PEM certificate into validated DER.
pub(crate) fn certificate_from_pem(pem_str: &str) -> Result<CertificateDer<'static>, ParseError> {
    let block = ::pem::parse(pem_str).map_err(|err| format!("failed to parse PEM: {err}"))?;
    let der = block.contents().to_vec();
    X509Certificate::from_der(&der).map_err(|err| format!("failed to parse X.509: {err:?}"))?;
    Ok(CertificateDer::from(der))
}

/// Parse the PEM certificate returned by `:generateEphemeralCert`.
pub(crate) fn ephemeral_from_pem(pem_str: &str) -> Result<EphemeralCertificate, ParseError> {
    let der = certificate_from_pem(pem_str)?;
    let (_, cert) =
        X509Certificate::from_der(&der).map_err(|err| format!("failed to parse X.509: {err:?}"))?;
    let not_after = DateTime::from_timestamp(cert.validity().not_after.timestamp(), 0)
        .ok_or("certificate notAfter is out of range")?;

    Ok(EphemeralCertificate { der, not_after })
}

/// Strip trailing `.` characters before submitting a token to the Admin API.
///
/// TODO: remove once the upstream OAuth2 token parsing fix ships
/// (https://github.com/GoogleCloudPlatform/cloud-sql-jdbc-socket-factory/issues/565).
pub(crate) fn trim_trailing_dots(token: &str) -> &str {
    token.trim_end_matches('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{CertificateParams, KeyPair};

    fn test_key_pair() -> ClientKeyPair {
        let key_pair = KeyPair::generate().unwrap();
        ClientKeyPair::from_pkcs8_der(key_pair.serialize_der(), key_pair.public_key_der())
    }

    #[test]
    fn test_public_key_pem_envelope() {
        let keys = test_key_pair();
        let pem = public_key_pem(&keys);

        assert!(pem.starts_with("-----BEGIN RSA PUBLIC KEY-----\n"));
        assert!(pem.ends_with("\n-----END RSA PUBLIC KEY-----\n"));
        for line in pem.lines() {
            assert!(line.len() <= 64, "line exceeds 64 columns: {line:?}");
        }
    }

    #[test]
    fn test_public_key_pem_round_trips() {
        let keys = test_key_pair();
        let pem = public_key_pem(&keys);

        let body: String = pem
            .lines()
            .filter(|line| !line.starts_with("-----"))
            .collect();
        let decoded = BASE64.decode(body).unwrap();
        assert_eq!(decoded, keys.public_key_der());
    }

    #[test]
    fn test_ephemeral_from_pem_extracts_not_after() {
        let key_pair = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(vec!["db.example.com".to_string()]).unwrap();
        params.not_before = rcgen::date_time_ymd(2024, 1, 1);
        params.not_after = rcgen::date_time_ymd(2030, 1, 1);
        let cert = params.self_signed(&key_pair).unwrap();

        let ephemeral = ephemeral_from_pem(&cert.pem()).unwrap();
        assert_eq!(
            ephemeral.not_after(),
            DateTime::parse_from_rfc3339("2030-01-01T00:00:00Z").unwrap()
        );
    }

    #[test]
    fn test_certificate_from_pem_rejects_garbage() {
        assert!(certificate_from_pem("not a pem").is_err());
        assert!(certificate_from_pem(
            "-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n"
        )
        .is_err());
    }

    #[test]
    fn test_trim_trailing_dots() {
        assert_eq!(trim_trailing_dots("token.."), "token");
        assert_eq!(trim_trailing_dots("token"), "token");
        assert_eq!(trim_trailing_dots("to.ken."), "to.ken");
        assert_eq!(trim_trailing_dots("..."), "");
    }
}
