//! Client key material.
//!
//! The connector does not generate keys; the caller produces a key pair
//! (typically once, shared across refresh cycles) and hands it over in DER
//! form. The public half is submitted to the control plane for signing, the
//! private half ends up in the TLS client configuration.

use rustls_pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};

/// DER-encoded client key pair: a PKCS#8 private key and the matching
/// SubjectPublicKeyInfo.
#[derive(Clone)]
pub struct ClientKeyPair {
    private_key_pkcs8: Vec<u8>,
    public_key_spki: Vec<u8>,
}

impl ClientKeyPair {
    /// Wrap an externally generated key pair.
    pub fn from_pkcs8_der(private_key_pkcs8: Vec<u8>, public_key_spki: Vec<u8>) -> Self {
        ClientKeyPair {
            private_key_pkcs8,
            public_key_spki,
        }
    }

    /// The SubjectPublicKeyInfo bytes submitted to the control plane.
    pub fn public_key_der(&self) -> &[u8] {
        &self.public_key_spki
    }

    /// The private key as rustls key material.
    pub fn private_key(&self) -> PrivateKeyDer<'static> {
        PrivatePkcs8KeyDer::from(self.private_key_pkcs8.clone()).into()
    }
}

impl std::fmt::Debug for ClientKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientKeyPair")
            .field("private_key_pkcs8", &"[REDACTED]")
            .field("public_key_spki_len", &self.public_key_spki.len())
            .finish()
    }
}
