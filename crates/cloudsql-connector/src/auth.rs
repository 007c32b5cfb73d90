//! Database authentication modes and access token suppliers.
//!
//! The connector never acquires credentials itself; it calls a supplied
//! [`AccessTokenSupplier`] and forwards the result to the control plane when
//! minting an ephemeral certificate in IAM mode.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{ConnectError, ConnectResult};

/// How the client authenticates to the database after TLS establishment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthType {
    /// Built-in database user and password.
    Password,
    /// Google identity delivered as an OAuth2 bearer token.
    Iam,
}

/// OAuth2 access token with an optional expiry.
///
/// The [`Debug`] impl redacts the token value to prevent accidental
/// credential exposure in log output.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AccessToken {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    /// Create a token from its raw value and optional expiry.
    pub fn new(value: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        AccessToken {
            value: value.into(),
            expires_at,
        }
    }

    /// The raw bearer token value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// When the token expires, if the issuer reported it.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Check whether the token expiry has already passed.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= Utc::now(),
            None => false,
        }
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Credentials a connector is configured with.
///
/// Only the parts the configuration record needs are modeled: a value with
/// structural equality that can carry a static access token. Acquiring or
/// refreshing real credentials is the caller's concern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Credentials {
    access_token: Option<AccessToken>,
}

impl Credentials {
    /// Create credentials wrapping a static access token.
    pub fn from_access_token(token: AccessToken) -> Self {
        Credentials {
            access_token: Some(token),
        }
    }

    /// The static access token, if any.
    pub fn access_token(&self) -> Option<&AccessToken> {
        self.access_token.as_ref()
    }
}

/// Source of the optional OAuth2 token used for IAM database authentication.
///
/// In IAM mode the supplier must yield a token; in password mode it yields
/// `None` and the ephemeral certificate request omits the token.
#[async_trait]
pub trait AccessTokenSupplier: Send + Sync {
    /// Produce the current access token, or `None` when the auth mode does
    /// not use one.
    async fn get(&self) -> ConnectResult<Option<AccessToken>>;
}

/// Supplier for password-mode connections; never yields a token.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTokenSupplier;

#[async_trait]
impl AccessTokenSupplier for NoTokenSupplier {
    async fn get(&self) -> ConnectResult<Option<AccessToken>> {
        Ok(None)
    }
}

/// Supplier wrapping a fixed token.
///
/// A token that has already expired is rejected instead of being sent to the
/// control plane, since it could not authenticate the connection anyway.
#[derive(Debug, Clone)]
pub struct StaticTokenSupplier {
    token: AccessToken,
}

impl StaticTokenSupplier {
    pub fn new(token: AccessToken) -> Self {
        StaticTokenSupplier { token }
    }
}

#[async_trait]
impl AccessTokenSupplier for StaticTokenSupplier {
    async fn get(&self) -> ConnectResult<Option<AccessToken>> {
        if self.token.is_expired() {
            return Err(ConnectError::AccessTokenExpired);
        }
        Ok(Some(self.token.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_debug_redacts_token_value() {
        let token = AccessToken::new("super-secret", None);
        let printed = format!("{token:?}");
        assert!(printed.contains("[REDACTED]"));
        assert!(!printed.contains("super-secret"));
    }

    #[test]
    fn test_token_without_expiry_never_expires() {
        let token = AccessToken::new("tok", None);
        assert!(!token.is_expired());
    }

    #[tokio::test]
    async fn test_no_token_supplier_yields_none() {
        let token = NoTokenSupplier.get().await.unwrap();
        assert!(token.is_none());
    }

    #[tokio::test]
    async fn test_static_supplier_yields_token() {
        let expires_at = Utc::now() + Duration::hours(1);
        let supplier = StaticTokenSupplier::new(AccessToken::new("tok", Some(expires_at)));

        let token = supplier.get().await.unwrap().unwrap();
        assert_eq!(token.value(), "tok");
        assert_eq!(token.expires_at(), Some(expires_at));
    }

    #[tokio::test]
    async fn test_static_supplier_rejects_expired_token() {
        let expires_at = Utc::now() - Duration::minutes(5);
        let supplier = StaticTokenSupplier::new(AccessToken::new("tok", Some(expires_at)));

        let err = supplier.get().await.unwrap_err();
        assert!(matches!(err, ConnectError::AccessTokenExpired));
    }
}
