//! Access-token signing for the authenticated account channel.
//!
//! The venue authenticates the account stream with a signed token bound to
//! the account's public key: an HMAC-SHA256 over the public key and a
//! timestamp, hex-encoded with a `0x` prefix.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::infrastructure::config::Credentials;

type HmacSha256 = Hmac<Sha256>;

/// Signing failure.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The secret key was rejected by the MAC implementation.
    #[error("invalid signing key")]
    InvalidKey,
}

/// Produces signed access tokens for the account channel.
#[derive(Clone)]
pub struct AccessTokenSigner {
    credentials: Credentials,
}

impl AccessTokenSigner {
    /// Create a signer for the given credentials.
    #[must_use]
    pub const fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// The account public key the tokens are bound to.
    #[must_use]
    pub fn public_key(&self) -> &str {
        &self.credentials.public_key
    }

    /// Sign an access token valid around the given timestamp.
    pub fn access_token(&self, at: DateTime<Utc>) -> Result<String, AuthError> {
        let mut mac = HmacSha256::new_from_slice(self.credentials.secret_key.as_bytes())
            .map_err(|_| AuthError::InvalidKey)?;
        mac.update(self.credentials.public_key.as_bytes());
        mac.update(b":");
        mac.update(at.timestamp().to_string().as_bytes());
        let signature = mac.finalize().into_bytes();
        Ok(format!("0x{}", hex::encode(signature)))
    }
}

impl std::fmt::Debug for AccessTokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessTokenSigner")
            .field("public_key", &self.credentials.public_key)
            .finish()
    }
}
