//! Credential handling: password digests and signed access tokens.
//!
//! Tokens are self-contained: a base64url claims payload plus an
//! HMAC-SHA256 signature over it, verifiable without a store round-trip.
//! Password digests are salted HMAC-SHA256 with the salt embedded in the
//! stored string, so verification needs no external state either.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use edura_store::{User, UserRole};

use crate::error::{EngineError, Result};

type HmacSha256 = Hmac<Sha256>;

const SALT_LEN: usize = 16;

/// Claims embedded in an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// The authenticated user's id.
    pub sub: Uuid,
    /// The role fixed at registration.
    pub role: UserRole,
    /// Expiry as a unix timestamp in seconds.
    pub exp: i64,
}

/// Issues and verifies credentials.
///
/// Behind a trait so the production signer can be swapped for a
/// deterministic one in tests.
pub trait CredentialService: Send + Sync {
    /// Produces an opaque digest for storage. Never stores the password.
    fn hash_password(&self, password: &str) -> Result<String>;

    /// Checks a password against a stored digest in constant time.
    fn verify_password(&self, password: &str, stored: &str) -> Result<bool>;

    /// Issues a signed access token for the user.
    fn issue_token(&self, user: &User) -> Result<String>;

    /// Verifies a token's signature and expiry, returning its claims.
    fn verify_token(&self, token: &str) -> Result<Claims>;
}

/// HMAC-SHA256 based [`CredentialService`].
pub struct HmacCredentials {
    secret: Vec<u8>,
    ttl: Duration,
}

impl HmacCredentials {
    /// Creates a credential service signing with the given secret and
    /// issuing tokens valid for `ttl_minutes`.
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>, ttl_minutes: i64) -> Self {
        Self {
            secret: secret.into(),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    fn mac(key: &[u8]) -> Result<HmacSha256> {
        // HMAC accepts keys of any length, so this cannot fail in practice.
        HmacSha256::new_from_slice(key)
            .map_err(|e| EngineError::config_validation(e.to_string(), "use a non-empty secret"))
    }
}

impl CredentialService for HmacCredentials {
    fn hash_password(&self, password: &str) -> Result<String> {
        use rand::Rng;

        let salt: [u8; SALT_LEN] = rand::thread_rng().gen();
        let mut mac = Self::mac(&salt)?;
        mac.update(password.as_bytes());
        let digest = mac.finalize().into_bytes();

        Ok(format!(
            "{}${}",
            URL_SAFE_NO_PAD.encode(salt),
            URL_SAFE_NO_PAD.encode(digest)
        ))
    }

    fn verify_password(&self, password: &str, stored: &str) -> Result<bool> {
        let Some((salt_b64, digest_b64)) = stored.split_once('$') else {
            return Ok(false);
        };
        let (Ok(salt), Ok(digest)) = (
            URL_SAFE_NO_PAD.decode(salt_b64),
            URL_SAFE_NO_PAD.decode(digest_b64),
        ) else {
            return Ok(false);
        };

        let mut mac = Self::mac(&salt)?;
        mac.update(password.as_bytes());
        Ok(mac.verify_slice(&digest).is_ok())
    }

    fn issue_token(&self, user: &User) -> Result<String> {
        let claims = Claims {
            sub: user.id,
            role: user.role,
            exp: (Utc::now() + self.ttl).timestamp(),
        };
        let payload = serde_json::to_vec(&claims)
            .map_err(|e| EngineError::unauthorized(format!("failed to encode claims: {e}")))?;
        let payload_b64 = URL_SAFE_NO_PAD.encode(payload);

        let mut mac = Self::mac(&self.secret)?;
        mac.update(payload_b64.as_bytes());
        let sig = mac.finalize().into_bytes();

        Ok(format!("{payload_b64}.{}", URL_SAFE_NO_PAD.encode(sig)))
    }

    fn verify_token(&self, token: &str) -> Result<Claims> {
        let (payload_b64, sig_b64) = token
            .split_once('.')
            .ok_or_else(|| EngineError::unauthorized("malformed token"))?;
        let sig = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| EngineError::unauthorized("malformed token signature"))?;

        let mut mac = Self::mac(&self.secret)?;
        mac.update(payload_b64.as_bytes());
        mac.verify_slice(&sig)
            .map_err(|_| EngineError::unauthorized("invalid token signature"))?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| EngineError::unauthorized("malformed token payload"))?;
        let claims: Claims = serde_json::from_slice(&payload)
            .map_err(|_| EngineError::unauthorized("malformed token claims"))?;

        if claims.exp < Utc::now().timestamp() {
            return Err(EngineError::unauthorized("token expired"));
        }
        Ok(claims)
    }
}
