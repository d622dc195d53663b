use chrono::Duration;

use crate::jwt::AccessClaims;
use crate::jwt::IssuedToken;
use crate::jwt::JwtError;
use crate::jwt::TokenCodec;
use crate::password::PasswordError;
use crate::password::PasswordHasher;

/// Authentication coordinator combining password verification and token minting.
///
/// Provides high-level authentication operations by coordinating
/// password hashing and access token handling.
#[derive(Clone)]
pub struct Authenticator {
    password_hasher: PasswordHasher,
    codec: TokenCodec,
}

impl Authenticator {
    /// Create a new authenticator.
    ///
    /// # Arguments
    /// * `jwt_secret` - Secret key for access token signing
    pub fn new(jwt_secret: &[u8]) -> Self {
        Self {
            password_hasher: PasswordHasher::new(),
            codec: TokenCodec::new(jwt_secret),
        }
    }

    /// Replace the password hasher (e.g. with cheaper parameters in tests).
    pub fn with_password_hasher(mut self, password_hasher: PasswordHasher) -> Self {
        self.password_hasher = password_hasher;
        self
    }

    /// Override the clock-skew tolerance for access token expiry.
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.codec = self.codec.with_leeway(leeway);
        self
    }

    /// Clock-skew tolerance applied when validating access tokens.
    pub fn leeway(&self) -> Duration {
        self.codec.leeway()
    }

    /// Password hasher used by this authenticator.
    pub fn password_hasher(&self) -> &PasswordHasher {
        &self.password_hasher
    }

    /// Hash a password for storage.
    ///
    /// # Errors
    /// * `PasswordError` - Hashing operation failed
    pub fn hash_password(&self, password: &str) -> Result<String, PasswordError> {
        self.password_hasher.hash(password)
    }

    /// Verify a password against a stored hash.
    ///
    /// # Errors
    /// * `PasswordError` - Stored hash is unreadable
    pub fn verify_password(&self, password: &str, stored_hash: &str) -> Result<bool, PasswordError> {
        self.password_hasher.verify(password, stored_hash)
    }

    /// Mint an access token for an already authenticated subject.
    ///
    /// # Errors
    /// * `JwtError` - Token generation failed
    pub fn issue_access_token(
        &self,
        subject: &str,
        role: &str,
        ttl: Duration,
    ) -> Result<IssuedToken, JwtError> {
        self.codec.issue(subject, role, ttl)
    }

    /// Validate and decode an access token.
    ///
    /// # Errors
    /// * `JwtError` - Token validation or decoding failed
    pub fn validate_token(&self, token: &str) -> Result<AccessClaims, JwtError> {
        self.codec.verify(token)
    }
}
