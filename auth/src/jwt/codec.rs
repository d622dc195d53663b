use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use jsonwebtoken::decode;
use jsonwebtoken::encode;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::EncodingKey;
use jsonwebtoken::Header;
use jsonwebtoken::Validation;

use super::claims::AccessClaims;
use super::errors::JwtError;

/// A freshly signed access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub jti: String,
}

/// Stateless signer and verifier for access tokens.
///
/// Signs with HS256 only. Verification rejects any token whose header names a
/// different algorithm, even one from the same HMAC family.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    leeway: Duration,
}

impl TokenCodec {
    /// Accepted clock skew past nominal expiry.
    pub const DEFAULT_LEEWAY_SECONDS: i64 = 5 * 60;

    /// Create a new codec with a secret key.
    ///
    /// # Arguments
    /// * `secret` - Secret key for signing tokens (should be stored securely)
    ///
    /// # Security Notes
    /// - The secret should be at least 256 bits (32 bytes) for HS256
    /// - Store secrets in environment variables or secure vaults, never in code
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            algorithm: Algorithm::HS256,
            leeway: Duration::seconds(Self::DEFAULT_LEEWAY_SECONDS),
        }
    }

    /// Override the clock-skew tolerance applied to expiry checks.
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Clock-skew tolerance applied to expiry checks.
    pub fn leeway(&self) -> Duration {
        self.leeway
    }

    /// Sign a new access token for `subject` expiring `ttl` from now.
    ///
    /// # Errors
    /// * `EncodingFailed` - Token signing failed
    pub fn issue(&self, subject: &str, role: &str, ttl: Duration) -> Result<IssuedToken, JwtError> {
        let claims = AccessClaims::new(subject, role, Utc::now(), ttl);
        let token = self.encode(&claims)?;

        Ok(IssuedToken {
            token,
            expires_at: claims.expires_at(),
            jti: claims.jti,
        })
    }

    /// Sign an arbitrary set of access claims.
    ///
    /// # Errors
    /// * `EncodingFailed` - Token signing failed
    pub fn encode(&self, claims: &AccessClaims) -> Result<String, JwtError> {
        let header = Header::new(self.algorithm);

        encode(&header, claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingFailed(e.to_string()))
    }

    /// Verify signature, algorithm and expiry, then return the claims.
    ///
    /// # Errors
    /// * `AlgorithmMismatch` - Header algorithm is not HS256
    /// * `InvalidSignature` - Signature does not match the secret
    /// * `TokenExpired` - Expired for longer than the clock-skew tolerance
    /// * `Malformed` - Token or claims could not be parsed
    pub fn verify(&self, token: &str) -> Result<AccessClaims, JwtError> {
        let mut validation = Validation::new(self.algorithm);
        validation.algorithms = vec![self.algorithm];
        validation.validate_exp = true;
        validation.leeway = self.leeway.num_seconds().max(0) as u64;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let token_data =
            decode::<AccessClaims>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    ErrorKind::ExpiredSignature => JwtError::TokenExpired,
                    ErrorKind::InvalidAlgorithm => JwtError::AlgorithmMismatch,
                    ErrorKind::InvalidSignature => JwtError::InvalidSignature,
                    _ => JwtError::Malformed(e.to_string()),
                }
            })?;

        Ok(token_data.claims)
    }
}
