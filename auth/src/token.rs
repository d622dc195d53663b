//! Opaque token generation and fingerprinting.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

/// Entropy of generated opaque tokens, in bytes (256 bits).
pub const OPAQUE_TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, Error)]
pub enum OpaqueTokenError {
    #[error("Failed to gather randomness: {0}")]
    RandomnessUnavailable(String),
}

/// Create a new high-entropy opaque token, base64url encoded.
///
/// # Errors
/// * `RandomnessUnavailable` - The OS random source failed
pub fn generate_opaque_token() -> Result<String, OpaqueTokenError> {
    let mut bytes = [0u8; OPAQUE_TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| OpaqueTokenError::RandomnessUnavailable(e.to_string()))?;

    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Deterministic identifier for a token value (hex-encoded SHA-256).
///
/// Lets registries key on a token without holding the raw credential.
pub fn fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
