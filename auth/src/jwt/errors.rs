use thiserror::Error;

/// Error type for access token operations.
///
/// Variants distinguish the cause for internal logging only; callers at an API
/// boundary should collapse all of them into one outcome.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JwtError {
    #[error("Failed to encode token: {0}")]
    EncodingFailed(String),

    #[error("Token is malformed: {0}")]
    Malformed(String),

    #[error("Token signature is invalid")]
    InvalidSignature,

    #[error("Token algorithm does not match the expected algorithm")]
    AlgorithmMismatch,

    #[error("Token is expired beyond the allowed clock skew")]
    TokenExpired,
}
