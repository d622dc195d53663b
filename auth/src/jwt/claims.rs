use chrono::DateTime;
use chrono::Duration;
use chrono::TimeZone;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// Claims carried by a short-lived access token.
///
/// Every field is required: a token missing any of them fails decoding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    /// Subject (principal identifier)
    pub sub: String,

    /// Principal role at issuance time
    pub role: String,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Token identifier, unique per issuance
    pub jti: String,
}

impl AccessClaims {
    /// Build claims for a subject expiring `ttl` after `now`.
    ///
    /// # Arguments
    /// * `subject` - Principal identifier
    /// * `role` - Principal role name
    /// * `now` - Issuance instant
    /// * `ttl` - Token lifetime
    pub fn new(subject: impl ToString, role: impl ToString, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub: subject.to_string(),
            role: role.to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Expiration as a UTC instant.
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Check if token is expired, ignoring any clock-skew tolerance.
    pub fn is_expired(&self, current_timestamp: i64) -> bool {
        self.exp < current_timestamp
    }
}
