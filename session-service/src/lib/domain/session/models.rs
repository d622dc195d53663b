use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;

use crate::domain::principal::models::EmailAddress;
use crate::domain::principal::models::Principal;
use crate::domain::principal::models::PrincipalId;
use crate::domain::principal::models::Role;

/// Purpose of a persisted opaque token.
///
/// Refresh tokens share their table with one-time verification and password
/// reset tokens; a token is only ever accepted for its own kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Refresh,
    Verification,
    PasswordReset,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Refresh => "refresh_token",
            TokenKind::Verification => "verification",
            TokenKind::PasswordReset => "password_reset",
        }
    }
}

impl FromStr for TokenKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "refresh_token" => Ok(TokenKind::Refresh),
            "verification" => Ok(TokenKind::Verification),
            "password_reset" => Ok(TokenKind::PasswordReset),
            other => Err(format!("unknown token kind: {}", other)),
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted opaque token record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredToken {
    pub value: String,
    pub subject_id: PrincipalId,
    pub kind: TokenKind,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

impl StoredToken {
    /// Build a fresh, unused record.
    pub fn new(
        value: String,
        subject_id: PrincipalId,
        kind: TokenKind,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            value,
            subject_id,
            kind,
            expires_at: now + ttl,
            used: false,
            created_at: now,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Unused and unexpired.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.used && !self.is_expired_at(now)
    }
}

/// Outcome of the atomic test-and-set on a token's used flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkUsed {
    /// This call flipped the flag.
    Marked,
    /// The flag was already set by someone else.
    AlreadyUsed,
}

/// Signed short-lived bearer credential.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

/// Opaque long-lived rotating credential.
#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

/// Credentials handed to the transport layer after login or refresh.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: AccessToken,
    pub refresh: RefreshToken,
}

/// Successful login result.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub tokens: TokenPair,
    pub principal: Principal,
}

/// Request origin details recorded with security events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientContext {
    pub ip: String,
    pub user_agent: Option<String>,
}

impl ClientContext {
    pub fn new(ip: impl Into<String>, user_agent: Option<String>) -> Self {
        Self {
            ip: ip.into(),
            user_agent,
        }
    }
}

/// Identity established by the authenticate guard.
///
/// Built once per request and passed explicitly to whatever needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    pub subject_id: PrincipalId,
    pub role: Role,
    /// Fingerprint of the presented access token, used as its revocation key.
    pub token_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Outgoing message for the mailer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Verification {
        to: EmailAddress,
        name: String,
        token: String,
    },
    PasswordReset {
        to: EmailAddress,
        name: String,
        token: String,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Verification { .. } => "verification",
            Notification::PasswordReset { .. } => "password_reset",
        }
    }
}

/// Lifetimes and limits governing sessions.
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub max_active_refresh_tokens: u32,
    pub verification_ttl: Duration,
    pub password_reset_ttl: Duration,
    /// Minimum lifetime of a revocation entry created at logout.
    pub revocation_ttl: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(7),
            max_active_refresh_tokens: 5,
            verification_ttl: Duration::hours(24),
            password_reset_ttl: Duration::hours(1),
            revocation_ttl: Duration::minutes(20),
        }
    }
}
