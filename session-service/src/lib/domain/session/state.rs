//! Refresh-token lineage state machine.
//!
//! A session lineage moves Anonymous -> Authenticated -> (needs refresh) ->
//! Authenticated again through rotation, or to Revoked. Every presented
//! refresh token is classified into exactly one transition before any store
//! write happens; replaying a spent token is its own transition.

use chrono::DateTime;
use chrono::Utc;

use crate::domain::principal::models::PrincipalId;
use crate::domain::session::models::StoredToken;
use crate::domain::session::models::TokenKind;

/// Transition selected for a presented refresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshTransition {
    /// No refresh token with this value exists. Stay anonymous.
    Unknown,
    /// The token outlived its lifetime. Drop it and stay anonymous.
    Expired(StoredToken),
    /// The token was already spent: a reuse incident. Revoke the lineage.
    Replayed(PrincipalId),
    /// The token is live. Rotate it.
    Rotate(StoredToken),
}

impl RefreshTransition {
    /// Classify the looked-up record for a presented refresh token.
    ///
    /// Checks run in a fixed order: existence (including kind), expiry,
    /// then the used flag. An expired token that was also used is treated
    /// as expired.
    pub fn classify(record: Option<StoredToken>, now: DateTime<Utc>) -> Self {
        match record {
            None => RefreshTransition::Unknown,
            Some(token) if token.kind != TokenKind::Refresh => RefreshTransition::Unknown,
            Some(token) if token.is_expired_at(now) => RefreshTransition::Expired(token),
            Some(token) if token.used => RefreshTransition::Replayed(token.subject_id),
            Some(token) => RefreshTransition::Rotate(token),
        }
    }

    /// Short label for logs and audit details.
    pub fn label(&self) -> &'static str {
        match self {
            RefreshTransition::Unknown => "unknown",
            RefreshTransition::Expired(_) => "expired",
            RefreshTransition::Replayed(_) => "replayed",
            RefreshTransition::Rotate(_) => "rotate",
        }
    }
}
