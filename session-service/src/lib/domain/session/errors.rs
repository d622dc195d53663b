use auth::PasswordPolicyError;
use thiserror::Error;

use crate::domain::principal::errors::EmailError;
use crate::domain::principal::errors::RoleError;

/// Error for persistence collaborator operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Record not found")]
    NotFound,

    #[error("Record already exists: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),
}

/// Error for notification delivery
#[derive(Debug, Clone, Error)]
pub enum NotificationError {
    #[error("Failed to serialize notification: {0}")]
    SerializationFailed(String),

    #[error("Failed to publish notification to broker: {0}")]
    PublishFailed(String),

    #[error("Notification queue is full")]
    QueueFull,

    #[error("Notification queue is closed")]
    QueueClosed,
}

/// Top-level error for session and credential operations.
///
/// Authentication failures of every cause collapse into
/// `InvalidCredentials`; the cause is only ever logged.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    // Validation errors, safe to surface
    #[error("Invalid password: {0}")]
    WeakPassword(#[from] PasswordPolicyError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Invalid role: {0}")]
    InvalidRole(#[from] RoleError),

    #[error("Email already exists: {0}")]
    EmailAlreadyExists(String),

    // Authentication outcomes
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email verification required")]
    VerificationRequired,

    #[error("Invalid or expired token")]
    InvalidOneTimeToken,

    // Infrastructure errors
    #[error("Storage error: {0}")]
    Store(#[from] RepositoryError),

    #[error("Internal error: {0}")]
    Internal(String),
}
