use async_trait::async_trait;

use crate::domain::principal::models::EmailAddress;
use crate::domain::principal::models::LoginCommand;
use crate::domain::principal::models::Principal;
use crate::domain::principal::models::PrincipalId;
use crate::domain::principal::models::RegisterCommand;
use crate::domain::session::errors::NotificationError;
use crate::domain::session::errors::RepositoryError;
use crate::domain::session::errors::SessionError;
use crate::domain::session::models::ClientContext;
use crate::domain::session::models::LoginOutcome;
use crate::domain::session::models::MarkUsed;
use crate::domain::session::models::Notification;
use crate::domain::session::models::PrincipalContext;
use crate::domain::session::models::StoredToken;
use crate::domain::session::models::TokenPair;

/// Port for session and credential operations exposed to the transport layer.
#[async_trait]
pub trait SessionServicePort: Send + Sync + 'static {
    /// Register a new principal.
    ///
    /// # Arguments
    /// * `command` - Validated name, email, role and plain text password
    ///
    /// # Returns
    /// Created principal; a verification notification is queued when unverified
    ///
    /// # Errors
    /// * `WeakPassword` - Password violates the policy
    /// * `EmailAlreadyExists` - Email is already registered
    /// * `Store` - Persistence failed
    async fn register(&self, command: RegisterCommand) -> Result<Principal, SessionError>;

    /// Exchange credentials for an access token and a refresh token.
    ///
    /// # Errors
    /// * `InvalidCredentials` - Unknown email or wrong password, never distinguished
    /// * `VerificationRequired` - Password matched but the email is unverified
    /// * `Store` - Persistence failed
    async fn login(
        &self,
        command: LoginCommand,
        client: &ClientContext,
    ) -> Result<LoginOutcome, SessionError>;

    /// Rotate a refresh token into a new token pair.
    ///
    /// Presenting an already spent token revokes every refresh token of its
    /// owner.
    ///
    /// # Errors
    /// * `InvalidCredentials` - Token unknown, expired or replayed
    /// * `Store` - Persistence failed
    async fn refresh(
        &self,
        refresh_token: &str,
        client: &ClientContext,
    ) -> Result<TokenPair, SessionError>;

    /// End a session. Always succeeds, even without one.
    ///
    /// # Arguments
    /// * `principal` - Context of the presented access token, if it was valid
    /// * `refresh_token` - Presented refresh token, if any
    async fn logout(
        &self,
        principal: Option<&PrincipalContext>,
        refresh_token: Option<&str>,
        client: &ClientContext,
    );

    /// Guard for protected requests.
    ///
    /// # Errors
    /// * `InvalidCredentials` - Token revoked, forged, downgraded or expired
    async fn authenticate(&self, access_token: &str) -> Result<PrincipalContext, SessionError>;

    /// Load the principal behind an authenticated request.
    ///
    /// # Errors
    /// * `InvalidCredentials` - Principal no longer exists
    /// * `Store` - Persistence failed
    async fn current_principal(
        &self,
        principal: &PrincipalContext,
    ) -> Result<Principal, SessionError>;

    /// Consume a one-time verification token and mark its owner verified.
    ///
    /// # Errors
    /// * `InvalidOneTimeToken` - Token unknown, spent, expired or of another kind
    /// * `Store` - Persistence failed
    async fn verify_email(&self, token: &str) -> Result<(), SessionError>;

    /// Start a password reset. Reports success whether or not the email exists.
    ///
    /// # Errors
    /// * `Store` - Principal lookup failed
    async fn request_password_reset(
        &self,
        email: &str,
        client: &ClientContext,
    ) -> Result<(), SessionError>;

    /// Complete a password reset and end every session of the principal.
    ///
    /// # Errors
    /// * `WeakPassword` - New password violates the policy
    /// * `InvalidOneTimeToken` - Token unknown, spent, expired or of another kind
    /// * `Store` - Persistence failed
    async fn reset_password(
        &self,
        token: &str,
        new_password: String,
        client: &ClientContext,
    ) -> Result<(), SessionError>;
}

/// Store for refresh tokens and one-time tokens.
#[async_trait]
pub trait TokenRepository: Send + Sync + 'static {
    /// Insert a new token record.
    ///
    /// # Errors
    /// * `Conflict` - Token value already exists
    /// * `Database` - Database operation failed
    async fn create(&self, token: StoredToken) -> Result<(), RepositoryError>;

    /// Retrieve token record by value.
    ///
    /// # Errors
    /// * `NotFound` - No record with this value
    /// * `Database` - Database operation failed
    async fn fetch_by_value(&self, value: &str) -> Result<StoredToken, RepositoryError>;

    /// Atomically set the used flag if it is not already set.
    ///
    /// Must be a single test-and-set: of two concurrent callers exactly one
    /// observes `Marked`.
    ///
    /// # Errors
    /// * `NotFound` - No record with this value
    /// * `Database` - Database operation failed
    async fn mark_used(&self, value: &str) -> Result<MarkUsed, RepositoryError>;

    /// Remove a single record. Removing a missing record is not an error.
    ///
    /// # Errors
    /// * `Database` - Database operation failed
    async fn invalidate_one(&self, value: &str) -> Result<(), RepositoryError>;

    /// Remove every refresh token owned by the subject.
    ///
    /// # Returns
    /// Number of removed records
    ///
    /// # Errors
    /// * `Database` - Database operation failed
    async fn invalidate_all_for_subject(
        &self,
        subject_id: &PrincipalId,
    ) -> Result<u64, RepositoryError>;

    /// Count unused, unexpired refresh tokens of the subject.
    ///
    /// # Errors
    /// * `Database` - Database operation failed
    async fn count_active_for_subject(
        &self,
        subject_id: &PrincipalId,
    ) -> Result<u64, RepositoryError>;

    /// Delete all but the `keep` most recently created active refresh tokens.
    ///
    /// # Returns
    /// Number of removed records
    ///
    /// # Errors
    /// * `Database` - Database operation failed
    async fn revoke_oldest(
        &self,
        subject_id: &PrincipalId,
        keep: u32,
    ) -> Result<u64, RepositoryError>;

    /// Delete every record of any kind whose expiry has passed.
    ///
    /// # Returns
    /// Number of removed records
    ///
    /// # Errors
    /// * `Database` - Database operation failed
    async fn sweep_expired(&self) -> Result<u64, RepositoryError>;
}

/// Delivery of outgoing notifications to the mailer.
#[async_trait]
pub trait NotificationPublisher: Send + Sync + 'static {
    /// Deliver an email verification link.
    ///
    /// # Errors
    /// * `SerializationFailed` - Message serialization failed
    /// * `PublishFailed` - Failed to publish to broker
    async fn send_verification(
        &self,
        to: &EmailAddress,
        name: &str,
        token: &str,
    ) -> Result<(), NotificationError>;

    /// Deliver a password reset link.
    ///
    /// # Errors
    /// * `SerializationFailed` - Message serialization failed
    /// * `PublishFailed` - Failed to publish to broker
    async fn send_password_reset(
        &self,
        to: &EmailAddress,
        name: &str,
        token: &str,
    ) -> Result<(), NotificationError>;
}

/// Non-blocking hand-off of notifications to a background worker.
///
/// Enqueueing never waits on delivery; the caller only learns whether the
/// notification was accepted.
pub trait NotificationQueue: Send + Sync + 'static {
    /// # Errors
    /// * `QueueFull` - Worker is saturated
    /// * `QueueClosed` - Worker has stopped
    fn enqueue(&self, notification: Notification) -> Result<(), NotificationError>;
}
