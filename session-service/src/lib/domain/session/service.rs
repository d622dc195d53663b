use std::sync::Arc;

use async_trait::async_trait;
use auth::token::fingerprint;
use auth::token::generate_opaque_token;
use auth::validate_password_strength;
use auth::Authenticator;
use chrono::Utc;
use tokio::sync::OnceCell;

use crate::domain::principal::errors::RoleError;
use crate::domain::principal::models::EmailAddress;
use crate::domain::principal::models::LoginCommand;
use crate::domain::principal::models::Principal;
use crate::domain::principal::models::PrincipalId;
use crate::domain::principal::models::RegisterCommand;
use crate::domain::principal::models::Role;
use crate::domain::principal::ports::PrincipalRepository;
use crate::domain::session::errors::RepositoryError;
use crate::domain::session::errors::SessionError;
use crate::domain::session::models::AccessToken;
use crate::domain::session::models::ClientContext;
use crate::domain::session::models::LoginOutcome;
use crate::domain::session::models::MarkUsed;
use crate::domain::session::models::Notification;
use crate::domain::session::models::PrincipalContext;
use crate::domain::session::models::RefreshToken;
use crate::domain::session::models::SessionPolicy;
use crate::domain::session::models::StoredToken;
use crate::domain::session::models::TokenKind;
use crate::domain::session::models::TokenPair;
use crate::domain::session::ports::NotificationQueue;
use crate::domain::session::ports::SessionServicePort;
use crate::domain::session::ports::TokenRepository;
use crate::domain::session::state::RefreshTransition;
use crate::security::audit::AuditSink;
use crate::security::audit::SecurityEvent;
use crate::security::audit::SecurityEventKind;
use crate::security::revocation::RevocationCache;

// Verified against when the email is unknown so both paths cost one hash.
const TIMING_DUMMY_PASSWORD: &str = "timing-equalization-Placeholder-1!";

/// Domain service implementation for session and credential operations.
///
/// Orchestrates the principal store, the token store, the revocation cache,
/// the notification queue and the audit sink.
pub struct SessionService<PR, TR, NQ, AS>
where
    PR: PrincipalRepository,
    TR: TokenRepository,
    NQ: NotificationQueue,
    AS: AuditSink,
{
    principals: Arc<PR>,
    tokens: Arc<TR>,
    notifications: Arc<NQ>,
    audit: Arc<AS>,
    revocations: Arc<RevocationCache>,
    authenticator: Arc<Authenticator>,
    policy: SessionPolicy,
    dummy_hash: OnceCell<String>,
}

impl<PR, TR, NQ, AS> SessionService<PR, TR, NQ, AS>
where
    PR: PrincipalRepository,
    TR: TokenRepository,
    NQ: NotificationQueue,
    AS: AuditSink,
{
    /// Create a new session service with injected dependencies.
    ///
    /// # Arguments
    /// * `principals` - Principal persistence implementation
    /// * `tokens` - Refresh and one-time token persistence implementation
    /// * `notifications` - Queue feeding the mailer
    /// * `audit` - Security event sink
    /// * `revocations` - Shared access-token revocation cache
    /// * `authenticator` - Password hashing and access-token codec
    /// * `policy` - Token lifetimes and session cap
    pub fn new(
        principals: Arc<PR>,
        tokens: Arc<TR>,
        notifications: Arc<NQ>,
        audit: Arc<AS>,
        revocations: Arc<RevocationCache>,
        authenticator: Arc<Authenticator>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            principals,
            tokens,
            notifications,
            audit,
            revocations,
            authenticator,
            policy,
            dummy_hash: OnceCell::new(),
        }
    }

    /// Create the initial admin account unless one already exists.
    ///
    /// # Returns
    /// `true` when an admin was created
    ///
    /// # Errors
    /// * `InvalidEmail` - Configured email is malformed
    /// * `WeakPassword` - Configured password violates the policy
    /// * `Store` - Persistence failed
    pub async fn ensure_admin(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<bool, SessionError> {
        let email = EmailAddress::new(email.to_string())?;

        if self.principals.exists_with_role(Role::Admin).await? {
            return Ok(false);
        }
        if self.principals.find_by_email(&email).await?.is_some() {
            tracing::warn!(email = %email, "Admin bootstrap skipped: email already registered");
            return Ok(false);
        }

        validate_password_strength(password)?;
        let password_hash = self.hash_password(password.to_string()).await?;

        let admin = Principal {
            id: PrincipalId::new(),
            name: name.to_string(),
            email,
            password_hash,
            role: Role::Admin,
            verified: true,
            created_at: Utc::now(),
        };
        let created = self.principals.create(admin).await?;

        tracing::info!(principal_id = %created.id, "Admin principal created");
        Ok(true)
    }

    async fn hash_password(&self, password: String) -> Result<String, SessionError> {
        let authenticator = Arc::clone(&self.authenticator);
        tokio::task::spawn_blocking(move || authenticator.hash_password(&password))
            .await
            .map_err(|e| SessionError::Internal(format!("Password hashing task failed: {}", e)))?
            .map_err(|e| SessionError::Internal(format!("Password hashing failed: {}", e)))
    }

    /// Unreadable stored hashes count as a mismatch.
    async fn verify_password(&self, password: String, stored_hash: String) -> bool {
        let authenticator = Arc::clone(&self.authenticator);
        let outcome = tokio::task::spawn_blocking(move || {
            authenticator.verify_password(&password, &stored_hash)
        })
        .await;

        match outcome {
            Ok(Ok(matches)) => matches,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Stored password hash is unreadable");
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "Password verification task failed");
                false
            }
        }
    }

    async fn burn_dummy_verification(&self, password: String) {
        let dummy = self
            .dummy_hash
            .get_or_try_init(|| self.hash_password(TIMING_DUMMY_PASSWORD.to_string()))
            .await;

        if let Ok(hash) = dummy {
            let _ = self.verify_password(password, hash.clone()).await;
        }
    }

    fn new_opaque_token(&self) -> Result<String, SessionError> {
        generate_opaque_token().map_err(|e| SessionError::Internal(e.to_string()))
    }

    fn issue_access_token(
        &self,
        principal_id: &PrincipalId,
        role: Role,
    ) -> Result<AccessToken, SessionError> {
        let issued = self
            .authenticator
            .issue_access_token(&principal_id.to_string(), role.as_str(), self.policy.access_ttl)
            .map_err(|e| SessionError::Internal(format!("Access token signing failed: {}", e)))?;

        Ok(AccessToken {
            value: issued.token,
            expires_at: issued.expires_at,
        })
    }

    /// Persist a fresh refresh token for `subject_id`.
    async fn issue_refresh_token(
        &self,
        subject_id: PrincipalId,
    ) -> Result<RefreshToken, SessionError> {
        let record = StoredToken::new(
            self.new_opaque_token()?,
            subject_id,
            TokenKind::Refresh,
            Utc::now(),
            self.policy.refresh_ttl,
        );
        let refresh = RefreshToken {
            value: record.value.clone(),
            expires_at: record.expires_at,
        };

        self.tokens.create(record).await?;
        Ok(refresh)
    }

    /// Trim the subject down to `max_active_refresh_tokens` newest tokens.
    /// Runs after the insert, so concurrent logins converge on the cap.
    async fn enforce_session_cap(&self, subject_id: &PrincipalId) -> Result<(), SessionError> {
        let cap = self.policy.max_active_refresh_tokens;
        let active = self.tokens.count_active_for_subject(subject_id).await?;

        if active > u64::from(cap) {
            let revoked = self.tokens.revoke_oldest(subject_id, cap).await?;
            tracing::info!(
                principal_id = %subject_id,
                active,
                revoked,
                "Session cap reached, oldest refresh tokens revoked"
            );
        }

        Ok(())
    }

    /// Issue and queue a one-time token. Failures are logged, never returned.
    async fn send_one_time_token(&self, principal: &Principal, kind: TokenKind) {
        let ttl = match kind {
            TokenKind::Verification => self.policy.verification_ttl,
            TokenKind::PasswordReset => self.policy.password_reset_ttl,
            TokenKind::Refresh => return,
        };

        let value = match self.new_opaque_token() {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(
                    principal_id = %principal.id,
                    kind = %kind,
                    error = %e,
                    "Failed to generate one-time token"
                );
                return;
            }
        };

        let record = StoredToken::new(value.clone(), principal.id, kind, Utc::now(), ttl);
        if let Err(e) = self.tokens.create(record).await {
            tracing::error!(
                principal_id = %principal.id,
                kind = %kind,
                error = %e,
                "Failed to persist one-time token"
            );
            return;
        }

        let notification = match kind {
            TokenKind::PasswordReset => Notification::PasswordReset {
                to: principal.email.clone(),
                name: principal.name.clone(),
                token: value,
            },
            _ => Notification::Verification {
                to: principal.email.clone(),
                name: principal.name.clone(),
                token: value,
            },
        };

        if let Err(e) = self.notifications.enqueue(notification) {
            tracing::error!(
                principal_id = %principal.id,
                kind = %kind,
                error = %e,
                "Failed to queue notification"
            );
        }
    }

    /// Spend a one-time token of `kind` and return its record.
    async fn consume_one_time_token(
        &self,
        value: &str,
        kind: TokenKind,
    ) -> Result<StoredToken, SessionError> {
        let record = match self.tokens.fetch_by_value(value).await {
            Ok(record) => record,
            Err(RepositoryError::NotFound) => return Err(SessionError::InvalidOneTimeToken),
            Err(e) => return Err(e.into()),
        };

        if record.kind != kind || record.used {
            return Err(SessionError::InvalidOneTimeToken);
        }

        if record.is_expired_at(Utc::now()) {
            self.purge_expired(value).await;
            return Err(SessionError::InvalidOneTimeToken);
        }

        match self.tokens.mark_used(value).await {
            Ok(MarkUsed::Marked) => Ok(record),
            Ok(MarkUsed::AlreadyUsed) | Err(RepositoryError::NotFound) => {
                Err(SessionError::InvalidOneTimeToken)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Drop an expired token and everything else past expiry.
    async fn purge_expired(&self, value: &str) {
        if let Err(e) = self.tokens.invalidate_one(value).await {
            tracing::warn!(error = %e, "Failed to delete expired token");
        }
        match self.tokens.sweep_expired().await {
            Ok(purged) => tracing::debug!(purged, "Expired tokens purged"),
            Err(e) => tracing::warn!(error = %e, "Failed to purge expired tokens"),
        }
    }

    /// Reuse incident: the lineage is compromised, end every session of the owner.
    async fn contain_reuse(&self, subject_id: PrincipalId, client: &ClientContext) -> SessionError {
        match self.tokens.invalidate_all_for_subject(&subject_id).await {
            Ok(revoked) => {
                tracing::warn!(
                    principal_id = %subject_id,
                    revoked,
                    "Refresh token reuse detected, all sessions revoked"
                );
            }
            Err(e) => {
                tracing::error!(
                    principal_id = %subject_id,
                    error = %e,
                    "Refresh token reuse detected, revocation failed"
                );
            }
        }

        self.audit.record(
            SecurityEvent::new(SecurityEventKind::TokenReuse, client)
                .with_principal(subject_id)
                .with_detail("used refresh token presented again"),
        );
        self.refresh_failure(Some(subject_id), client, "reuse");

        SessionError::InvalidCredentials
    }

    fn login_failure(
        &self,
        principal_id: Option<PrincipalId>,
        client: &ClientContext,
        detail: &str,
    ) {
        self.record_failure(SecurityEventKind::LoginFailure, principal_id, client, detail);
    }

    fn refresh_failure(
        &self,
        principal_id: Option<PrincipalId>,
        client: &ClientContext,
        detail: &str,
    ) {
        self.record_failure(SecurityEventKind::RefreshFailure, principal_id, client, detail);
    }

    fn record_failure(
        &self,
        kind: SecurityEventKind,
        principal_id: Option<PrincipalId>,
        client: &ClientContext,
        detail: &str,
    ) {
        let mut event = SecurityEvent::new(kind, client).with_detail(detail);
        if let Some(id) = principal_id {
            event = event.with_principal(id);
        }
        self.audit.record(event);
    }

    async fn rotate(
        &self,
        record: StoredToken,
        client: &ClientContext,
    ) -> Result<TokenPair, SessionError> {
        let subject_id = record.subject_id;

        // The test-and-set must win before anything is minted.
        match self.tokens.mark_used(&record.value).await {
            Ok(MarkUsed::Marked) => {}
            Ok(MarkUsed::AlreadyUsed) => return Err(self.contain_reuse(subject_id, client).await),
            Err(RepositoryError::NotFound) => {
                self.refresh_failure(Some(subject_id), client, "deleted concurrently");
                return Err(SessionError::InvalidCredentials);
            }
            Err(e) => {
                self.refresh_failure(Some(subject_id), client, "store failure");
                return Err(e.into());
            }
        }

        let principal = match self.principals.find_by_id(&subject_id).await {
            Ok(Some(principal)) => principal,
            Ok(None) => {
                self.refresh_failure(Some(subject_id), client, "principal missing");
                return Err(SessionError::InvalidCredentials);
            }
            Err(e) => {
                self.refresh_failure(Some(subject_id), client, "store failure");
                return Err(e.into());
            }
        };

        let access = match self.issue_access_token(&principal.id, principal.role) {
            Ok(access) => access,
            Err(e) => {
                self.refresh_failure(Some(subject_id), client, "token issuance failed");
                return Err(e);
            }
        };
        let refresh = match self.issue_refresh_token(principal.id).await {
            Ok(refresh) => refresh,
            Err(e) => {
                self.refresh_failure(Some(subject_id), client, "token issuance failed");
                return Err(e);
            }
        };

        // The spent record stays as a tombstone until it expires so a replay
        // is still recognized as reuse. If it is already gone, a reuse incident
        // revoked the lineage while the replacement was being minted.
        match self.tokens.fetch_by_value(&record.value).await {
            Ok(_) => {}
            Err(RepositoryError::NotFound) => {
                if let Err(e) = self.tokens.invalidate_one(&refresh.value).await {
                    tracing::error!(
                        principal_id = %subject_id,
                        error = %e,
                        "Failed to revoke refresh token minted during reuse incident"
                    );
                }
                self.refresh_failure(Some(subject_id), client, "lineage revoked during rotation");
                return Err(SessionError::InvalidCredentials);
            }
            Err(e) => {
                if let Err(revoke_error) = self.tokens.invalidate_one(&refresh.value).await {
                    tracing::error!(
                        principal_id = %subject_id,
                        error = %revoke_error,
                        "Failed to revoke unconfirmed refresh token"
                    );
                }
                self.refresh_failure(Some(subject_id), client, "store failure");
                return Err(e.into());
            }
        }

        self.audit.record(
            SecurityEvent::new(SecurityEventKind::RefreshSuccess, client)
                .with_principal(principal.id),
        );

        Ok(TokenPair { access, refresh })
    }
}

#[async_trait]
impl<PR, TR, NQ, AS> SessionServicePort for SessionService<PR, TR, NQ, AS>
where
    PR: PrincipalRepository,
    TR: TokenRepository,
    NQ: NotificationQueue,
    AS: AuditSink,
{
    async fn register(&self, command: RegisterCommand) -> Result<Principal, SessionError> {
        if !command.role.is_self_assignable() {
            return Err(RoleError::NotSelfAssignable(command.role.to_string()).into());
        }

        validate_password_strength(&command.password)?;
        let password_hash = self.hash_password(command.password).await?;

        let principal = Principal {
            id: PrincipalId::new(),
            name: command.name,
            email: command.email.clone(),
            password_hash,
            role: command.role,
            verified: false,
            created_at: Utc::now(),
        };

        let created = self.principals.create(principal).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => {
                SessionError::EmailAlreadyExists(command.email.to_string())
            }
            other => other.into(),
        })?;

        tracing::info!(principal_id = %created.id, role = %created.role, "Principal registered");

        if !created.verified {
            self.send_one_time_token(&created, TokenKind::Verification).await;
        }

        Ok(created)
    }

    async fn login(
        &self,
        command: LoginCommand,
        client: &ClientContext,
    ) -> Result<LoginOutcome, SessionError> {
        let LoginCommand { email, password } = command;

        let Ok(email) = EmailAddress::new(email) else {
            self.burn_dummy_verification(password).await;
            self.login_failure(None, client, "malformed email");
            return Err(SessionError::InvalidCredentials);
        };

        let principal = match self.principals.find_by_email(&email).await {
            Ok(Some(principal)) => principal,
            Ok(None) => {
                self.burn_dummy_verification(password).await;
                self.login_failure(None, client, "unknown email");
                return Err(SessionError::InvalidCredentials);
            }
            Err(e) => {
                self.login_failure(None, client, "store failure");
                return Err(e.into());
            }
        };

        if !self
            .verify_password(password, principal.password_hash.clone())
            .await
        {
            self.login_failure(Some(principal.id), client, "password mismatch");
            return Err(SessionError::InvalidCredentials);
        }

        if !principal.verified {
            self.login_failure(Some(principal.id), client, "email not verified");
            return Err(SessionError::VerificationRequired);
        }

        let access = self.issue_access_token(&principal.id, principal.role)?;
        let refresh = self.issue_refresh_token(principal.id).await?;
        self.enforce_session_cap(&principal.id).await?;

        self.audit.record(
            SecurityEvent::new(SecurityEventKind::LoginSuccess, client)
                .with_principal(principal.id),
        );

        Ok(LoginOutcome {
            tokens: TokenPair { access, refresh },
            principal,
        })
    }

    async fn refresh(
        &self,
        refresh_token: &str,
        client: &ClientContext,
    ) -> Result<TokenPair, SessionError> {
        let record = match self.tokens.fetch_by_value(refresh_token).await {
            Ok(record) => Some(record),
            Err(RepositoryError::NotFound) => None,
            Err(e) => {
                self.refresh_failure(None, client, "store failure");
                return Err(e.into());
            }
        };

        let transition = RefreshTransition::classify(record, Utc::now());
        tracing::debug!(transition = transition.label(), "Refresh token classified");

        match transition {
            RefreshTransition::Unknown => {
                self.refresh_failure(None, client, "unknown token");
                Err(SessionError::InvalidCredentials)
            }
            RefreshTransition::Expired(record) => {
                self.purge_expired(&record.value).await;
                self.refresh_failure(Some(record.subject_id), client, "expired");
                Err(SessionError::InvalidCredentials)
            }
            RefreshTransition::Replayed(subject_id) => {
                Err(self.contain_reuse(subject_id, client).await)
            }
            RefreshTransition::Rotate(record) => self.rotate(record, client).await,
        }
    }

    async fn logout(
        &self,
        principal: Option<&PrincipalContext>,
        refresh_token: Option<&str>,
        client: &ClientContext,
    ) {
        let mut subject_id = principal.map(|p| p.subject_id);

        if let Some(principal) = principal {
            // Outlive the token itself including the accepted clock skew.
            let natural_end = principal.expires_at + self.authenticator.leeway();
            let minimum_end = Utc::now() + self.policy.revocation_ttl;
            self.revocations
                .add(principal.token_id.clone(), natural_end.max(minimum_end))
                .await;
        }

        if let Some(value) = refresh_token {
            match self.tokens.fetch_by_value(value).await {
                Ok(record) if record.kind == TokenKind::Refresh => {
                    subject_id = subject_id.or(Some(record.subject_id));
                    if let Err(e) = self.tokens.invalidate_one(value).await {
                        tracing::warn!(error = %e, "Failed to delete refresh token at logout");
                    }
                }
                Ok(_) | Err(RepositoryError::NotFound) => {}
                Err(e) => tracing::warn!(error = %e, "Failed to look up refresh token at logout"),
            }
        }

        let mut event = SecurityEvent::new(SecurityEventKind::Logout, client);
        if let Some(id) = subject_id {
            event = event.with_principal(id);
        }
        self.audit.record(event);
    }

    async fn authenticate(&self, access_token: &str) -> Result<PrincipalContext, SessionError> {
        let token_id = fingerprint(access_token);

        if self.revocations.is_revoked(&token_id).await {
            tracing::debug!("Access token rejected: revoked");
            return Err(SessionError::InvalidCredentials);
        }

        let claims = self.authenticator.validate_token(access_token).map_err(|e| {
            tracing::debug!(error = %e, "Access token rejected");
            SessionError::InvalidCredentials
        })?;

        let subject_id = PrincipalId::from_string(&claims.sub).map_err(|e| {
            tracing::debug!(error = %e, "Access token rejected: bad subject");
            SessionError::InvalidCredentials
        })?;

        let role = claims.role.parse::<Role>().map_err(|e| {
            tracing::debug!(error = %e, "Access token rejected: bad role");
            SessionError::InvalidCredentials
        })?;

        Ok(PrincipalContext {
            subject_id,
            role,
            token_id,
            expires_at: claims.expires_at(),
        })
    }

    async fn current_principal(
        &self,
        principal: &PrincipalContext,
    ) -> Result<Principal, SessionError> {
        self.principals
            .find_by_id(&principal.subject_id)
            .await?
            .ok_or(SessionError::InvalidCredentials)
    }

    async fn verify_email(&self, token: &str) -> Result<(), SessionError> {
        let record = self.consume_one_time_token(token, TokenKind::Verification).await?;

        match self.principals.mark_verified(&record.subject_id).await {
            Ok(()) => {}
            Err(RepositoryError::NotFound) => return Err(SessionError::InvalidOneTimeToken),
            Err(e) => return Err(e.into()),
        }

        if let Err(e) = self.tokens.invalidate_one(token).await {
            tracing::warn!(error = %e, "Failed to delete spent verification token");
        }

        tracing::info!(principal_id = %record.subject_id, "Email verified");
        Ok(())
    }

    async fn request_password_reset(
        &self,
        email: &str,
        client: &ClientContext,
    ) -> Result<(), SessionError> {
        let Ok(email) = EmailAddress::new(email.to_string()) else {
            return Ok(());
        };

        let Some(principal) = self.principals.find_by_email(&email).await? else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(());
        };

        self.send_one_time_token(&principal, TokenKind::PasswordReset).await;

        self.audit.record(
            SecurityEvent::new(SecurityEventKind::PasswordReset, client)
                .with_principal(principal.id)
                .with_detail("reset requested"),
        );
        Ok(())
    }

    async fn reset_password(
        &self,
        token: &str,
        new_password: String,
        client: &ClientContext,
    ) -> Result<(), SessionError> {
        // Checked first so a weak password does not burn the token.
        validate_password_strength(&new_password)?;

        let record = self.consume_one_time_token(token, TokenKind::PasswordReset).await?;
        let password_hash = self.hash_password(new_password).await?;

        match self
            .principals
            .update_password_hash(&record.subject_id, &password_hash)
            .await
        {
            Ok(()) => {}
            Err(RepositoryError::NotFound) => return Err(SessionError::InvalidOneTimeToken),
            Err(e) => return Err(e.into()),
        }

        let revoked = self.tokens.invalidate_all_for_subject(&record.subject_id).await?;
        if let Err(e) = self.tokens.invalidate_one(token).await {
            tracing::warn!(error = %e, "Failed to delete spent reset token");
        }

        self.audit.record(
            SecurityEvent::new(SecurityEventKind::PasswordReset, client)
                .with_principal(record.subject_id)
                .with_detail(format!("password changed, {} sessions revoked", revoked)),
        );
        Ok(())
    }
}
