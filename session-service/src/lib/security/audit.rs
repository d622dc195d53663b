use std::fmt;

use chrono::DateTime;
use chrono::Utc;

use crate::domain::principal::models::PrincipalId;
use crate::domain::session::models::ClientContext;

/// Log target carrying security events.
pub const AUDIT_TARGET: &str = "security_audit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEventKind {
    LoginSuccess,
    LoginFailure,
    RefreshSuccess,
    RefreshFailure,
    TokenReuse,
    RateLimit,
    PasswordReset,
    Logout,
}

impl SecurityEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityEventKind::LoginSuccess => "login_success",
            SecurityEventKind::LoginFailure => "login_failure",
            SecurityEventKind::RefreshSuccess => "refresh_success",
            SecurityEventKind::RefreshFailure => "refresh_failure",
            SecurityEventKind::TokenReuse => "token_reuse",
            SecurityEventKind::RateLimit => "rate_limit",
            SecurityEventKind::PasswordReset => "password_reset",
            SecurityEventKind::Logout => "logout",
        }
    }

    /// Failures and attacks are warnings, everything else is informational.
    pub fn is_alarming(&self) -> bool {
        matches!(
            self,
            SecurityEventKind::LoginFailure
                | SecurityEventKind::RefreshFailure
                | SecurityEventKind::TokenReuse
                | SecurityEventKind::RateLimit
        )
    }
}

impl fmt::Display for SecurityEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of a security-relevant occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityEvent {
    pub kind: SecurityEventKind,
    pub principal_id: Option<PrincipalId>,
    pub client_ip: String,
    pub user_agent: Option<String>,
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl SecurityEvent {
    pub fn new(kind: SecurityEventKind, client: &ClientContext) -> Self {
        Self {
            kind,
            principal_id: None,
            client_ip: client.ip.clone(),
            user_agent: client.user_agent.clone(),
            detail: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_principal(mut self, principal_id: PrincipalId) -> Self {
        self.principal_id = Some(principal_id);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Write-only destination for security events.
pub trait AuditSink: Send + Sync + 'static {
    fn record(&self, event: SecurityEvent);
}

/// Emits security events as structured `tracing` records.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: SecurityEvent) {
        let principal_id = event.principal_id.map(|id| id.to_string());
        if event.kind.is_alarming() {
            tracing::warn!(
                target: AUDIT_TARGET,
                event_type = event.kind.as_str(),
                principal_id = principal_id.as_deref(),
                client_ip = %event.client_ip,
                user_agent = event.user_agent.as_deref(),
                detail = event.detail.as_deref(),
                timestamp = %event.timestamp.to_rfc3339(),
                "Security event"
            );
        } else {
            tracing::info!(
                target: AUDIT_TARGET,
                event_type = event.kind.as_str(),
                principal_id = principal_id.as_deref(),
                client_ip = %event.client_ip,
                user_agent = event.user_agent.as_deref(),
                detail = event.detail.as_deref(),
                timestamp = %event.timestamp.to_rfc3339(),
                "Security event"
            );
        }
    }
}
