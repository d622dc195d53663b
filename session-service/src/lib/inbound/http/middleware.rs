use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::async_trait;
use axum::extract::ConnectInfo;
use axum::extract::FromRequestParts;
use axum::extract::Request;
use axum::extract::State;
use axum::http::request::Parts;
use axum::http::Extensions;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use http::header;

use crate::domain::session::models::ClientContext;
use crate::domain::session::ports::SessionServicePort;
use crate::inbound::http::handlers::ApiError;
use crate::inbound::http::router::AppState;
use crate::security::audit::AuditSink;
use crate::security::audit::SecurityEvent;
use crate::security::audit::SecurityEventKind;
use crate::security::rate_limit::RateLimitDecision;
use crate::security::rate_limit::RateLimitedOperation;
use crate::security::rate_limit::RateLimiter;

const UNKNOWN_CLIENT: &str = "unknown";

/// Request origin: client IP and user agent.
#[derive(Debug, Clone)]
pub struct Client(pub ClientContext);

#[async_trait]
impl<S> FromRequestParts<S> for Client
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Client(client_context(&parts.headers, &parts.extensions)))
    }
}

/// Client IP from the proxy headers, falling back to the peer address.
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> String {
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        return forwarded.to_string();
    }

    if let Some(real_ip) = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        return real_ip.to_string();
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

pub fn client_context(headers: &HeaderMap, extensions: &Extensions) -> ClientContext {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    ClientContext::new(client_ip(headers, extensions), user_agent)
}

/// Bearer token from the Authorization header, if well formed.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Middleware state for one throttled route.
#[derive(Clone)]
pub struct RateLimitGuard {
    limiter: Arc<RateLimiter>,
    audit: Arc<dyn AuditSink>,
    operation: RateLimitedOperation,
}

impl RateLimitGuard {
    pub fn new(
        limiter: Arc<RateLimiter>,
        audit: Arc<dyn AuditSink>,
        operation: RateLimitedOperation,
    ) -> Self {
        Self {
            limiter,
            audit,
            operation,
        }
    }
}

/// Middleware that rejects a client over its sliding-window limit with 429
pub async fn rate_limit(
    State(guard): State<RateLimitGuard>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    let client = client_context(req.headers(), req.extensions());

    match guard.limiter.check(&client.ip, guard.operation).await {
        RateLimitDecision::Allowed => Ok(next.run(req).await),
        RateLimitDecision::Limited { retry_after } => {
            let retry_after_secs = retry_after.num_seconds().max(1) as u64;
            tracing::debug!(
                operation = %guard.operation,
                client_ip = %client.ip,
                retry_after_secs,
                "Rate limit exceeded"
            );
            guard.audit.record(
                SecurityEvent::new(SecurityEventKind::RateLimit, &client)
                    .with_detail(guard.operation.as_str()),
            );

            Err(ApiError::TooManyRequests {
                message: "Too many requests, please try again later".to_string(),
                retry_after_secs,
            }
            .into_response())
        }
    }
}

/// Middleware that runs the authenticate guard and stores the resulting
/// `PrincipalContext` in request extensions
pub async fn authenticate<S>(
    State(state): State<AppState<S>>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response>
where
    S: SessionServicePort,
{
    let token = bearer_token(req.headers())
        .ok_or_else(|| {
            ApiError::Unauthorized("Missing or malformed Authorization header".to_string())
                .into_response()
        })?
        .to_string();

    let principal = state
        .session_service
        .authenticate(&token)
        .await
        .map_err(|e| ApiError::from(e).into_response())?;

    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}
