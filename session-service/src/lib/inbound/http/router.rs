use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::http::Response;
use axum::middleware;
use axum::routing::get;
use axum::routing::post;
use axum::routing::MethodRouter;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Span;

use super::handlers::forgot_password::forgot_password;
use super::handlers::login::login;
use super::handlers::logout::logout;
use super::handlers::me::me;
use super::handlers::refresh::refresh;
use super::handlers::register::register;
use super::handlers::reset_password::reset_password;
use super::handlers::verify_email::verify_email;
use super::middleware::authenticate as auth_middleware;
use super::middleware::rate_limit;
use super::middleware::RateLimitGuard;
use crate::domain::session::ports::SessionServicePort;
use crate::security::audit::AuditSink;
use crate::security::rate_limit::RateLimitedOperation;
use crate::security::rate_limit::RateLimiter;

pub struct AppState<S: SessionServicePort> {
    pub session_service: Arc<S>,
    pub rate_limiter: Arc<RateLimiter>,
    pub audit: Arc<dyn AuditSink>,
    /// Always mark cookies Secure, regardless of `X-Forwarded-Proto`.
    pub secure_cookies: bool,
}

impl<S: SessionServicePort> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            session_service: Arc::clone(&self.session_service),
            rate_limiter: Arc::clone(&self.rate_limiter),
            audit: Arc::clone(&self.audit),
            secure_cookies: self.secure_cookies,
        }
    }
}

pub fn create_router<S: SessionServicePort>(
    session_service: Arc<S>,
    rate_limiter: Arc<RateLimiter>,
    audit: Arc<dyn AuditSink>,
    secure_cookies: bool,
) -> Router {
    let state = AppState {
        session_service,
        rate_limiter,
        audit,
        secure_cookies,
    };

    let throttled = |handler: MethodRouter<AppState<S>>, operation: RateLimitedOperation| {
        let guard = RateLimitGuard::new(
            Arc::clone(&state.rate_limiter),
            Arc::clone(&state.audit),
            operation,
        );
        handler.route_layer(middleware::from_fn_with_state(guard, rate_limit))
    };

    let public_routes = Router::new()
        .route(
            "/api/auth/register",
            throttled(post(register::<S>), RateLimitedOperation::Register),
        )
        .route(
            "/api/auth/login",
            throttled(post(login::<S>), RateLimitedOperation::Login),
        )
        .route(
            "/api/auth/refresh",
            throttled(post(refresh::<S>), RateLimitedOperation::Refresh),
        )
        .route("/api/auth/logout", post(logout::<S>))
        .route(
            "/api/auth/verify-email",
            throttled(post(verify_email::<S>), RateLimitedOperation::VerifyEmail),
        )
        .route(
            "/api/auth/forgot-password",
            throttled(
                post(forgot_password::<S>),
                RateLimitedOperation::PasswordResetRequest,
            ),
        )
        // Shares the reset budget so token guessing is throttled too.
        .route(
            "/api/auth/reset-password",
            throttled(
                post(reset_password::<S>),
                RateLimitedOperation::PasswordResetRequest,
            ),
        );

    let protected_routes = Router::new()
        .route("/api/auth/me", get(me::<S>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware::<S>,
        ));

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version(),
            )
        })
        .on_request(|request: &Request<Body>, _span: &Span| {
            tracing::info!(
                method = %request.method(),
                uri = %request.uri(),
                "Request started"
            );
        })
        .on_response(
            |response: &Response<Body>, latency: Duration, _span: &Span| {
                tracing::info!(
                    status = response.status().as_u16(),
                    latency_ms = latency.as_millis(),
                    "Request completed"
                );
            },
        );

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(trace_layer)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
