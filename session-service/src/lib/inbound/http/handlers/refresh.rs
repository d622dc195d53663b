use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum_extra::extract::CookieJar;

use super::AccessTokenData;
use super::ApiError;
use super::ApiSuccess;
use crate::domain::session::ports::SessionServicePort;
use crate::inbound::http::cookies::cleared_refresh_cookie;
use crate::inbound::http::cookies::is_secure_request;
use crate::inbound::http::cookies::refresh_cookie;
use crate::inbound::http::cookies::REFRESH_COOKIE;
use crate::inbound::http::middleware::Client;
use crate::inbound::http::router::AppState;
use crate::security::audit::AuditSink;
use crate::security::audit::SecurityEvent;
use crate::security::audit::SecurityEventKind;

/// Rotate the refresh cookie. A rejected token also clears the cookie so the
/// client stops replaying it.
pub async fn refresh<S: SessionServicePort>(
    State(state): State<AppState<S>>,
    Client(client): Client,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<(CookieJar, ApiSuccess<AccessTokenData>), (CookieJar, ApiError)> {
    let secure = is_secure_request(&headers, state.secure_cookies);

    let Some(presented) = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string()) else {
        state.audit.record(
            SecurityEvent::new(SecurityEventKind::RefreshFailure, &client)
                .with_detail("missing refresh cookie"),
        );
        return Err((
            jar,
            ApiError::Unauthorized("Missing refresh token".to_string()),
        ));
    };

    match state.session_service.refresh(&presented, &client).await {
        Ok(pair) => {
            let cookie = refresh_cookie(pair.refresh.value, pair.refresh.expires_at, secure);
            Ok((
                jar.add(cookie),
                ApiSuccess::new(
                    StatusCode::OK,
                    AccessTokenData::bearer(pair.access.value, pair.access.expires_at),
                ),
            ))
        }
        Err(e) => Err((jar.add(cleared_refresh_cookie(secure)), ApiError::from(e))),
    }
}
