use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum_extra::extract::CookieJar;

use super::ApiSuccess;
use super::MessageData;
use crate::domain::session::ports::SessionServicePort;
use crate::inbound::http::cookies::cleared_refresh_cookie;
use crate::inbound::http::cookies::is_secure_request;
use crate::inbound::http::cookies::REFRESH_COOKIE;
use crate::inbound::http::middleware::bearer_token;
use crate::inbound::http::middleware::Client;
use crate::inbound::http::router::AppState;

/// Always answers 200 and clears the refresh cookie. A valid bearer token is
/// revoked; an invalid or missing one is ignored.
pub async fn logout<S: SessionServicePort>(
    State(state): State<AppState<S>>,
    Client(client): Client,
    headers: HeaderMap,
    jar: CookieJar,
) -> (CookieJar, ApiSuccess<MessageData>) {
    let principal = match bearer_token(&headers) {
        Some(token) => state.session_service.authenticate(token).await.ok(),
        None => None,
    };
    let refresh_token = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string());

    state
        .session_service
        .logout(principal.as_ref(), refresh_token.as_deref(), &client)
        .await;

    let secure = is_secure_request(&headers, state.secure_cookies);
    (
        jar.add(cleared_refresh_cookie(secure)),
        ApiSuccess::new(StatusCode::OK, MessageData::new("Logged out")),
    )
}
