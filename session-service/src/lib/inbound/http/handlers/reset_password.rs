use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::Json;
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use super::ApiError;
use super::ApiSuccess;
use super::MessageData;
use crate::domain::session::ports::SessionServicePort;
use crate::inbound::http::cookies::cleared_refresh_cookie;
use crate::inbound::http::cookies::is_secure_request;
use crate::inbound::http::middleware::Client;
use crate::inbound::http::router::AppState;

pub async fn reset_password<S: SessionServicePort>(
    State(state): State<AppState<S>>,
    Client(client): Client,
    headers: HeaderMap,
    jar: CookieJar,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<(CookieJar, ApiSuccess<MessageData>), ApiError> {
    state
        .session_service
        .reset_password(body.token.trim(), body.password, &client)
        .await
        .map_err(ApiError::from)?;

    // Every refresh token of the principal is gone now.
    let secure = is_secure_request(&headers, state.secure_cookies);
    Ok((
        jar.add(cleared_refresh_cookie(secure)),
        ApiSuccess::new(StatusCode::OK, MessageData::new("Password has been reset")),
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResetPasswordRequest {
    token: String,
    password: String,
}
