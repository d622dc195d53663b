use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::Json;
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use serde::Serialize;

use super::AccessTokenData;
use super::ApiError;
use super::ApiSuccess;
use super::PrincipalData;
use crate::domain::principal::models::LoginCommand;
use crate::domain::session::models::LoginOutcome;
use crate::domain::session::ports::SessionServicePort;
use crate::inbound::http::cookies::is_secure_request;
use crate::inbound::http::cookies::refresh_cookie;
use crate::inbound::http::middleware::Client;
use crate::inbound::http::router::AppState;

pub async fn login<S: SessionServicePort>(
    State(state): State<AppState<S>>,
    Client(client): Client,
    headers: HeaderMap,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<(CookieJar, ApiSuccess<LoginResponseData>), ApiError> {
    let outcome = state
        .session_service
        .login(body.into(), &client)
        .await
        .map_err(ApiError::from)?;

    let secure = is_secure_request(&headers, state.secure_cookies);
    let cookie = refresh_cookie(
        outcome.tokens.refresh.value.clone(),
        outcome.tokens.refresh.expires_at,
        secure,
    );

    Ok((
        jar.add(cookie),
        ApiSuccess::new(StatusCode::OK, (&outcome).into()),
    ))
}

/// HTTP request body for login (raw JSON)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

impl From<LoginRequest> for LoginCommand {
    fn from(body: LoginRequest) -> Self {
        LoginCommand {
            email: body.email,
            password: body.password,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginResponseData {
    #[serde(flatten)]
    pub token: AccessTokenData,
    pub user: PrincipalData,
}

impl From<&LoginOutcome> for LoginResponseData {
    fn from(outcome: &LoginOutcome) -> Self {
        Self {
            token: AccessTokenData::bearer(
                outcome.tokens.access.value.clone(),
                outcome.tokens.access.expires_at,
            ),
            user: (&outcome.principal).into(),
        }
    }
}
