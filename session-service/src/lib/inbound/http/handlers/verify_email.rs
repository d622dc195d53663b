use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::ApiError;
use super::ApiSuccess;
use super::MessageData;
use crate::domain::session::ports::SessionServicePort;
use crate::inbound::http::router::AppState;

pub async fn verify_email<S: SessionServicePort>(
    State(state): State<AppState<S>>,
    Json(body): Json<VerifyEmailRequest>,
) -> Result<ApiSuccess<MessageData>, ApiError> {
    state
        .session_service
        .verify_email(body.token.trim())
        .await
        .map_err(ApiError::from)
        .map(|_| ApiSuccess::new(StatusCode::OK, MessageData::new("Email verified")))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VerifyEmailRequest {
    token: String,
}
