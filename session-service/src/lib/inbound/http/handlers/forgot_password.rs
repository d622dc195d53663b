use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::ApiError;
use super::ApiSuccess;
use super::MessageData;
use crate::domain::session::ports::SessionServicePort;
use crate::inbound::http::middleware::Client;
use crate::inbound::http::router::AppState;

/// Same answer whether or not the email is registered.
const RESET_REQUESTED: &str = "If the email is registered, a reset link has been sent";

pub async fn forgot_password<S: SessionServicePort>(
    State(state): State<AppState<S>>,
    Client(client): Client,
    Json(body): Json<ForgotPasswordRequest>,
) -> Result<ApiSuccess<MessageData>, ApiError> {
    state
        .session_service
        .request_password_reset(&body.email, &client)
        .await
        .map_err(ApiError::from)
        .map(|_| ApiSuccess::new(StatusCode::OK, MessageData::new(RESET_REQUESTED)))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ForgotPasswordRequest {
    email: String,
}
