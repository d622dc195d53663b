use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;

use super::ApiError;
use super::ApiSuccess;
use super::PrincipalData;
use crate::domain::session::models::PrincipalContext;
use crate::domain::session::ports::SessionServicePort;
use crate::inbound::http::router::AppState;

pub async fn me<S: SessionServicePort>(
    State(state): State<AppState<S>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<ApiSuccess<PrincipalData>, ApiError> {
    state
        .session_service
        .current_principal(&principal)
        .await
        .map_err(ApiError::from)
        .map(|ref principal| ApiSuccess::new(StatusCode::OK, principal.into()))
}
