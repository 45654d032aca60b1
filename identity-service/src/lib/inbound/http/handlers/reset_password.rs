use axum::extract::Query;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde::Serialize;

use super::check_password_policy;
use super::ApiError;
use super::ApiSuccess;
use crate::domain::user::ports::UserServicePort;
use crate::inbound::http::router::AppState;

/// The reset token travels as a query parameter; the new password in the body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResetPasswordParams {
    token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResetPasswordRequest {
    new_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResetPasswordResponseData {
    pub message: String,
}

pub async fn reset_password(
    State(state): State<AppState>,
    Query(params): Query<ResetPasswordParams>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<ApiSuccess<ResetPasswordResponseData>, ApiError> {
    check_password_policy(&body.new_password)?;

    state
        .user_service
        .reset_password(&params.token, &body.new_password)
        .await
        .map_err(ApiError::from)?;

    Ok(ApiSuccess::new(
        StatusCode::OK,
        ResetPasswordResponseData {
            message: "Password reset".to_string(),
        },
    ))
}
