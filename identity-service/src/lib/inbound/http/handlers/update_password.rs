use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;
use axum::Json;
use serde::Deserialize;
use serde::Serialize;

use super::check_password_policy;
use super::ApiError;
use super::ApiSuccess;
use crate::domain::user::ports::UserServicePort;
use crate::inbound::http::middleware::AuthenticatedUser;
use crate::inbound::http::router::AppState;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpdatePasswordRequest {
    old_password: String,
    new_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdatePasswordResponseData {
    pub message: String,
}

pub async fn update_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(body): Json<UpdatePasswordRequest>,
) -> Result<ApiSuccess<UpdatePasswordResponseData>, ApiError> {
    check_password_policy(&body.new_password)?;

    state
        .user_service
        .update_password(&auth.user_id, &body.old_password, &body.new_password)
        .await
        .map_err(ApiError::from)?;

    Ok(ApiSuccess::new(
        StatusCode::OK,
        UpdatePasswordResponseData {
            message: "Password updated".to_string(),
        },
    ))
}
