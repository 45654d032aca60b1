use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use super::get_user::UserResponse;
use super::ApiError;
use super::ApiSuccess;
use crate::domain::user::models::UpdateProfileCommand;
use crate::domain::user::ports::UserServicePort;
use crate::inbound::http::middleware::AuthenticatedUser;
use crate::inbound::http::router::AppState;

/// HTTP request body for updating the profile (raw JSON)
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
}

impl UpdateProfileRequest {
    fn into_command(self) -> UpdateProfileCommand {
        UpdateProfileCommand {
            first_name: self.first_name,
            last_name: self.last_name,
            birth_date: self.birth_date,
        }
    }
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<ApiSuccess<UserResponse>, ApiError> {
    state
        .user_service
        .update_profile(&auth.user_id, req.into_command())
        .await
        .map_err(ApiError::from)
        .map(|profile| ApiSuccess::new(StatusCode::OK, profile.into()))
}
