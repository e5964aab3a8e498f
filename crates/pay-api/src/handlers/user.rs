use super::ApiJson;
use crate::error::ApiResult;
use crate::middleware::AuthSubject;
use crate::state::AppState;
use axum::{extract::State, Json};
use pay_core::UserProfile;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

pub async fn get_profile(
    State(state): State<AppState>,
    subject: AuthSubject,
) -> ApiResult<Json<UserProfile>> {
    Ok(Json(state.auth.profile(subject.id()).await?))
}

pub async fn update_profile(
    State(state): State<AppState>,
    subject: AuthSubject,
    ApiJson(request): ApiJson<UpdateProfileRequest>,
) -> ApiResult<Json<UserProfile>> {
    let profile = state
        .auth
        .update_profile(subject.id(), &request.first_name, &request.last_name)
        .await?;
    Ok(Json(profile))
}
