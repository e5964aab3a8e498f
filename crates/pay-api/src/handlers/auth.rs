//! `/v1/auth` handlers.

use super::ApiJson;
use crate::error::ApiResult;
use crate::middleware::AuthSubject;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use pay_auth::{IssuedToken, LoginResponse};
use pay_core::UserProfile;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<UserProfile>)> {
    let profile = state
        .auth
        .register(
            &request.email,
            &request.password,
            &request.first_name,
            &request.last_name,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let response = state.auth.login(&request.email, &request.password).await?;
    info!("User logged in: id={}", response.user.id);
    Ok(Json(response))
}

pub async fn refresh(
    State(state): State<AppState>,
    subject: AuthSubject,
) -> ApiResult<Json<IssuedToken>> {
    Ok(Json(state.auth.refresh(subject.id()).await?))
}

/// Always answers the same way so callers cannot tell which accounts exist
#[instrument(skip(state, request))]
pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ForgotPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    if state
        .auth
        .request_password_reset(&request.email)
        .await?
        .is_some()
    {
        info!("Password reset token issued; delivery is handled out of band");
    }
    Ok(Json(MessageResponse {
        message: "If the email is registered, a reset link has been sent",
    }))
}

#[instrument(skip(state, request))]
pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .auth
        .reset_password(&request.token, &request.password)
        .await?;
    Ok(Json(MessageResponse {
        message: "Password has been reset",
    }))
}
