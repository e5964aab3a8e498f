//! Bearer-token authentication.
//!
//! [`require_auth`] guards the protected routes and stores the verified
//! subject in the request extensions; handlers take it via [`AuthSubject`].

use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use pay_core::AuthError;
use tracing::debug;

/// Subject ID taken from a verified bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSubject(pub String);

impl AuthSubject {
    pub fn id(&self) -> &str {
        &self.0
    }
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let subject = state.auth.jwt().verify_header(header).map_err(|e| {
        debug!("Rejected bearer token: {}", e);
        e
    })?;

    request.extensions_mut().insert(AuthSubject(subject));
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for AuthSubject
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthSubject>()
            .cloned()
            .ok_or_else(|| AuthError::MalformedHeader.into())
    }
}
