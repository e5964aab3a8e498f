//! # Request Handlers
//!
//! Axum request handlers, grouped by route prefix.

pub mod auth;
pub mod health;
pub mod payments;
pub mod user;
pub mod webhooks;

use crate::error::ApiError;
use axum::{extract::FromRequest, http::Uri};
use pay_core::ServiceError;

/// `Json` extractor whose rejections go through [`ApiError`]
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Fallback for unmatched routes
pub async fn not_found(uri: Uri) -> ApiError {
    ServiceError::not_found("route", uri.path()).into()
}
