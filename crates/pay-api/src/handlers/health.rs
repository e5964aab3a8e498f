use axum::{response::IntoResponse, Json};

/// Health check endpoint. Always 200; downstream state is not checked.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "checkout-relay",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
