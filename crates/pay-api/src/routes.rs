//! # Routes
//!
//! Axum router configuration for checkout-relay.

use crate::error::ApiError;
use crate::handlers::{self, auth, health, payments, user, webhooks};
use crate::middleware::require_auth;
use crate::state::AppState;
use axum::{
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use pay_core::ServiceError;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - Public:
///   - GET  /v1/health
///   - POST /v1/auth/register, /v1/auth/login
///   - POST /v1/auth/forgot-password, /v1/auth/reset-password
///
/// - Bearer token required:
///   - POST /v1/auth/refresh
///   - GET|PUT /api/v1/user/profile
///   - POST /api/v1/payments/create-checkout
///   - GET  /api/v1/payments/success?session_id=
///   - GET  /api/v1/payments/cancel?session_id=
///   - GET  /api/v1/payments
///   - GET  /api/v1/subscription
///
/// - Webhooks (signature checked, no bearer token):
///   - POST /webhooks/stripe
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public_auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password));

    let protected_auth_routes = Router::new()
        .route("/refresh", post(auth::refresh))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let api_routes = Router::new()
        .route(
            "/user/profile",
            get(user::get_profile).put(user::update_profile),
        )
        .route("/payments/create-checkout", post(payments::create_checkout))
        .route("/payments/success", get(payments::checkout_success))
        .route("/payments/cancel", get(payments::checkout_cancel))
        .route("/payments", get(payments::list_payments))
        .route("/subscription", get(payments::get_subscription))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    // Raw body, authenticated by signature
    let webhook_routes = Router::new().route("/stripe", post(webhooks::stripe_webhook));

    Router::new()
        .route("/v1/health", get(health::health))
        .nest("/v1/auth", public_auth_routes.merge(protected_auth_routes))
        .nest("/api/v1", api_routes)
        .nest("/webhooks", webhook_routes)
        .fallback(handlers::not_found)
        // Middleware, outermost first
        .layer(
            ServiceBuilder::new()
                .layer(CatchPanicLayer::custom(panic_response))
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        // State
        .with_state(state)
}

fn panic_response(panic: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    ApiError(ServiceError::Internal(format!("handler panicked: {}", detail))).into_response()
}
