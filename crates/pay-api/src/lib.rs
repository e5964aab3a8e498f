//! # pay-api
//!
//! HTTP API layer for checkout-relay.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - Account, profile, checkout and payment history endpoints
//! - The Stripe webhook endpoint
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/v1/health` | Health check |
//! | POST | `/v1/auth/register` | Create an account |
//! | POST | `/v1/auth/login` | Issue a bearer token |
//! | POST | `/v1/auth/refresh` | Re-issue a token |
//! | POST | `/v1/auth/forgot-password` | Request a reset token |
//! | POST | `/v1/auth/reset-password` | Set a new password |
//! | GET/PUT | `/api/v1/user/profile` | Read or update the profile |
//! | POST | `/api/v1/payments/create-checkout` | Create checkout session |
//! | GET | `/api/v1/payments/success` | Checkout success target |
//! | GET | `/api/v1/payments/cancel` | Checkout cancel target |
//! | GET | `/api/v1/payments` | Payment history |
//! | GET | `/api/v1/subscription` | Current subscription |
//! | POST | `/webhooks/stripe` | Stripe webhook |

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use config::AppConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
