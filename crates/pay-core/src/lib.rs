//! # pay-core
//!
//! Core types and traits for the checkout-relay payment backend.
//!
//! This crate provides:
//! - `ServiceError` for typed error handling, with one status/code mapping
//! - `User`, `CheckoutSessionRecord`, `Payment`, `Subscription` records
//! - `Store` trait for the credential store, and `MemoryStore`
//! - `PaymentGateway` trait for the payment processor's API
//! - `CheckoutService` for creating hosted checkout sessions
//! - `WebhookEvent` and `EventType` for gateway callbacks
//!
//! ## Example
//!
//! ```rust,ignore
//! use pay_core::{CheckoutService, CreateCheckout, MemoryStore};
//! use std::sync::Arc;
//!
//! let service = CheckoutService::new(gateway, Arc::new(MemoryStore::new()));
//!
//! let created = service.create_checkout("user_123", CreateCheckout {
//!     price_id: "price_123".into(),
//!     success_url: "https://example.com/ok".into(),
//!     cancel_url: "https://example.com/no".into(),
//!     ..Default::default()
//! }).await?;
//!
//! // Redirect user to created.checkout_url
//! ```

pub mod checkout;
pub mod error;
pub mod event;
pub mod gateway;
pub mod memory;
pub mod model;
pub mod store;

// Re-exports for convenience
pub use checkout::{CheckoutCreated, CheckoutService, CreateCheckout};
pub use error::{AuthError, ServiceError, ServiceResult, WebhookError};
pub use event::{EventType, WebhookEvent, HANDLED_EVENT_TYPES};
pub use gateway::{BoxedGateway, CheckoutRequest, GatewaySession, PaymentGateway};
pub use memory::MemoryStore;
pub use model::{
    CheckoutMode, CheckoutSessionRecord, PasswordResetToken, Payment, PaymentStatus,
    SessionStatus, Subscription, SubscriptionStatus, User, UserProfile,
};
pub use store::{SharedStore, Store};
