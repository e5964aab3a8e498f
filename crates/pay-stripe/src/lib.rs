//! # pay-stripe
//!
//! Stripe integration for checkout-relay.
//!
//! - [`StripeGateway`] implements `pay_core::PaymentGateway` over the
//!   Checkout Sessions API (create + retrieve).
//! - [`WebhookProcessor`] verifies `Stripe-Signature`, deduplicates on the
//!   event ID and dispatches to a [`WebhookHandler`].
//! - [`StoreWebhookHandler`] is the handler that updates the local mirror.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pay_stripe::{StoreWebhookHandler, StripeConfig, StripeGateway, WebhookProcessor, WebhookVerifier};
//!
//! let config = StripeConfig::from_env()?;
//! let gateway = Arc::new(StripeGateway::new(config.clone())?);
//!
//! let webhooks = WebhookProcessor::new(
//!     WebhookVerifier::from_config(&config),
//!     Arc::new(StoreWebhookHandler::new(store.clone())),
//!     store,
//! );
//!
//! // In your webhook endpoint:
//! webhooks.process(&body, signature_header).await?;
//! ```

pub mod checkout;
pub mod config;
pub mod mirror;
pub mod objects;
pub mod webhook;

// Re-exports
pub use checkout::StripeGateway;
pub use config::StripeConfig;
pub use mirror::StoreWebhookHandler;
pub use objects::{CheckoutSessionObject, Expandable, InvoiceObject, SubscriptionObject};
pub use webhook::{
    dispatch_webhook_event, parse_event, LoggingWebhookHandler, ProcessOutcome,
    WebhookHandler, WebhookProcessor, WebhookVerifier,
};
