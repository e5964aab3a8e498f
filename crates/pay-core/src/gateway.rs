//! # Payment Gateway Trait
//!
//! The third-party processor's API as seen by the service: create a hosted
//! checkout session and read one back. The concrete client is constructed at
//! startup and injected as a `BoxedGateway`.

use crate::error::ServiceResult;
use crate::model::{CheckoutMode, SessionStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Parameters for a hosted checkout session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    /// Owning subject, sent as the client reference
    pub subject_id: String,
    pub price_id: String,
    pub quantity: u32,
    pub mode: CheckoutMode,
    pub success_url: String,
    pub cancel_url: String,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    /// Sent as `Idempotency-Key` so a retried create does not open two sessions
    pub idempotency_key: String,
}

/// A checkout session as reported by the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewaySession {
    pub id: String,
    /// Hosted checkout URL; absent once the session is complete or expired
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub status: SessionStatus,
    pub mode: CheckoutMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_total: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_reference_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Core trait for payment gateway clients.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted checkout session.
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> ServiceResult<GatewaySession>;

    /// Retrieve a checkout session by ID.
    async fn retrieve_checkout_session(&self, session_id: &str) -> ServiceResult<GatewaySession>;

    /// Get the provider name (for logging and routing).
    fn provider_name(&self) -> &'static str;
}

/// Type alias for a boxed gateway (dynamic dispatch)
pub type BoxedGateway = Arc<dyn PaymentGateway>;
