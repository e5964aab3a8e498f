//! # Stripe Webhook Handling
//!
//! Inbound deliveries go through two steps:
//!
//! 1. [`WebhookVerifier`] checks the `Stripe-Signature` header against the
//!    raw body. Nothing else runs if it fails.
//! 2. [`dispatch_webhook_event`] routes the parsed event to a
//!    [`WebhookHandler`] by exact type tag. Unknown types are acknowledged.
//!
//! [`WebhookProcessor`] ties both together with the processed-event ledger so
//! a redelivered event is acknowledged without running handlers again.

use crate::config::StripeConfig;
use crate::objects::{timestamp, CheckoutSessionObject, InvoiceObject, SubscriptionObject};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use pay_core::{
    EventType, ServiceError, ServiceResult, SharedStore, WebhookError, WebhookEvent,
};
use serde::{de::DeserializeOwned, Deserialize};
use sha2::Sha256;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

type HmacSha256 = Hmac<Sha256>;

// =============================================================================
// Signature Verification
// =============================================================================

struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<String>,
}

fn parse_signature_header(header: &str) -> Result<SignatureHeader, WebhookError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            "v1" => signatures.push(value.to_string()),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        WebhookError::InvalidSignature("missing timestamp in signature header".to_string())
    })?;

    if signatures.is_empty() {
        return Err(WebhookError::InvalidSignature(
            "no v1 signature found".to_string(),
        ));
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

fn compute_hmac_sha256(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, WebhookError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| WebhookError::InvalidSignature(format!("unusable signing secret: {}", e)))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Checks `Stripe-Signature` headers with the endpoint's signing secret
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>, tolerance_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs,
        }
    }

    pub fn from_config(config: &StripeConfig) -> Self {
        Self::new(config.webhook_secret.clone(), config.webhook_tolerance_secs)
    }

    /// Verify `payload` against a `t=<ts>,v1=<sig>[,v1=...]` header
    pub fn verify(
        &self,
        payload: &[u8],
        signature: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), WebhookError> {
        let header = signature
            .filter(|s| !s.trim().is_empty())
            .ok_or(WebhookError::MissingSignature)?;
        let parsed = parse_signature_header(header)?;

        if now.timestamp().abs_diff(parsed.timestamp) > self.tolerance_secs.unsigned_abs() {
            return Err(WebhookError::InvalidSignature(
                "timestamp outside tolerance".to_string(),
            ));
        }

        let expected = compute_hmac_sha256(&self.secret, parsed.timestamp, payload)?;
        let valid = parsed
            .signatures
            .iter()
            .any(|sig| constant_time_compare(sig, &expected));

        if !valid {
            return Err(WebhookError::InvalidSignature(
                "signature mismatch".to_string(),
            ));
        }

        Ok(())
    }

    /// Build a header value signing `payload` at `timestamp`
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String, WebhookError> {
        let signature = compute_hmac_sha256(&self.secret, timestamp, payload)?;
        Ok(format!("t={},v1={}", timestamp, signature))
    }
}

// =============================================================================
// Event Envelope
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripeWebhookEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    created: i64,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: serde_json::Value,
}

/// Parse a verified payload into the provider-neutral envelope
pub fn parse_event(payload: &[u8]) -> Result<WebhookEvent, WebhookError> {
    let event: StripeWebhookEvent = serde_json::from_slice(payload)
        .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;

    Ok(WebhookEvent {
        id: event.id,
        event_type: EventType::from_tag(&event.event_type),
        created: timestamp(Some(event.created)).unwrap_or_else(Utc::now),
        raw_data: event.data.object,
    })
}

fn parse_object<T: DeserializeOwned>(event: &WebhookEvent) -> ServiceResult<T> {
    serde_json::from_value(event.raw_data.clone()).map_err(|e| {
        ServiceError::Validation(format!("invalid {} object: {}", event.event_type, e))
    })
}

// =============================================================================
// Dispatch
// =============================================================================

/// Webhook event handler trait
///
/// Every method defaults to logging the event and succeeding.
#[allow(unused_variables)]
#[async_trait]
pub trait WebhookHandler: Send + Sync {
    /// `checkout.session.completed`
    async fn on_checkout_session_completed(
        &self,
        event: &WebhookEvent,
        session: CheckoutSessionObject,
    ) -> ServiceResult<()> {
        info!(
            "Checkout completed: session={}, amount={:?}",
            session.id, session.amount_total
        );
        Ok(())
    }

    /// `customer.subscription.created`
    async fn on_subscription_created(
        &self,
        event: &WebhookEvent,
        subscription: SubscriptionObject,
    ) -> ServiceResult<()> {
        info!("Subscription created: {}", subscription.id);
        Ok(())
    }

    /// `customer.subscription.updated`
    async fn on_subscription_updated(
        &self,
        event: &WebhookEvent,
        subscription: SubscriptionObject,
    ) -> ServiceResult<()> {
        info!(
            "Subscription updated: {} status={}",
            subscription.id, subscription.status
        );
        Ok(())
    }

    /// `customer.subscription.deleted`
    async fn on_subscription_deleted(
        &self,
        event: &WebhookEvent,
        subscription: SubscriptionObject,
    ) -> ServiceResult<()> {
        info!("Subscription deleted: {}", subscription.id);
        Ok(())
    }

    /// `invoice.paid`
    async fn on_invoice_paid(
        &self,
        event: &WebhookEvent,
        invoice: InvoiceObject,
    ) -> ServiceResult<()> {
        info!("Invoice paid: {} amount={:?}", invoice.id, invoice.amount_paid);
        Ok(())
    }

    /// `invoice.payment_failed`
    async fn on_invoice_payment_failed(
        &self,
        event: &WebhookEvent,
        invoice: InvoiceObject,
    ) -> ServiceResult<()> {
        warn!("Invoice payment failed: {}", invoice.id);
        Ok(())
    }

    /// Called for unknown/unhandled events
    async fn on_unknown_event(&self, event: &WebhookEvent) -> ServiceResult<()> {
        debug!("Unhandled webhook event: {}", event.event_type);
        Ok(())
    }
}

/// Handler that only logs
pub struct LoggingWebhookHandler;

impl WebhookHandler for LoggingWebhookHandler {}

async fn route(handler: &dyn WebhookHandler, event: &WebhookEvent) -> ServiceResult<()> {
    match &event.event_type {
        EventType::CheckoutSessionCompleted => {
            handler
                .on_checkout_session_completed(event, parse_object(event)?)
                .await
        }
        EventType::SubscriptionCreated => {
            handler
                .on_subscription_created(event, parse_object(event)?)
                .await
        }
        EventType::SubscriptionUpdated => {
            handler
                .on_subscription_updated(event, parse_object(event)?)
                .await
        }
        EventType::SubscriptionDeleted => {
            handler
                .on_subscription_deleted(event, parse_object(event)?)
                .await
        }
        EventType::InvoicePaid => handler.on_invoice_paid(event, parse_object(event)?).await,
        EventType::InvoicePaymentFailed => {
            handler
                .on_invoice_payment_failed(event, parse_object(event)?)
                .await
        }
        EventType::Unknown(_) => handler.on_unknown_event(event).await,
    }
}

/// Dispatch a webhook event to the appropriate handler method.
///
/// Any failure comes back as `ServiceError::EventHandler`.
pub async fn dispatch_webhook_event(
    handler: &dyn WebhookHandler,
    event: &WebhookEvent,
) -> ServiceResult<()> {
    route(handler, event).await.map_err(|e| {
        error!(
            "Webhook handler failed: event={}, type={}, error={}",
            event.id, event.event_type, e
        );
        ServiceError::EventHandler {
            event_type: event.event_type.to_string(),
            source: Box::new(e),
        }
    })
}

// =============================================================================
// Processor
// =============================================================================

/// What happened to an accepted delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Routed to a handler and recorded
    Dispatched,
    /// Already processed; handlers did not run
    Duplicate,
    /// Unknown event type; acknowledged without state changes
    Ignored,
}

/// Verify, deduplicate and dispatch inbound deliveries
#[derive(Clone)]
pub struct WebhookProcessor {
    verifier: WebhookVerifier,
    handler: Arc<dyn WebhookHandler>,
    store: SharedStore,
}

impl WebhookProcessor {
    pub fn new(
        verifier: WebhookVerifier,
        handler: Arc<dyn WebhookHandler>,
        store: SharedStore,
    ) -> Self {
        Self {
            verifier,
            handler,
            store,
        }
    }

    pub fn verifier(&self) -> &WebhookVerifier {
        &self.verifier
    }

    /// Handle one delivery.
    ///
    /// The ledger is checked before dispatch and written after it succeeds.
    /// Two concurrent deliveries of one event can both pass the check.
    #[instrument(skip(self, payload, signature), fields(bytes = payload.len()))]
    pub async fn process(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> ServiceResult<ProcessOutcome> {
        self.verifier.verify(payload, signature, Utc::now())?;
        let event = parse_event(payload)?;
        debug!("Verified Stripe webhook: id={}, type={}", event.id, event.event_type);

        if !event.event_type.is_known() {
            self.handler.on_unknown_event(&event).await?;
            return Ok(ProcessOutcome::Ignored);
        }

        if self.store.has_processed_event(&event.id).await? {
            info!("Duplicate webhook delivery ignored: id={}", event.id);
            return Ok(ProcessOutcome::Duplicate);
        }

        dispatch_webhook_event(self.handler.as_ref(), &event).await?;
        self.store.record_processed_event(&event.id).await?;

        info!("Processed webhook: id={}, type={}", event.id, event.event_type);
        Ok(ProcessOutcome::Dispatched)
    }
}
