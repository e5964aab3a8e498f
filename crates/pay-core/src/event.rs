//! # Webhook Events
//!
//! Provider-neutral event envelope. Consumed once per delivery, never stored;
//! only its ID goes into the processed-event ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Webhook event types we act on
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// `checkout.session.completed`
    CheckoutSessionCompleted,
    /// `customer.subscription.created`
    SubscriptionCreated,
    /// `customer.subscription.updated`
    SubscriptionUpdated,
    /// `customer.subscription.deleted`
    SubscriptionDeleted,
    /// `invoice.paid`
    InvoicePaid,
    /// `invoice.payment_failed`
    InvoicePaymentFailed,
    /// Anything else (acknowledged, not handled)
    Unknown(String),
}

impl EventType {
    /// Exact string match on the wire type tag
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "checkout.session.completed" => EventType::CheckoutSessionCompleted,
            "customer.subscription.created" => EventType::SubscriptionCreated,
            "customer.subscription.updated" => EventType::SubscriptionUpdated,
            "customer.subscription.deleted" => EventType::SubscriptionDeleted,
            "invoice.paid" => EventType::InvoicePaid,
            "invoice.payment_failed" => EventType::InvoicePaymentFailed,
            other => EventType::Unknown(other.to_string()),
        }
    }

    /// The wire type tag
    pub fn as_tag(&self) -> &str {
        match self {
            EventType::CheckoutSessionCompleted => "checkout.session.completed",
            EventType::SubscriptionCreated => "customer.subscription.created",
            EventType::SubscriptionUpdated => "customer.subscription.updated",
            EventType::SubscriptionDeleted => "customer.subscription.deleted",
            EventType::InvoicePaid => "invoice.paid",
            EventType::InvoicePaymentFailed => "invoice.payment_failed",
            EventType::Unknown(tag) => tag,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, EventType::Unknown(_))
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// Events that should be enabled on the gateway's webhook endpoint
pub const HANDLED_EVENT_TYPES: &[&str] = &[
    "checkout.session.completed",
    "customer.subscription.created",
    "customer.subscription.updated",
    "customer.subscription.deleted",
    "invoice.paid",
    "invoice.payment_failed",
];

/// A verified webhook event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Event ID from provider (evt_...)
    pub id: String,

    /// Event type
    pub event_type: EventType,

    /// When the provider created the event
    pub created: DateTime<Utc>,

    /// The event's `data.object`, deserialized per type by handlers
    pub raw_data: serde_json::Value,
}

impl WebhookEvent {
    /// ID of the object the event is about, if present
    pub fn object_id(&self) -> Option<&str> {
        self.raw_data.get("id").and_then(|v| v.as_str())
    }
}
