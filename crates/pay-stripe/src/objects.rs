//! # Stripe API Objects
//!
//! The subset of Stripe's object shapes this service reads, used both for
//! API responses and for webhook `data.object` payloads.

use chrono::{DateTime, Utc};
use pay_core::{CheckoutMode, GatewaySession, SessionStatus};
use serde::Deserialize;
use std::collections::HashMap;

/// Convert a Unix timestamp to UTC
pub(crate) fn timestamp(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| DateTime::from_timestamp(s, 0))
}

/// A reference that is either an ID or an expanded object
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Expandable {
    Id(String),
    Object { id: String },
}

impl Expandable {
    pub fn id(&self) -> &str {
        match self {
            Expandable::Id(id) => id,
            Expandable::Object { id } => id,
        }
    }
}

fn expandable_id(value: &Option<Expandable>) -> Option<String> {
    value.as_ref().map(|e| e.id().to_string())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// `checkout.session` object
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub customer: Option<Expandable>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    #[serde(default)]
    pub payment_intent: Option<Expandable>,
    #[serde(default)]
    pub subscription: Option<Expandable>,
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
}

impl CheckoutSessionObject {
    pub fn session_status(&self) -> SessionStatus {
        self.status
            .as_deref()
            .map(SessionStatus::parse)
            .unwrap_or_default()
    }

    pub fn checkout_mode(&self) -> CheckoutMode {
        match self.mode.as_deref() {
            Some("subscription") => CheckoutMode::Subscription,
            Some("setup") => CheckoutMode::Setup,
            _ => CheckoutMode::Payment,
        }
    }

    pub fn customer_id(&self) -> Option<String> {
        expandable_id(&self.customer)
    }

    pub fn payment_intent_id(&self) -> Option<String> {
        expandable_id(&self.payment_intent)
    }

    /// Email from `customer_details`, falling back to the prefilled one
    pub fn email(&self) -> Option<String> {
        self.customer_details
            .as_ref()
            .and_then(|d| d.email.clone())
            .or_else(|| self.customer_email.clone())
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        timestamp(self.created).unwrap_or_else(Utc::now)
    }

    pub fn into_gateway_session(self) -> GatewaySession {
        GatewaySession {
            status: self.session_status(),
            mode: self.checkout_mode(),
            customer_id: self.customer_id(),
            customer_email: self.email(),
            payment_intent_id: self.payment_intent_id(),
            created_at: self.created_at(),
            expires_at: timestamp(self.expires_at),
            id: self.id,
            url: self.url,
            payment_status: self.payment_status,
            amount_total: self.amount_total,
            currency: self.currency,
            client_reference_id: self.client_reference_id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceRef {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItem {
    #[serde(default)]
    pub price: Option<PriceRef>,
    #[serde(default)]
    pub current_period_start: Option<i64>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionItems {
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

/// `subscription` object
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionObject {
    pub id: String,
    pub customer: Expandable,
    pub status: String,
    #[serde(default)]
    pub current_period_start: Option<i64>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub cancel_at: Option<i64>,
    #[serde(default)]
    pub canceled_at: Option<i64>,
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub items: Option<SubscriptionItems>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
}

impl SubscriptionObject {
    fn first_item(&self) -> Option<&SubscriptionItem> {
        self.items.as_ref().and_then(|items| items.data.first())
    }

    pub fn price_id(&self) -> Option<String> {
        self.first_item()
            .and_then(|item| item.price.as_ref())
            .map(|p| p.id.clone())
    }

    /// Billing period start; newer API versions only report it per item
    pub fn period_start(&self) -> Option<DateTime<Utc>> {
        timestamp(
            self.current_period_start
                .or_else(|| self.first_item().and_then(|i| i.current_period_start)),
        )
    }

    pub fn period_end(&self) -> Option<DateTime<Utc>> {
        timestamp(
            self.current_period_end
                .or_else(|| self.first_item().and_then(|i| i.current_period_end)),
        )
    }

    /// Subject recorded in the subscription's metadata at checkout
    pub fn user_id(&self) -> Option<String> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("user_id"))
            .cloned()
    }
}

/// `invoice` object
#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceObject {
    pub id: String,
    #[serde(default)]
    pub customer: Option<Expandable>,
    #[serde(default)]
    pub subscription: Option<Expandable>,
    #[serde(default)]
    pub amount_paid: Option<i64>,
    #[serde(default)]
    pub amount_due: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub attempt_count: Option<i64>,
}

impl InvoiceObject {
    pub fn subscription_id(&self) -> Option<String> {
        expandable_id(&self.subscription)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct StripeErrorResponse {
    pub error: StripeError,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StripeError {
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
}
