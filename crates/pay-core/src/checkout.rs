//! # Checkout Session Creator
//!
//! Opens a hosted checkout session at the gateway and writes the local
//! mirror row. If the mirror write fails the remote session is left as is;
//! there is no compensating call.

use crate::error::{ServiceError, ServiceResult};
use crate::gateway::{BoxedGateway, CheckoutRequest, GatewaySession};
use crate::model::{CheckoutMode, CheckoutSessionRecord};
use crate::store::SharedStore;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Checkout input as received from the client
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateCheckout {
    #[serde(default)]
    pub price_id: String,
    #[serde(default)]
    pub success_url: String,
    #[serde(default)]
    pub cancel_url: String,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub mode: CheckoutMode,
}

impl CreateCheckout {
    /// Check required fields are present and non-empty
    pub fn validate(&self) -> ServiceResult<()> {
        for (field, value) in [
            ("price_id", &self.price_id),
            ("success_url", &self.success_url),
            ("cancel_url", &self.cancel_url),
        ] {
            if value.trim().is_empty() {
                return Err(ServiceError::Validation(format!("{field} is required")));
            }
        }
        Ok(())
    }
}

/// Result returned to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutCreated {
    pub session_id: String,
    pub checkout_url: String,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Creates checkout sessions and keeps the local mirror
#[derive(Clone)]
pub struct CheckoutService {
    gateway: BoxedGateway,
    store: SharedStore,
}

impl CheckoutService {
    pub fn new(gateway: BoxedGateway, store: SharedStore) -> Self {
        Self { gateway, store }
    }

    /// Create a hosted checkout session for `subject_id`.
    #[instrument(skip(self, input), fields(subject = %subject_id, price_id = %input.price_id))]
    pub async fn create_checkout(
        &self,
        subject_id: &str,
        input: CreateCheckout,
    ) -> ServiceResult<CheckoutCreated> {
        input.validate()?;

        let request = CheckoutRequest {
            subject_id: subject_id.to_string(),
            price_id: input.price_id,
            quantity: 1,
            mode: input.mode,
            success_url: input.success_url,
            cancel_url: input.cancel_url,
            customer_email: non_empty(input.customer_email),
            customer_name: non_empty(input.customer_name),
            idempotency_key: Uuid::new_v4().to_string(),
        };

        let session = self.gateway.create_checkout_session(&request).await?;

        let checkout_url = session.url.clone().ok_or_else(|| {
            ServiceError::gateway(format!("session {} has no checkout URL", session.id))
        })?;

        let record = CheckoutSessionRecord {
            id: session.id.clone(),
            user_id: request.subject_id,
            price_id: request.price_id,
            status: session.status,
            mode: session.mode,
            created_at: session.created_at,
            expires_at: session.expires_at,
            success_url: request.success_url,
            cancel_url: request.cancel_url,
            customer_name: request.customer_name,
            customer_email: request.customer_email,
        };

        if let Err(e) = self.store.create_session(record).await {
            error!(
                "Remote session {} created but local mirror write failed: {}",
                session.id, e
            );
            return Err(match e {
                ServiceError::Persistence(msg) => ServiceError::Persistence(msg),
                other => ServiceError::Persistence(other.to_string()),
            });
        }

        info!(
            "Created checkout session: id={}, provider={}",
            session.id,
            self.gateway.provider_name()
        );

        Ok(CheckoutCreated {
            session_id: session.id,
            checkout_url,
        })
    }

    /// Read the gateway's view of a session owned by `subject_id`.
    ///
    /// The owner is the session's `client_reference_id`, or the local
    /// mirror's user when the gateway has none. Sessions with no owner or
    /// another owner are reported as not found.
    #[instrument(skip(self))]
    pub async fn retrieve_session(
        &self,
        subject_id: &str,
        session_id: &str,
    ) -> ServiceResult<GatewaySession> {
        if session_id.trim().is_empty() {
            return Err(ServiceError::Validation("session_id is required".to_string()));
        }
        if !session_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            return Err(ServiceError::Validation(
                "session_id contains invalid characters".to_string(),
            ));
        }

        let session = self.gateway.retrieve_checkout_session(session_id).await?;

        let owner = match session.client_reference_id.clone() {
            Some(owner) => Some(owner),
            None => self.store.get_session(session_id).await?.map(|s| s.user_id),
        };
        if owner.as_deref() != Some(subject_id) {
            warn!(
                "Session {} requested by {} but owned by {:?}",
                session_id, subject_id, owner
            );
            return Err(ServiceError::not_found("session", session_id));
        }

        Ok(session)
    }
}
