//! # Stripe Checkout Sessions
//!
//! `PaymentGateway` backed by the Stripe Checkout Sessions API.

use crate::config::StripeConfig;
use crate::objects::{CheckoutSessionObject, StripeErrorResponse};
use async_trait::async_trait;
use pay_core::{
    CheckoutRequest, GatewaySession, PaymentGateway, ServiceError, ServiceResult,
};
use reqwest::{Client, RequestBuilder};
use tracing::{debug, error, info, instrument};

/// `cs_` followed by ASCII letters, digits or `_`
fn is_session_id(id: &str) -> bool {
    id.strip_prefix("cs_").is_some_and(|rest| {
        !rest.is_empty()
            && rest
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_')
    })
}

/// Stripe hosted-checkout client
///
/// Built once at startup and shared behind a `BoxedGateway`.
pub struct StripeGateway {
    config: StripeConfig,
    client: Client,
}

impl StripeGateway {
    /// Create a gateway; the HTTP client carries the configured per-call timeout
    pub fn new(config: StripeConfig) -> ServiceResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                ServiceError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { config, client })
    }

    fn sessions_url(&self) -> String {
        format!("{}/v1/checkout/sessions", self.config.api_base_url)
    }

    fn form_params(request: &CheckoutRequest) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = vec![
            ("mode".to_string(), request.mode.as_str().to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
            ("line_items[0][price]".to_string(), request.price_id.clone()),
            (
                "line_items[0][quantity]".to_string(),
                request.quantity.to_string(),
            ),
            (
                "client_reference_id".to_string(),
                request.subject_id.clone(),
            ),
            ("metadata[user_id]".to_string(), request.subject_id.clone()),
        ];

        if let Some(ref email) = request.customer_email {
            params.push(("customer_email".to_string(), email.clone()));
        }
        if let Some(ref name) = request.customer_name {
            params.push(("metadata[customer_name]".to_string(), name.clone()));
        }

        // Carried onto the subscription so its webhooks can find the owner
        if request.mode == pay_core::CheckoutMode::Subscription {
            params.push((
                "subscription_data[metadata][user_id]".to_string(),
                request.subject_id.clone(),
            ));
        }

        params
    }

    /// Send a request and parse a checkout session out of the response
    async fn send(&self, builder: RequestBuilder) -> ServiceResult<CheckoutSessionObject> {
        let response = builder
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .send()
            .await
            .map_err(|e| ServiceError::gateway(format!("request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ServiceError::gateway(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            error!("Stripe API error: status={}, body={}", status, body);

            if let Ok(error_response) = serde_json::from_str::<StripeErrorResponse>(&body) {
                debug!(
                    "Stripe error details: type={:?}, code={:?}",
                    error_response.error.error_type, error_response.error.code
                );
                return Err(ServiceError::gateway(error_response.error.message));
            }

            return Err(ServiceError::gateway(format!("HTTP {}: {}", status, body)));
        }

        serde_json::from_str(&body).map_err(|e| {
            ServiceError::gateway(format!("Failed to parse Stripe response: {}", e))
        })
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self, request), fields(subject = %request.subject_id, mode = request.mode.as_str()))]
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> ServiceResult<GatewaySession> {
        debug!("Creating Stripe checkout session: price={}", request.price_id);

        let builder = self
            .client
            .post(self.sessions_url())
            .header("Idempotency-Key", &request.idempotency_key)
            .form(&Self::form_params(request));

        let session = self.send(builder).await?;
        info!(
            "Created Stripe checkout session: id={}, url={:?}",
            session.id, session.url
        );

        Ok(session.into_gateway_session())
    }

    #[instrument(skip(self))]
    async fn retrieve_checkout_session(&self, session_id: &str) -> ServiceResult<GatewaySession> {
        // The id becomes a path segment of an authenticated request
        if !is_session_id(session_id) {
            return Err(ServiceError::Validation(
                "session_id is not a checkout session ID".to_string(),
            ));
        }

        let url = format!("{}/{}", self.sessions_url(), session_id);
        let session = self.send(self.client.get(url)).await?;
        debug!("Retrieved Stripe checkout session: id={}", session.id);

        Ok(session.into_gateway_session())
    }

    fn provider_name(&self) -> &'static str {
        "stripe"
    }
}
