//! # Application State
//!
//! Shared state for the Axum application.
//! Everything is built once at startup and injected; handlers never read
//! the environment.

use crate::config::AppConfig;
use pay_auth::{AuthService, JwtService};
use pay_core::{BoxedGateway, CheckoutService, MemoryStore, ServiceResult, SharedStore};
use pay_stripe::{StoreWebhookHandler, StripeGateway, WebhookProcessor, WebhookVerifier};
use std::sync::Arc;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub auth: AuthService,
    pub checkout: CheckoutService,
    pub webhooks: WebhookProcessor,
}

impl AppState {
    /// Wire services around an explicit store and gateway
    pub fn new(config: AppConfig, store: SharedStore, gateway: BoxedGateway) -> ServiceResult<Self> {
        let jwt = JwtService::new(
            &config.auth.jwt_secret,
            config.auth.jwt_expiry_hours,
            config.auth.refresh_enabled,
        )?;
        let auth = AuthService::new(store.clone(), jwt);
        let checkout = CheckoutService::new(gateway, store.clone());
        let webhooks = WebhookProcessor::new(
            WebhookVerifier::from_config(&config.stripe),
            Arc::new(StoreWebhookHandler::new(store.clone())),
            store.clone(),
        );

        Ok(Self {
            store,
            auth,
            checkout,
            webhooks,
        })
    }

    /// Production wiring: Stripe gateway and the in-memory store
    pub fn from_config(config: AppConfig) -> ServiceResult<Self> {
        let gateway = StripeGateway::new(config.stripe.clone())?;
        info!(
            "Stripe gateway ready: test_mode={}, base_url={}",
            config.stripe.is_test_mode(),
            config.stripe.api_base_url
        );
        Self::new(config, Arc::new(MemoryStore::new()), Arc::new(gateway))
    }
}
