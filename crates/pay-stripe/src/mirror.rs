//! Webhook handler that keeps the local mirror records in step with Stripe.

use crate::objects::{timestamp, CheckoutSessionObject, InvoiceObject, SubscriptionObject};
use crate::webhook::WebhookHandler;
use async_trait::async_trait;
use chrono::Utc;
use pay_core::{
    Payment, PaymentStatus, ServiceResult, SessionStatus, SharedStore, Subscription,
    SubscriptionStatus, WebhookEvent,
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

pub struct StoreWebhookHandler {
    store: SharedStore,
}

impl StoreWebhookHandler {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    fn apply(record: &mut Subscription, object: &SubscriptionObject) {
        record.customer_id = object.customer.id().to_string();
        record.status = SubscriptionStatus::parse(&object.status);
        if let Some(price_id) = object.price_id() {
            record.price_id = Some(price_id);
        }
        if record.user_id.is_none() {
            record.user_id = object.user_id();
        }
        record.current_period_start = object.period_start().or(record.current_period_start);
        record.current_period_end = object.period_end().or(record.current_period_end);
        record.cancel_at = timestamp(object.cancel_at);
        record.canceled_at = timestamp(object.canceled_at).or(record.canceled_at);
        record.updated_at = Utc::now();
    }

    /// Update the mirrored subscription, creating it if it was never seen
    async fn upsert_subscription(&self, object: &SubscriptionObject) -> ServiceResult<Subscription> {
        match self.store.get_subscription(&object.id).await? {
            Some(mut record) => {
                Self::apply(&mut record, object);
                self.store.update_subscription(record.clone()).await?;
                debug!("Updated subscription mirror: {}", object.id);
                Ok(record)
            }
            None => {
                let now = Utc::now();
                let mut record = Subscription {
                    id: Uuid::new_v4().to_string(),
                    user_id: None,
                    customer_id: object.customer.id().to_string(),
                    subscription_id: object.id.clone(),
                    price_id: None,
                    status: SubscriptionStatus::Incomplete,
                    current_period_start: None,
                    current_period_end: None,
                    cancel_at: None,
                    canceled_at: None,
                    created_at: timestamp(object.created).unwrap_or(now),
                    updated_at: now,
                };
                Self::apply(&mut record, object);
                self.store.create_subscription(record.clone()).await?;
                debug!("Created subscription mirror: {}", object.id);
                Ok(record)
            }
        }
    }
}

#[async_trait]
impl WebhookHandler for StoreWebhookHandler {
    #[instrument(skip_all, fields(session_id = %session.id))]
    async fn on_checkout_session_completed(
        &self,
        _event: &WebhookEvent,
        session: CheckoutSessionObject,
    ) -> ServiceResult<()> {
        let local = self.store.get_session(&session.id).await?;
        if local.is_some() {
            self.store
                .update_session_status(&session.id, SessionStatus::Complete)
                .await?;
        } else {
            warn!("Completed session was never mirrored locally: {}", session.id);
        }

        if self.store.get_payment_by_session(&session.id).await?.is_some() {
            debug!("Payment already recorded for session: {}", session.id);
            return Ok(());
        }

        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            user_id: session
                .client_reference_id
                .clone()
                .or_else(|| local.map(|s| s.user_id)),
            amount: session.amount_total.unwrap_or(0),
            currency: session.currency.clone().unwrap_or_else(|| "usd".to_string()),
            status: PaymentStatus::Completed,
            payment_intent_id: session.payment_intent_id(),
            customer_id: session.customer_id(),
            created_at: Utc::now(),
            session_id: session.id,
        };

        info!(
            "Recorded payment: session={}, amount={} {}",
            payment.session_id, payment.amount, payment.currency
        );
        self.store.create_payment(payment).await
    }

    async fn on_subscription_created(
        &self,
        _event: &WebhookEvent,
        subscription: SubscriptionObject,
    ) -> ServiceResult<()> {
        let record = self.upsert_subscription(&subscription).await?;
        info!(
            "Subscription created: {} status={:?}",
            record.subscription_id, record.status
        );
        Ok(())
    }

    async fn on_subscription_updated(
        &self,
        _event: &WebhookEvent,
        subscription: SubscriptionObject,
    ) -> ServiceResult<()> {
        let record = self.upsert_subscription(&subscription).await?;
        info!(
            "Subscription updated: {} status={:?}",
            record.subscription_id, record.status
        );
        Ok(())
    }

    async fn on_subscription_deleted(
        &self,
        _event: &WebhookEvent,
        mut subscription: SubscriptionObject,
    ) -> ServiceResult<()> {
        subscription.status = "canceled".to_string();
        if subscription.canceled_at.is_none() {
            subscription.canceled_at = Some(Utc::now().timestamp());
        }
        let record = self.upsert_subscription(&subscription).await?;
        info!("Subscription canceled: {}", record.subscription_id);
        Ok(())
    }

    async fn on_invoice_paid(
        &self,
        _event: &WebhookEvent,
        invoice: InvoiceObject,
    ) -> ServiceResult<()> {
        // TODO: persist invoice payments once a ledger table exists
        info!(
            "Invoice paid: {} subscription={:?} amount={:?} {:?}",
            invoice.id,
            invoice.subscription_id(),
            invoice.amount_paid,
            invoice.currency
        );
        Ok(())
    }

    async fn on_invoice_payment_failed(
        &self,
        _event: &WebhookEvent,
        invoice: InvoiceObject,
    ) -> ServiceResult<()> {
        warn!(
            "Invoice payment failed: {} subscription={:?} attempt={:?}",
            invoice.id,
            invoice.subscription_id(),
            invoice.attempt_count
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhook::{parse_event, WebhookProcessor, WebhookVerifier};
    use chrono::Duration;
    use pay_core::{CheckoutMode, CheckoutSessionRecord, MemoryStore, Store};
    use serde_json::json;
    use std::sync::Arc;

    struct Fixture {
        store: Arc<MemoryStore>,
        processor: WebhookProcessor,
        verifier: WebhookVerifier,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let verifier = WebhookVerifier::new("whsec_test", 300);
        let processor = WebhookProcessor::new(
            verifier.clone(),
            Arc::new(StoreWebhookHandler::new(store.clone())),
            store.clone(),
        );
        Fixture {
            store,
            processor,
            verifier,
        }
    }

    impl Fixture {
        async fn deliver(&self, id: &str, event_type: &str, object: serde_json::Value) {
            let payload = serde_json::to_vec(&json!({
                "id": id,
                "type": event_type,
                "created": Utc::now().timestamp(),
                "data": { "object": object }
            }))
            .unwrap();
            let header = self.verifier.sign(&payload, Utc::now().timestamp()).unwrap();
            self.processor.process(&payload, Some(&header)).await.unwrap();
        }
    }

    fn session_record(id: &str) -> CheckoutSessionRecord {
        CheckoutSessionRecord {
            id: id.to_string(),
            user_id: "user_1".to_string(),
            price_id: "price_123".to_string(),
            status: SessionStatus::Open,
            mode: CheckoutMode::Payment,
            created_at: Utc::now(),
            expires_at: Some(Utc::now() + Duration::hours(24)),
            success_url: "https://example.com/success".to_string(),
            cancel_url: "https://example.com/cancel".to_string(),
            customer_name: None,
            customer_email: None,
        }
    }

    fn subscription_object(status: &str) -> serde_json::Value {
        json!({
            "id": "sub_1",
            "customer": "cus_1",
            "status": status,
            "items": { "data": [{ "price": { "id": "price_123" } }] },
            "current_period_start": 1700000000,
            "current_period_end": 1702592000,
            "metadata": { "user_id": "user_1" }
        })
    }

    #[tokio::test]
    async fn test_checkout_completed_records_one_payment() {
        let fx = fixture();
        fx.store.create_session(session_record("cs_test_1")).await.unwrap();

        let object = json!({
            "id": "cs_test_1",
            "status": "complete",
            "amount_total": 2000,
            "currency": "usd",
            "client_reference_id": "user_1",
            "payment_intent": "pi_1"
        });
        fx.deliver("evt_1", "checkout.session.completed", object.clone())
            .await;
        // Redelivery under the same event ID
        fx.deliver("evt_1", "checkout.session.completed", object.clone())
            .await;
        // Same session under a new event ID
        fx.deliver("evt_2", "checkout.session.completed", object).await;

        assert_eq!(fx.store.payment_count().await, 1);
        let payment = fx
            .store
            .get_payment_by_session("cs_test_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.amount, 2000);
        assert_eq!(payment.currency, "usd");
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(payment.user_id.as_deref(), Some("user_1"));
        assert_eq!(payment.payment_intent_id.as_deref(), Some("pi_1"));

        let session = fx.store.get_session("cs_test_1").await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Complete);
    }

    #[tokio::test]
    async fn test_unmirrored_session_still_records_payment() {
        let fx = fixture();
        fx.deliver(
            "evt_1",
            "checkout.session.completed",
            json!({ "id": "cs_guest", "amount_total": 500, "currency": "eur" }),
        )
        .await;

        let payment = fx
            .store
            .get_payment_by_session("cs_guest")
            .await
            .unwrap()
            .unwrap();
        assert!(payment.user_id.is_none());
        assert_eq!(payment.currency, "eur");
    }

    #[tokio::test]
    async fn test_subscription_lifecycle() {
        let fx = fixture();

        fx.deliver("evt_1", "customer.subscription.created", subscription_object("incomplete"))
            .await;
        let sub = fx.store.get_subscription("sub_1").await.unwrap().unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Incomplete);
        assert_eq!(sub.user_id.as_deref(), Some("user_1"));
        assert_eq!(sub.price_id.as_deref(), Some("price_123"));

        fx.deliver("evt_2", "customer.subscription.updated", subscription_object("active"))
            .await;
        let sub = fx.store.get_subscription("sub_1").await.unwrap().unwrap();
        assert!(sub.status.is_active());
        assert_eq!(sub.current_period_end.unwrap().timestamp(), 1702592000);

        fx.deliver("evt_3", "customer.subscription.deleted", subscription_object("active"))
            .await;
        let sub = fx.store.get_subscription("sub_1").await.unwrap().unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Canceled);
        assert!(sub.canceled_at.is_some());

        assert_eq!(fx.store.subscription_count().await, 1);
    }

    #[tokio::test]
    async fn test_update_before_create_upserts() {
        let fx = fixture();
        fx.deliver("evt_1", "customer.subscription.updated", subscription_object("active"))
            .await;
        assert_eq!(fx.store.subscription_count().await, 1);
        let found = fx.store.get_subscription_for_user("user_1").await.unwrap();
        assert_eq!(found.unwrap().subscription_id, "sub_1");
    }

    #[tokio::test]
    async fn test_invoice_events_do_not_mutate() {
        let fx = fixture();
        let handler = StoreWebhookHandler::new(fx.store.clone());
        let payload = serde_json::to_vec(&json!({
            "id": "evt_1",
            "type": "invoice.payment_failed",
            "created": 1700000000,
            "data": { "object": { "id": "in_1", "subscription": "sub_1", "attempt_count": 2 } }
        }))
        .unwrap();
        let event = parse_event(&payload).unwrap();
        crate::webhook::dispatch_webhook_event(&handler, &event)
            .await
            .unwrap();

        assert_eq!(fx.store.payment_count().await, 0);
        assert_eq!(fx.store.subscription_count().await, 0);
    }
}
