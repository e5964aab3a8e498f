//! # In-Memory Store
//!
//! `HashMap`-backed `Store` for development and tests.
//! All tables sit behind one `tokio::sync::RwLock`, so each write is atomic
//! with respect to every other operation. Data is lost when the store is dropped.

use crate::error::{AuthError, ServiceError, ServiceResult};
use crate::model::{
    CheckoutSessionRecord, PasswordResetToken, Payment, SessionStatus, Subscription, User,
};
use crate::store::Store;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<String, User>,
    /// lowercase email -> user id
    emails: HashMap<String, String>,
    reset_tokens: HashMap<String, PasswordResetToken>,
    sessions: HashMap<String, CheckoutSessionRecord>,
    payments: Vec<Payment>,
    /// gateway subscription id -> record
    subscriptions: HashMap<String, Subscription>,
    processed_events: HashSet<String>,
}

fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

/// In-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of payment records (for testing)
    pub async fn payment_count(&self) -> usize {
        self.tables.read().await.payments.len()
    }

    /// Number of subscription records (for testing)
    pub async fn subscription_count(&self) -> usize {
        self.tables.read().await.subscriptions.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: User) -> ServiceResult<()> {
        let mut tables = self.tables.write().await;
        let key = email_key(&user.email);
        if tables.emails.contains_key(&key) {
            return Err(ServiceError::Conflict(format!(
                "user with email {} already exists",
                user.email
            )));
        }
        if tables.users.contains_key(&user.id) {
            return Err(ServiceError::Conflict(format!(
                "user id {} already exists",
                user.id
            )));
        }
        tables.emails.insert(key, user.id.clone());
        tables.users.insert(user.id.clone(), user);
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> ServiceResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .emails
            .get(&email_key(email))
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn find_user_by_id(&self, id: &str) -> ServiceResult<Option<User>> {
        Ok(self.tables.read().await.users.get(id).cloned())
    }

    async fn update_user(&self, user: User) -> ServiceResult<()> {
        let mut tables = self.tables.write().await;
        let previous_email = match tables.users.get(&user.id) {
            Some(existing) => email_key(&existing.email),
            None => return Err(ServiceError::not_found("user", user.id)),
        };

        let new_email = email_key(&user.email);
        if new_email != previous_email {
            if tables.emails.contains_key(&new_email) {
                return Err(ServiceError::Conflict(format!(
                    "user with email {} already exists",
                    user.email
                )));
            }
            tables.emails.remove(&previous_email);
            tables.emails.insert(new_email, user.id.clone());
        }

        tables.users.insert(user.id.clone(), user);
        Ok(())
    }

    async fn save_reset_token(&self, token: PasswordResetToken) -> ServiceResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&token.user_id) {
            return Err(ServiceError::not_found("user", token.user_id));
        }
        tables.reset_tokens.insert(token.token.clone(), token);
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<String> {
        let mut tables = self.tables.write().await;
        let record = tables
            .reset_tokens
            .get_mut(token)
            .ok_or(AuthError::InvalidResetToken)?;

        if !record.is_usable(now) {
            return Err(AuthError::InvalidResetToken.into());
        }

        record.used = true;
        Ok(record.user_id.clone())
    }

    async fn create_session(&self, session: CheckoutSessionRecord) -> ServiceResult<()> {
        let mut tables = self.tables.write().await;
        if tables.sessions.contains_key(&session.id) {
            return Err(ServiceError::Conflict(format!(
                "session {} already exists",
                session.id
            )));
        }
        tables.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get_session(&self, id: &str) -> ServiceResult<Option<CheckoutSessionRecord>> {
        Ok(self.tables.read().await.sessions.get(id).cloned())
    }

    async fn update_session_status(&self, id: &str, status: SessionStatus) -> ServiceResult<()> {
        let mut tables = self.tables.write().await;
        let session = tables
            .sessions
            .get_mut(id)
            .ok_or_else(|| ServiceError::not_found("session", id))?;
        session.status = status;
        Ok(())
    }

    async fn create_payment(&self, payment: Payment) -> ServiceResult<()> {
        self.tables.write().await.payments.push(payment);
        Ok(())
    }

    async fn get_payment_by_session(&self, session_id: &str) -> ServiceResult<Option<Payment>> {
        Ok(self
            .tables
            .read()
            .await
            .payments
            .iter()
            .find(|p| p.session_id == session_id)
            .cloned())
    }

    async fn list_payments_for_user(&self, user_id: &str) -> ServiceResult<Vec<Payment>> {
        Ok(self
            .tables
            .read()
            .await
            .payments
            .iter()
            .filter(|p| p.user_id.as_deref() == Some(user_id))
            .cloned()
            .collect())
    }

    async fn create_subscription(&self, subscription: Subscription) -> ServiceResult<()> {
        let mut tables = self.tables.write().await;
        if tables
            .subscriptions
            .contains_key(&subscription.subscription_id)
        {
            return Err(ServiceError::Conflict(format!(
                "subscription {} already exists",
                subscription.subscription_id
            )));
        }
        tables
            .subscriptions
            .insert(subscription.subscription_id.clone(), subscription);
        Ok(())
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> ServiceResult<Option<Subscription>> {
        Ok(self
            .tables
            .read()
            .await
            .subscriptions
            .get(subscription_id)
            .cloned())
    }

    async fn get_subscription_for_user(
        &self,
        user_id: &str,
    ) -> ServiceResult<Option<Subscription>> {
        Ok(self
            .tables
            .read()
            .await
            .subscriptions
            .values()
            .filter(|s| s.user_id.as_deref() == Some(user_id))
            .max_by_key(|s| s.updated_at)
            .cloned())
    }

    async fn update_subscription(&self, subscription: Subscription) -> ServiceResult<()> {
        let mut tables = self.tables.write().await;
        match tables.subscriptions.get_mut(&subscription.subscription_id) {
            Some(existing) => {
                *existing = subscription;
                Ok(())
            }
            None => Err(ServiceError::not_found(
                "subscription",
                subscription.subscription_id,
            )),
        }
    }

    async fn has_processed_event(&self, event_id: &str) -> ServiceResult<bool> {
        Ok(self
            .tables
            .read()
            .await
            .processed_events
            .contains(event_id))
    }

    async fn record_processed_event(&self, event_id: &str) -> ServiceResult<bool> {
        Ok(self
            .tables
            .write()
            .await
            .processed_events
            .insert(event_id.to_string()))
    }
}
