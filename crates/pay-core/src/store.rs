//! # Credential Store
//!
//! Capability trait over the persistence engine. Callers hold an
//! `Arc<dyn Store>` and never see the concrete backend.
//!
//! Every method is a single-entity operation and must be atomic on its own;
//! no handler needs multi-entity transactions.

use crate::error::ServiceResult;
use crate::model::{
    CheckoutSessionRecord, PasswordResetToken, Payment, SessionStatus, Subscription, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[async_trait]
pub trait Store: Send + Sync {
    // -- users ---------------------------------------------------------------

    /// Insert a user. Fails with `Conflict` if the email is taken.
    async fn create_user(&self, user: User) -> ServiceResult<()>;

    /// Case-insensitive email lookup
    async fn find_user_by_email(&self, email: &str) -> ServiceResult<Option<User>>;

    async fn find_user_by_id(&self, id: &str) -> ServiceResult<Option<User>>;

    /// Replace a stored user. Fails with `NotFound` or `Conflict` (email change).
    async fn update_user(&self, user: User) -> ServiceResult<()>;

    // -- password reset tokens -----------------------------------------------

    async fn save_reset_token(&self, token: PasswordResetToken) -> ServiceResult<()>;

    /// Mark a token used and return its user ID.
    ///
    /// Fails with `AuthError::InvalidResetToken` if the token is unknown,
    /// already used, or expired at `now`.
    async fn consume_reset_token(&self, token: &str, now: DateTime<Utc>)
        -> ServiceResult<String>;

    // -- checkout sessions ---------------------------------------------------

    async fn create_session(&self, session: CheckoutSessionRecord) -> ServiceResult<()>;

    async fn get_session(&self, id: &str) -> ServiceResult<Option<CheckoutSessionRecord>>;

    /// Fails with `NotFound` if the session was never mirrored
    async fn update_session_status(&self, id: &str, status: SessionStatus) -> ServiceResult<()>;

    // -- payments ------------------------------------------------------------

    async fn create_payment(&self, payment: Payment) -> ServiceResult<()>;

    async fn get_payment_by_session(&self, session_id: &str) -> ServiceResult<Option<Payment>>;

    /// Payments for a user, oldest first
    async fn list_payments_for_user(&self, user_id: &str) -> ServiceResult<Vec<Payment>>;

    // -- subscriptions -------------------------------------------------------

    /// Fails with `Conflict` if the gateway subscription ID is already mirrored
    async fn create_subscription(&self, subscription: Subscription) -> ServiceResult<()>;

    /// Lookup by gateway subscription ID
    async fn get_subscription(&self, subscription_id: &str)
        -> ServiceResult<Option<Subscription>>;

    /// Most recently updated subscription for a user
    async fn get_subscription_for_user(&self, user_id: &str)
        -> ServiceResult<Option<Subscription>>;

    /// Fails with `NotFound` if not mirrored yet
    async fn update_subscription(&self, subscription: Subscription) -> ServiceResult<()>;

    // -- processed webhook events --------------------------------------------

    async fn has_processed_event(&self, event_id: &str) -> ServiceResult<bool>;

    /// Record an event ID; returns false if it was already recorded
    async fn record_processed_event(&self, event_id: &str) -> ServiceResult<bool>;
}

/// Type alias for a shared store (dynamic dispatch)
pub type SharedStore = Arc<dyn Store>;
