//! Checkout and payment history handlers under `/api/v1`.

use super::ApiJson;
use crate::error::ApiResult;
use crate::middleware::AuthSubject;
use crate::state::AppState;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use pay_core::{CheckoutCreated, CreateCheckout, GatewaySession, Payment, ServiceError, Subscription};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub status: &'static str,
    pub session: GatewaySession,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentList {
    pub payments: Vec<Payment>,
    pub count: usize,
}

/// Create a hosted checkout session for the authenticated subject
#[instrument(skip(state, request), fields(subject = %subject.id()))]
pub async fn create_checkout(
    State(state): State<AppState>,
    subject: AuthSubject,
    ApiJson(request): ApiJson<CreateCheckout>,
) -> ApiResult<Json<CheckoutCreated>> {
    let created = state.checkout.create_checkout(subject.id(), request).await?;
    Ok(Json(created))
}

/// Success redirect target; reports the gateway's view of the session
#[instrument(skip(state, query), fields(subject = %subject.id()))]
pub async fn checkout_success(
    State(state): State<AppState>,
    subject: AuthSubject,
    query: Result<Query<SessionQuery>, QueryRejection>,
) -> ApiResult<Json<SuccessResponse>> {
    let Query(query) = query?;
    let session_id = query
        .session_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ServiceError::Validation("session_id is required".to_string()))?;

    let session = state
        .checkout
        .retrieve_session(subject.id(), &session_id)
        .await?;

    Ok(Json(SuccessResponse {
        status: "success",
        session,
    }))
}

/// Cancel redirect target
pub async fn checkout_cancel(
    subject: AuthSubject,
    query: Result<Query<SessionQuery>, QueryRejection>,
) -> ApiResult<Json<CancelResponse>> {
    let Query(query) = query?;
    info!(
        "Checkout canceled: subject={}, session={:?}",
        subject.id(),
        query.session_id
    );
    Ok(Json(CancelResponse {
        status: "canceled",
        session_id: query.session_id,
    }))
}

pub async fn list_payments(
    State(state): State<AppState>,
    subject: AuthSubject,
) -> ApiResult<Json<PaymentList>> {
    let payments = state.store.list_payments_for_user(subject.id()).await?;
    Ok(Json(PaymentList {
        count: payments.len(),
        payments,
    }))
}

pub async fn get_subscription(
    State(state): State<AppState>,
    subject: AuthSubject,
) -> ApiResult<Json<Subscription>> {
    state
        .store
        .get_subscription_for_user(subject.id())
        .await?
        .map(Json)
        .ok_or_else(|| ServiceError::not_found("subscription", subject.id()).into())
}
