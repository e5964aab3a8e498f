use crate::error::ApiResult;
use crate::state::AppState;
use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use serde_json::{json, Value};
use tracing::instrument;

/// Stripe webhook endpoint. The raw body is needed for signature checks.
#[instrument(skip_all)]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok());

    let outcome = state.webhooks.process(&body, signature).await?;
    tracing::debug!("Webhook outcome: {:?}", outcome);

    Ok(Json(json!({ "received": true })))
}
