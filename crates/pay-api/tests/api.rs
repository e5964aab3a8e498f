use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, HeaderName, HeaderValue, StatusCode};
use axum_test::{TestResponse, TestServer};
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use pay_api::{create_router, AppConfig, AppState};
use pay_core::{
    CheckoutRequest, GatewaySession, MemoryStore, PaymentGateway, ServiceError, ServiceResult,
    SessionStatus, Store,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const JWT_SECRET: &str = "integration-secret";

/// Gateway double that hands out predictable hosted-checkout sessions
#[derive(Default)]
struct MockGateway {
    sessions: Mutex<HashMap<String, GatewaySession>>,
}

impl MockGateway {
    fn created(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> ServiceResult<GatewaySession> {
        let mut sessions = self.sessions.lock().unwrap();
        let id = format!("cs_mock_{}", sessions.len() + 1);
        let session = GatewaySession {
            url: Some(format!("https://checkout.stripe.com/c/pay/{id}")),
            status: SessionStatus::Open,
            mode: request.mode,
            payment_status: Some("unpaid".to_string()),
            amount_total: Some(2000),
            currency: Some("usd".to_string()),
            client_reference_id: Some(request.subject_id.clone()),
            customer_id: None,
            customer_email: request.customer_email.clone(),
            payment_intent_id: None,
            created_at: Utc::now(),
            expires_at: None,
            id: id.clone(),
        };
        sessions.insert(id, session.clone());
        Ok(session)
    }

    async fn retrieve_checkout_session(&self, session_id: &str) -> ServiceResult<GatewaySession> {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found("session", session_id))
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

struct TestApp {
    server: TestServer,
    state: AppState,
    store: Arc<MemoryStore>,
    gateway: Arc<MockGateway>,
}

fn config(refresh_enabled: bool) -> AppConfig {
    let pairs = [
        ("SERVER_MODE", "test"),
        ("JWT_SECRET", JWT_SECRET),
        ("JWT_REFRESH_ENABLED", if refresh_enabled { "true" } else { "false" }),
        ("STRIPE_SECRET_KEY", "sk_test_abc123"),
        ("STRIPE_PUBLISHABLE_KEY", "pk_test_xyz789"),
        ("STRIPE_WEBHOOK_SECRET", "whsec_integration"),
    ];
    AppConfig::from_lookup(move |key| {
        pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string())
    })
    .unwrap()
}

fn app_with(refresh_enabled: bool) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(MockGateway::default());
    let state = AppState::new(config(refresh_enabled), store.clone(), gateway.clone()).unwrap();
    let server = TestServer::new(create_router(state.clone())).unwrap();
    TestApp {
        server,
        state,
        store,
        gateway,
    }
}

fn app() -> TestApp {
    app_with(true)
}

fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {token}")).unwrap()
}

fn stripe_signature() -> HeaderName {
    HeaderName::from_static("stripe-signature")
}

async fn assert_error(response: TestResponse, status: StatusCode, code: &str) {
    assert_eq!(response.status_code(), status);
    let body: Value = response.json();
    assert_eq!(body["code"], code);
    assert!(body["error"].is_string());
}

impl TestApp {
    /// Register and log in; returns (user id, access token)
    async fn login(&self, email: &str) -> (String, String) {
        let response = self
            .server
            .post("/v1/auth/register")
            .json(&json!({
                "email": email,
                "password": "analytical",
                "first_name": "Ada",
                "last_name": "Lovelace"
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        let user_id = response.json::<Value>()["id"].as_str().unwrap().to_string();

        let response = self
            .server
            .post("/v1/auth/login")
            .json(&json!({ "email": email, "password": "analytical" }))
            .await;
        response.assert_status_ok();
        let token = response.json::<Value>()["access_token"]
            .as_str()
            .unwrap()
            .to_string();

        (user_id, token)
    }

    fn webhook_payload(&self, event_id: &str, event_type: &str, object: Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": event_id,
            "object": "event",
            "type": event_type,
            "created": Utc::now().timestamp(),
            "data": { "object": object }
        }))
        .unwrap()
    }

    async fn deliver(&self, payload: Vec<u8>) -> TestResponse {
        let signature = self
            .state
            .webhooks
            .verifier()
            .sign(&payload, Utc::now().timestamp())
            .unwrap();
        self.server
            .post("/webhooks/stripe")
            .add_header(stripe_signature(), HeaderValue::from_str(&signature).unwrap())
            .bytes(payload.into())
            .await
    }
}

#[tokio::test]
async fn health_is_always_ok() {
    let app = app();
    let response = app.server.get("/v1/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "checkout-relay");
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let app = app();
    let response = app.server.get("/v1/nowhere").await;
    assert_error(response, StatusCode::NOT_FOUND, "NOT_FOUND").await;
}

#[tokio::test]
async fn register_login_and_profile() {
    let app = app();
    let (user_id, token) = app.login("ada@example.com").await;

    let response = app
        .server
        .get("/api/v1/user/profile")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    let profile: Value = response.json();
    assert_eq!(profile["id"], user_id.as_str());
    assert_eq!(profile["email"], "ada@example.com");
    assert!(profile.get("password_hash").is_none());

    let response = app
        .server
        .put("/api/v1/user/profile")
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({ "first_name": "Augusta", "last_name": "King" }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["first_name"], "Augusta");
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let app = app();
    app.login("ada@example.com").await;

    let response = app
        .server
        .post("/v1/auth/register")
        .json(&json!({
            "email": "ADA@example.com",
            "password": "analytical",
            "first_name": "Ada",
            "last_name": "L"
        }))
        .await;
    assert_error(response, StatusCode::CONFLICT, "CONFLICT").await;
}

#[tokio::test]
async fn bad_credentials_are_rejected() {
    let app = app();
    app.login("ada@example.com").await;

    let response = app
        .server
        .post("/v1/auth/login")
        .json(&json!({ "email": "ada@example.com", "password": "wrong-password" }))
        .await;
    assert_error(response, StatusCode::UNAUTHORIZED, "AUTH_ERROR").await;
}

#[tokio::test]
async fn protected_routes_reject_bad_tokens() {
    let app = app();

    let response = app.server.get("/api/v1/payments").await;
    assert_error(response, StatusCode::UNAUTHORIZED, "AUTH_ERROR").await;

    let response = app
        .server
        .get("/api/v1/payments")
        .add_header(AUTHORIZATION, HeaderValue::from_static("Basic abc"))
        .await;
    assert_error(response, StatusCode::UNAUTHORIZED, "AUTH_ERROR").await;

    let forged = encode(
        &Header::new(Algorithm::HS256),
        &json!({ "user_id": "user_1" }),
        &EncodingKey::from_secret(b"some-other-secret"),
    )
    .unwrap();
    let response = app
        .server
        .get("/api/v1/payments")
        .add_header(AUTHORIZATION, bearer(&forged))
        .await;
    assert_error(response, StatusCode::UNAUTHORIZED, "AUTH_ERROR").await;

    // {"alg":"RS256","typ":"JWT"} . {"user_id":"user_123"} . junk
    let rs256 = "eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCJ9.eyJ1c2VyX2lkIjoidXNlcl8xMjMifQ.c2ln";
    let response = app
        .server
        .get("/api/v1/payments")
        .add_header(AUTHORIZATION, bearer(rs256))
        .await;
    assert_error(response, StatusCode::UNAUTHORIZED, "AUTH_ERROR").await;
}

#[tokio::test]
async fn any_hmac_token_with_subject_is_accepted() {
    let app = app();
    let token = encode(
        &Header::new(Algorithm::HS512),
        &json!({ "user_id": "user_external" }),
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap();

    let response = app
        .server
        .get("/api/v1/payments")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["count"], 0);
}

#[tokio::test]
async fn create_checkout_returns_hosted_url() {
    let app = app();
    let (user_id, token) = app.login("ada@example.com").await;

    let response = app
        .server
        .post("/api/v1/payments/create-checkout")
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({
            "price_id": "price_123",
            "success_url": "https://example.com/success",
            "cancel_url": "https://example.com/cancel"
        }))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    let session_id = body["session_id"].as_str().unwrap();
    assert!(body["checkout_url"]
        .as_str()
        .unwrap()
        .starts_with("https://checkout.stripe.com/"));

    let record = app.store.get_session(session_id).await.unwrap().unwrap();
    assert_eq!(record.user_id, user_id);
    assert_eq!(record.price_id, "price_123");
    assert_eq!(record.status, SessionStatus::Open);
}

#[tokio::test]
async fn create_checkout_validates_input() {
    let app = app();
    let (_, token) = app.login("ada@example.com").await;

    let response = app
        .server
        .post("/api/v1/payments/create-checkout")
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({
            "success_url": "https://example.com/success",
            "cancel_url": "https://example.com/cancel"
        }))
        .await;
    assert_error(response, StatusCode::BAD_REQUEST, "VALIDATION_ERROR").await;

    let response = app
        .server
        .post("/api/v1/payments/create-checkout")
        .add_header(AUTHORIZATION, bearer(&token))
        .content_type("application/json")
        .text("{not json")
        .await;
    assert_error(response, StatusCode::BAD_REQUEST, "VALIDATION_ERROR").await;

    assert_eq!(app.gateway.created(), 0);
}

#[tokio::test]
async fn success_and_cancel_pages() {
    let app = app();
    let (_, token) = app.login("ada@example.com").await;

    let response = app
        .server
        .post("/api/v1/payments/create-checkout")
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({
            "price_id": "price_123",
            "success_url": "https://example.com/success",
            "cancel_url": "https://example.com/cancel"
        }))
        .await;
    let session_id = response.json::<Value>()["session_id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .server
        .get("/api/v1/payments/success")
        .add_query_param("session_id", &session_id)
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "success");
    assert_eq!(body["session"]["id"], session_id.as_str());

    let response = app
        .server
        .get("/api/v1/payments/success")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    assert_error(response, StatusCode::BAD_REQUEST, "VALIDATION_ERROR").await;

    // Another user cannot read this session
    let (_, other) = app.login("grace@example.com").await;
    let response = app
        .server
        .get("/api/v1/payments/success")
        .add_query_param("session_id", &session_id)
        .add_header(AUTHORIZATION, bearer(&other))
        .await;
    assert_error(response, StatusCode::NOT_FOUND, "NOT_FOUND").await;

    let response = app
        .server
        .get("/api/v1/payments/cancel")
        .add_query_param("session_id", &session_id)
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "canceled");
}

#[tokio::test]
async fn success_page_hides_sessions_without_owner() {
    let app = app();
    let (_, token) = app.login("ada@example.com").await;

    // Exists at the gateway, carries no reference and was never mirrored
    app.gateway.sessions.lock().unwrap().insert(
        "cs_foreign_1".to_string(),
        GatewaySession {
            id: "cs_foreign_1".to_string(),
            url: None,
            status: SessionStatus::Complete,
            mode: Default::default(),
            payment_status: Some("paid".to_string()),
            amount_total: Some(9900),
            currency: Some("usd".to_string()),
            client_reference_id: None,
            customer_id: Some("cus_victim".to_string()),
            customer_email: Some("victim@example.com".to_string()),
            payment_intent_id: None,
            created_at: Utc::now(),
            expires_at: None,
        },
    );

    let response = app
        .server
        .get("/api/v1/payments/success")
        .add_query_param("session_id", "cs_foreign_1")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    assert_error(response, StatusCode::NOT_FOUND, "NOT_FOUND").await;

    let response = app
        .server
        .get("/api/v1/payments/success")
        .add_query_param("session_id", "../../customers/cus_victim")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    assert_error(response, StatusCode::BAD_REQUEST, "VALIDATION_ERROR").await;
}

#[tokio::test]
async fn webhook_without_signature_is_rejected() {
    let app = app();
    let payload = app.webhook_payload(
        "evt_1",
        "checkout.session.completed",
        json!({ "id": "cs_mock_1", "amount_total": 2000, "currency": "usd" }),
    );

    let response = app
        .server
        .post("/webhooks/stripe")
        .bytes(payload.clone().into())
        .await;
    assert_error(response, StatusCode::BAD_REQUEST, "WEBHOOK_REJECTED").await;

    let response = app
        .server
        .post("/webhooks/stripe")
        .add_header(stripe_signature(), HeaderValue::from_static("t=1,v1=deadbeef"))
        .bytes(payload.into())
        .await;
    assert_error(response, StatusCode::BAD_REQUEST, "WEBHOOK_REJECTED").await;

    assert_eq!(app.store.payment_count().await, 0);
    assert!(!app.store.has_processed_event("evt_1").await.unwrap());
}

#[tokio::test]
async fn checkout_completed_webhook_records_one_payment() {
    let app = app();
    let (user_id, token) = app.login("ada@example.com").await;

    let response = app
        .server
        .post("/api/v1/payments/create-checkout")
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({
            "price_id": "price_123",
            "success_url": "https://example.com/success",
            "cancel_url": "https://example.com/cancel"
        }))
        .await;
    let session_id = response.json::<Value>()["session_id"]
        .as_str()
        .unwrap()
        .to_string();

    let payload = app.webhook_payload(
        "evt_completed",
        "checkout.session.completed",
        json!({
            "id": session_id,
            "status": "complete",
            "payment_status": "paid",
            "amount_total": 2000,
            "currency": "usd",
            "client_reference_id": user_id,
            "payment_intent": "pi_1"
        }),
    );

    let response = app.deliver(payload.clone()).await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>(), json!({ "received": true }));

    // Redelivery is acknowledged and changes nothing
    let response = app.deliver(payload).await;
    response.assert_status_ok();
    assert_eq!(app.store.payment_count().await, 1);

    let record = app.store.get_session(&session_id).await.unwrap().unwrap();
    assert_eq!(record.status, SessionStatus::Complete);

    let response = app
        .server
        .get("/api/v1/payments")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["count"], 1);
    assert_eq!(body["payments"][0]["amount"], 2000);
    assert_eq!(body["payments"][0]["currency"], "usd");
    assert_eq!(body["payments"][0]["status"], "completed");
}

#[tokio::test]
async fn unknown_webhook_event_is_acknowledged() {
    let app = app();
    let payload = app.webhook_payload("evt_x", "charge.dispute.created", json!({ "id": "dp_1" }));

    let response = app.deliver(payload).await;
    response.assert_status_ok();
    assert_eq!(app.store.payment_count().await, 0);
    assert_eq!(app.store.subscription_count().await, 0);
}

#[tokio::test]
async fn malformed_webhook_object_fails_for_retry() {
    let app = app();
    let payload = app.webhook_payload(
        "evt_bad",
        "customer.subscription.updated",
        json!({ "id": "sub_1" }),
    );

    let response = app.deliver(payload).await;
    assert_error(
        response,
        StatusCode::INTERNAL_SERVER_ERROR,
        "EVENT_HANDLER_FAILED",
    )
    .await;
    assert!(!app.store.has_processed_event("evt_bad").await.unwrap());
}

#[tokio::test]
async fn subscription_webhooks_feed_subscription_route() {
    let app = app();
    let (user_id, token) = app.login("ada@example.com").await;

    let response = app
        .server
        .get("/api/v1/subscription")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    assert_error(response, StatusCode::NOT_FOUND, "NOT_FOUND").await;

    let payload = app.webhook_payload(
        "evt_sub",
        "customer.subscription.created",
        json!({
            "id": "sub_1",
            "customer": "cus_1",
            "status": "active",
            "items": { "data": [{ "price": { "id": "price_monthly" } }] },
            "metadata": { "user_id": user_id }
        }),
    );
    app.deliver(payload).await.assert_status_ok();

    let response = app
        .server
        .get("/api/v1/subscription")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["subscription_id"], "sub_1");
    assert_eq!(body["status"], "active");
    assert_eq!(body["price_id"], "price_monthly");
}

#[tokio::test]
async fn password_reset_flow() {
    let app = app();
    app.login("ada@example.com").await;

    for email in ["ada@example.com", "nobody@example.com"] {
        let response = app
            .server
            .post("/v1/auth/forgot-password")
            .json(&json!({ "email": email }))
            .await;
        response.assert_status_ok();
    }

    let token = app
        .state
        .auth
        .request_password_reset("ada@example.com")
        .await
        .unwrap()
        .unwrap();

    let response = app
        .server
        .post("/v1/auth/reset-password")
        .json(&json!({ "token": token, "password": "difference" }))
        .await;
    response.assert_status_ok();

    let response = app
        .server
        .post("/v1/auth/login")
        .json(&json!({ "email": "ada@example.com", "password": "difference" }))
        .await;
    response.assert_status_ok();

    let response = app
        .server
        .post("/v1/auth/reset-password")
        .json(&json!({ "token": token, "password": "another-one" }))
        .await;
    assert_error(response, StatusCode::BAD_REQUEST, "AUTH_ERROR").await;
}

#[tokio::test]
async fn refresh_follows_config_flag() {
    let app = app();
    let (_, token) = app.login("ada@example.com").await;
    let response = app
        .server
        .post("/v1/auth/refresh")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    assert!(response.json::<Value>()["access_token"].is_string());

    let disabled = app_with(false);
    let (_, token) = disabled.login("ada@example.com").await;
    let response = disabled
        .server
        .post("/v1/auth/refresh")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    assert_error(response, StatusCode::NOT_FOUND, "NOT_FOUND").await;
}
