//! # Service Error Types
//!
//! Typed error handling for checkout-relay.
//! All service operations return `Result<T, ServiceError>`; the HTTP layer
//! translates them to a status code and a stable error code in one place.

use thiserror::Error;

/// Bearer token and credential failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Header absent, or not exactly `Bearer <token>`
    #[error("Malformed Authorization header")]
    MalformedHeader,

    /// Token signed with an algorithm outside the HMAC allow-list
    #[error("Unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Required claim missing or not a string
    #[error("Missing or invalid claim: {0}")]
    MissingClaim(&'static str),

    /// Token expired
    #[error("Token expired")]
    TokenExpired,

    /// Signature or structure invalid
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Unknown email or wrong password
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Password reset token unknown, used, or expired
    #[error("Invalid or expired reset token")]
    InvalidResetToken,
}

/// Inbound webhook rejections (before any handler runs)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookError {
    /// Signature header absent
    #[error("Missing signature header")]
    MissingSignature,

    /// Signature mismatch, unparsable header, or stale timestamp
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// Verified payload is not a valid event envelope
    #[error("Malformed event payload: {0}")]
    MalformedPayload(String),
}

/// Core error type for all service operations
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed or missing input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing, invalid or expired credential
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Webhook rejected at verification or envelope parsing
    #[error("Webhook rejected: {0}")]
    Webhook(#[from] WebhookError),

    /// Uniqueness violation (e.g. email already registered)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Entity not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Payment gateway API failure (network or provider error)
    #[error("Gateway error [{provider}]: {message}")]
    Gateway { provider: String, message: String },

    /// Store write/read failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// An event handler failed; the gateway should redeliver
    #[error("Handler for {event_type} failed: {source}")]
    EventHandler {
        event_type: String,
        source: Box<ServiceError>,
    },

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Shorthand for `NotFound`
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Shorthand for a Stripe `Gateway` error
    pub fn gateway(message: impl Into<String>) -> Self {
        Self::Gateway {
            provider: "stripe".to_string(),
            message: message.into(),
        }
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::Validation(_) => 400,
            ServiceError::Webhook(_) => 400,
            ServiceError::Auth(AuthError::InvalidResetToken) => 400,
            ServiceError::Auth(_) => 401,
            ServiceError::NotFound { .. } => 404,
            ServiceError::Conflict(_) => 409,
            ServiceError::Gateway { .. } => 500,
            ServiceError::Persistence(_) => 500,
            ServiceError::EventHandler { .. } => 500,
            ServiceError::Configuration(_) => 500,
            ServiceError::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code sent to clients
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "VALIDATION_ERROR",
            ServiceError::Webhook(_) => "WEBHOOK_REJECTED",
            ServiceError::Auth(_) => "AUTH_ERROR",
            ServiceError::NotFound { .. } => "NOT_FOUND",
            ServiceError::Conflict(_) => "CONFLICT",
            ServiceError::Gateway { .. } => "GATEWAY_ERROR",
            ServiceError::Persistence(_) => "PERSISTENCE_ERROR",
            ServiceError::EventHandler { .. } => "EVENT_HANDLER_FAILED",
            ServiceError::Configuration(_) | ServiceError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to return to a client.
    ///
    /// Server-side failures get a generic text; their detail only goes to logs.
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::Gateway { .. } => "Payment provider request failed".to_string(),
            ServiceError::Persistence(_) => "Storage operation failed".to_string(),
            ServiceError::EventHandler { .. } => "Event processing failed".to_string(),
            ServiceError::Configuration(_) | ServiceError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;
