//! # Bearer Tokens
//!
//! HMAC-signed JWTs carrying the subject in a `user_id` claim.
//! Only HS256/HS384/HS512 are accepted; the header's algorithm is checked
//! against that allow-list before the signature is looked at.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, decode_header, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header,
    Validation,
};
use pay_core::{AuthError, ServiceError, ServiceResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Claim holding the subject identifier
pub const SUBJECT_CLAIM: &str = "user_id";

/// Longest accepted token lifetime (one year)
pub const MAX_EXPIRY_HOURS: i64 = 24 * 366;

const ALLOWED_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Extract the token from an `Authorization` header value.
///
/// The value must be exactly two space-separated parts, the first being `Bearer`.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or(AuthError::MalformedHeader)?;
    let parts: Vec<&str> = header.split(' ').collect();
    match parts.as_slice() {
        ["Bearer", token] if !token.is_empty() => Ok(token),
        _ => Err(AuthError::MalformedHeader),
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct IssuedClaims {
    user_id: String,
    iat: i64,
    exp: i64,
}

/// A freshly signed access token
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies bearer tokens with a shared secret
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry: Duration,
    refresh_enabled: bool,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("expiry", &self.expiry)
            .field("refresh_enabled", &self.refresh_enabled)
            .finish_non_exhaustive()
    }
}

impl JwtService {
    /// Create a service for `secret`. Fails if the secret is empty.
    pub fn new(secret: &str, expiry_hours: i64, refresh_enabled: bool) -> ServiceResult<Self> {
        if secret.is_empty() {
            return Err(ServiceError::Configuration(
                "JWT secret must not be empty".to_string(),
            ));
        }
        if !(1..=MAX_EXPIRY_HOURS).contains(&expiry_hours) {
            return Err(ServiceError::Configuration(format!(
                "JWT expiry must be between 1 and {} hours",
                MAX_EXPIRY_HOURS
            )));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiry: Duration::hours(expiry_hours),
            refresh_enabled,
        })
    }

    pub fn refresh_enabled(&self) -> bool {
        self.refresh_enabled
    }

    /// Sign an HS256 token for `subject`
    pub fn issue(&self, subject: &str) -> ServiceResult<IssuedToken> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(self.expiry)
            .ok_or_else(|| ServiceError::Internal("token expiry out of range".to_string()))?;
        let claims = IssuedClaims {
            user_id: subject.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::Internal(format!("Failed to sign token: {}", e)))?;

        Ok(IssuedToken {
            access_token,
            token_type: "Bearer",
            expires_at,
        })
    }

    /// Verify a token and return its subject.
    pub fn verify(&self, token: &str) -> Result<String, AuthError> {
        let header = decode_header(token).map_err(|e| {
            debug!("Failed to decode token header: {}", e);
            AuthError::InvalidToken(e.to_string())
        })?;

        if !ALLOWED_ALGORITHMS.contains(&header.alg) {
            return Err(AuthError::UnsupportedAlgorithm(format!("{:?}", header.alg)));
        }

        let mut validation = Validation::new(header.alg);
        validation.algorithms = vec![header.alg];
        // `exp` is checked when present but not demanded
        validation.required_spec_claims.clear();

        let data = decode::<serde_json::Map<String, serde_json::Value>>(
            token,
            &self.decoding_key,
            &validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            ErrorKind::InvalidAlgorithm => {
                AuthError::UnsupportedAlgorithm(format!("{:?}", header.alg))
            }
            _ => AuthError::InvalidToken(e.to_string()),
        })?;

        data.claims
            .get(SUBJECT_CLAIM)
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or(AuthError::MissingClaim(SUBJECT_CLAIM))
    }

    /// Parse an `Authorization` header value and verify its token
    pub fn verify_header(&self, header: Option<&str>) -> Result<String, AuthError> {
        self.verify(bearer_token(header)?)
    }
}
