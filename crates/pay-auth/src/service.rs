//! # Account Service
//!
//! Registration, login, profile updates and the password reset flow.

use crate::jwt::{IssuedToken, JwtService};
use crate::password::{validate_password, PasswordHasher};
use chrono::{Duration, Utc};
use pay_core::{
    AuthError, PasswordResetToken, ServiceError, ServiceResult, SharedStore, User, UserProfile,
};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

/// How long a password reset token stays valid
pub const RESET_TOKEN_TTL_HOURS: i64 = 24;

/// Login result
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub token: IssuedToken,
    pub user: UserProfile,
}

fn validate_email(email: &str) -> ServiceResult<String> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !email.contains(' '),
        None => false,
    };
    if !valid {
        return Err(ServiceError::Validation("a valid email is required".to_string()));
    }
    Ok(email.to_string())
}

#[derive(Clone)]
pub struct AuthService {
    store: SharedStore,
    jwt: JwtService,
    hasher: PasswordHasher,
    reset_ttl: Duration,
}

impl AuthService {
    pub fn new(store: SharedStore, jwt: JwtService) -> Self {
        Self {
            store,
            jwt,
            hasher: PasswordHasher::new(),
            reset_ttl: Duration::hours(RESET_TOKEN_TTL_HOURS),
        }
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    /// Create an account. Fails with `Conflict` if the email is taken.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> ServiceResult<UserProfile> {
        let email = validate_email(email)?;
        validate_password(password)?;

        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(ServiceError::Conflict(
                "user with this email already exists".to_string(),
            ));
        }

        let hash = self.hasher.hash(password)?;
        let user = User::new(email, hash, first_name.trim(), last_name.trim());
        let profile = user.profile();
        self.store.create_user(user).await?;

        info!("Registered user: id={}", profile.id);
        Ok(profile)
    }

    /// Check credentials and issue a token.
    ///
    /// Unknown email and wrong password fail identically.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<LoginResponse> {
        let user = self
            .store
            .find_user_by_email(email.trim())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self.hasher.verify(password, &user.password_hash) {
            warn!("Failed login for user: id={}", user.id);
            return Err(AuthError::InvalidCredentials.into());
        }

        let token = self.jwt.issue(&user.id)?;
        Ok(LoginResponse {
            token,
            user: user.profile(),
        })
    }

    /// Issue a new token for an already authenticated subject
    pub async fn refresh(&self, subject: &str) -> ServiceResult<IssuedToken> {
        if !self.jwt.refresh_enabled() {
            return Err(ServiceError::not_found("route", "token refresh"));
        }
        // The subject must still exist
        self.profile(subject).await?;
        self.jwt.issue(subject)
    }

    pub async fn profile(&self, user_id: &str) -> ServiceResult<UserProfile> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .map(|u| u.profile())
            .ok_or_else(|| ServiceError::not_found("user", user_id))
    }

    #[instrument(skip(self))]
    pub async fn update_profile(
        &self,
        user_id: &str,
        first_name: &str,
        last_name: &str,
    ) -> ServiceResult<UserProfile> {
        let mut user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("user", user_id))?;

        user.first_name = first_name.trim().to_string();
        user.last_name = last_name.trim().to_string();
        user.updated_at = Utc::now();

        let profile = user.profile();
        self.store.update_user(user).await?;
        Ok(profile)
    }

    /// Issue a reset token for `email`.
    ///
    /// Returns `None` for unknown emails so callers answer the same way either
    /// way. Delivering the token is the caller's job.
    #[instrument(skip(self))]
    pub async fn request_password_reset(&self, email: &str) -> ServiceResult<Option<String>> {
        let Some(user) = self.store.find_user_by_email(email.trim()).await? else {
            debug!("Password reset requested for unknown email");
            return Ok(None);
        };

        let token = PasswordResetToken::issue(&user.id, self.reset_ttl);
        let value = token.token.clone();
        self.store.save_reset_token(token).await?;

        info!("Issued password reset token for user: id={}", user.id);
        Ok(Some(value))
    }

    /// Consume a reset token and set a new password
    #[instrument(skip(self, token, new_password))]
    pub async fn reset_password(&self, token: &str, new_password: &str) -> ServiceResult<()> {
        validate_password(new_password)?;
        let hash = self.hasher.hash(new_password)?;

        let user_id = self.store.consume_reset_token(token, Utc::now()).await?;
        let mut user = self
            .store
            .find_user_by_id(&user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("user", &user_id))?;

        user.password_hash = hash;
        user.updated_at = Utc::now();
        self.store.update_user(user).await?;

        info!("Password reset for user: id={}", user_id);
        Ok(())
    }
}
