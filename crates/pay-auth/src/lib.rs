//! # pay-auth
//!
//! Authentication for checkout-relay.
//!
//! - **JwtService** - signs and verifies HMAC bearer tokens; the subject
//!   travels in the `user_id` claim
//! - **PasswordHasher** - Argon2id password hashes
//! - **AuthService** - register, login, profile, password reset, refresh
//!
//! ## Verifying a request
//!
//! ```rust,ignore
//! use pay_auth::JwtService;
//!
//! let jwt = JwtService::new(&secret, 24, true)?;
//! let subject = jwt.verify_header(headers.get("authorization").and_then(|v| v.to_str().ok()))?;
//! ```

pub mod jwt;
pub mod password;
pub mod service;

pub use jwt::{bearer_token, IssuedToken, JwtService, SUBJECT_CLAIM};
pub use password::PasswordHasher;
pub use service::{AuthService, LoginResponse};
