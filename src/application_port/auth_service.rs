use crate::domain_model::{AccessToken, RefreshToken, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    // Deliberately uniform: unknown email and wrong password look the same.
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("email already registered")]
    EmailTaken,
    // Same for unknown, expired and already revoked refresh tokens.
    #[error("invalid refresh token")]
    InvalidRefreshToken,
    #[error("malformed token")]
    MalformedToken,
    #[error("bad token signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("token has no subject")]
    MissingSubject,
    #[error("entropy source failed: {0}")]
    Entropy(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("user not found")]
    UserNotFound,
    #[error("store error: {0}")]
    Store(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// True for the errors a bearer token check can produce.
    pub fn is_token_error(&self) -> bool {
        matches!(
            self,
            AuthError::MalformedToken
                | AuthError::BadSignature
                | AuthError::Expired
                | AuthError::MissingSubject
        )
    }
}

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
}

/// Lifetimes and registration policy for the session service.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub min_password_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            access_ttl: Duration::from_secs(15 * 60),
            refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            min_password_len: 8,
        }
    }
}

/// Stateless signer/verifier for access tokens.
pub trait TokenCodec: Send + Sync {
    /// Signs a token for `subject` that expires `ttl` from now.
    fn sign(
        &self,
        subject: &UserId,
        ttl: Duration,
    ) -> Result<(AccessToken, DateTime<Utc>), AuthError>;

    /// Checks integrity and freshness, returning the subject.
    fn verify(&self, token: &str) -> Result<UserId, AuthError>;
}

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError>;
    async fn verify_password(&self, password: &str, password_hash: &str)
    -> Result<bool, AuthError>;
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    async fn register(&self, request: RegisterInput) -> Result<UserId, AuthError>;
    async fn login(&self, request: LoginInput) -> Result<AuthTokens, AuthError>;
    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, AuthError>;
    async fn logout(&self, refresh_token: &str) -> Result<(), AuthError>;
    async fn verify_token(&self, access_token: &str) -> Result<UserId, AuthError>;
    async fn profile(&self, user_id: &UserId) -> Result<UserProfile, AuthError>;
}
