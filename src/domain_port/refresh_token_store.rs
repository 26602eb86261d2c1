use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Utc};

/// Persistence for refresh token hashes. A token is active iff it is not
/// revoked and `now < expires_at`; expiry is evaluated on read, never written back.
#[async_trait::async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn insert(
        &self,
        owner: &UserId,
        hash: &TokenHash,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError>;

    /// Owner of the token if it is active.
    async fn find_active_owner_by_hash(&self, hash: &TokenHash)
    -> Result<Option<UserId>, AuthError>;

    /// Idempotent: revoking an unknown or already revoked hash succeeds.
    async fn revoke_by_hash(&self, hash: &TokenHash) -> Result<(), AuthError>;

    /// Revoke only if currently active. Returns whether this call performed the
    /// transition, so that exactly one of several concurrent callers wins.
    async fn revoke_active_by_hash(&self, hash: &TokenHash) -> Result<bool, AuthError>;
}
