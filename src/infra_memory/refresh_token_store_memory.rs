use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

#[derive(Debug, Clone)]
struct RefreshTokenRecord {
    owner: UserId,
    expires_at: DateTime<Utc>,
    revoked: bool,
}

impl RefreshTokenRecord {
    fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && now < self.expires_at
    }
}

/// Refresh token rows keyed by hash. Revoked rows are kept, like a table would.
pub struct MemoryRefreshTokenStore {
    records: DashMap<TokenHash, RefreshTokenRecord>,
}

impl MemoryRefreshTokenStore {
    pub fn new() -> Self {
        MemoryRefreshTokenStore {
            records: DashMap::new(),
        }
    }

    /// Number of active tokens owned by `owner`.
    pub fn active_count_for(&self, owner: &UserId) -> usize {
        let now = Utc::now();
        self.records
            .iter()
            .filter(|r| r.value().owner == *owner && r.value().is_active(now))
            .count()
    }

    pub fn is_revoked(&self, hash: &TokenHash) -> Option<bool> {
        self.records.get(hash).map(|r| r.value().revoked)
    }
}

impl Default for MemoryRefreshTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn insert(
        &self,
        owner: &UserId,
        hash: &TokenHash,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        match self.records.entry(*hash) {
            Entry::Occupied(_) => Err(AuthError::Store("duplicate refresh token hash".to_string())),
            Entry::Vacant(slot) => {
                slot.insert(RefreshTokenRecord {
                    owner: owner.clone(),
                    expires_at,
                    revoked: false,
                });
                Ok(())
            }
        }
    }

    async fn find_active_owner_by_hash(
        &self,
        hash: &TokenHash,
    ) -> Result<Option<UserId>, AuthError> {
        let now = Utc::now();
        Ok(self
            .records
            .get(hash)
            .filter(|r| r.value().is_active(now))
            .map(|r| r.value().owner.clone()))
    }

    async fn revoke_by_hash(&self, hash: &TokenHash) -> Result<(), AuthError> {
        if let Some(mut record) = self.records.get_mut(hash) {
            record.revoked = true;
        }
        Ok(())
    }

    async fn revoke_active_by_hash(&self, hash: &TokenHash) -> Result<bool, AuthError> {
        // get_mut holds the shard write lock, making check-and-set atomic.
        let now = Utc::now();
        match self.records.get_mut(hash) {
            Some(mut record) if record.is_active(now) => {
                record.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
