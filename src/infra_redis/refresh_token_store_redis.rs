use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, FromRedisValue, RedisError, RedisResult, RedisWrite, ToRedisArgs, Value};

/// Refresh tokens as `prefix:hex(hash) -> owner` keys. The key TTL is the
/// token expiry, and revoking a token deletes its key.
pub struct RedisRefreshTokenStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisRefreshTokenStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisRefreshTokenStore {
            conn,
            prefix: prefix.into(),
        }
    }

    fn key(&self, hash: &TokenHash) -> String {
        format!("{}:{}", self.prefix, hash.to_hex())
    }
}

/// Seconds until `until`, or `None` if it is already in the past.
fn ttl_secs(until: DateTime<Utc>) -> Option<u64> {
    let secs = (until - Utc::now()).num_seconds();
    if secs <= 0 { None } else { Some(secs as u64) }
}

impl ToRedisArgs for UserId {
    fn write_redis_args<W>(&self, out: &mut W)
    where
        W: ?Sized + RedisWrite,
    {
        out.write_arg(self.0.as_bytes())
    }
}

impl FromRedisValue for UserId {
    fn from_redis_value(v: &Value) -> RedisResult<Self> {
        let s: String = redis::from_redis_value(v)?;
        if s.is_empty() {
            return Err(RedisError::from((
                redis::ErrorKind::TypeError,
                "empty UserId string",
            )));
        }
        Ok(UserId(s))
    }
}

#[async_trait::async_trait]
impl RefreshTokenStore for RedisRefreshTokenStore {
    async fn insert(
        &self,
        owner: &UserId,
        hash: &TokenHash,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        // Born expired: nothing to store, lookups will miss as they should.
        let Some(ttl) = ttl_secs(expires_at) else {
            return Ok(());
        };
        let key = self.key(hash);
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(&key, owner, ttl)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;
        Ok(())
    }

    async fn find_active_owner_by_hash(
        &self,
        hash: &TokenHash,
    ) -> Result<Option<UserId>, AuthError> {
        let key = self.key(hash);
        let mut conn = self.conn.clone();
        let owner: Option<UserId> = conn
            .get(&key)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;
        Ok(owner)
    }

    async fn revoke_by_hash(&self, hash: &TokenHash) -> Result<(), AuthError> {
        let key = self.key(hash);
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(&key)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;
        Ok(())
    }

    async fn revoke_active_by_hash(&self, hash: &TokenHash) -> Result<bool, AuthError> {
        // GETDEL is atomic: of several concurrent callers only one gets the value.
        let key = self.key(hash);
        let mut conn = self.conn.clone();
        let owner: Option<UserId> = conn
            .get_del(&key)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;
        Ok(owner.is_some())
    }
}
