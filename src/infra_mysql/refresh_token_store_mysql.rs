use super::util::store_err;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;

pub struct MySqlRefreshTokenStore {
    pool: MySqlPool,
}

impl MySqlRefreshTokenStore {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlRefreshTokenStore { pool }
    }
}

#[async_trait::async_trait]
impl RefreshTokenStore for MySqlRefreshTokenStore {
    async fn insert(
        &self,
        owner: &UserId,
        hash: &TokenHash,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        sqlx::query(
            r#"
INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
VALUES (?, ?, ?)
"#,
        )
        .bind(owner.as_str())
        .bind(hash.as_bytes())
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(())
    }

    async fn find_active_owner_by_hash(
        &self,
        hash: &TokenHash,
    ) -> Result<Option<UserId>, AuthError> {
        let owner: Option<String> = sqlx::query_scalar(
            r#"
SELECT user_id
FROM refresh_tokens
WHERE token_hash = ? AND revoked = FALSE AND expires_at > ?
"#,
        )
        .bind(hash.as_bytes())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(owner.map(UserId))
    }

    async fn revoke_by_hash(&self, hash: &TokenHash) -> Result<(), AuthError> {
        sqlx::query(
            r#"
UPDATE refresh_tokens
SET revoked = TRUE, revoked_at = ?
WHERE token_hash = ? AND revoked = FALSE
"#,
        )
        .bind(Utc::now())
        .bind(hash.as_bytes())
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(())
    }

    async fn revoke_active_by_hash(&self, hash: &TokenHash) -> Result<bool, AuthError> {
        // Row lock on the conditional UPDATE serializes concurrent rotations;
        // only one of them sees an affected row.
        let now = Utc::now();
        let result = sqlx::query(
            r#"
UPDATE refresh_tokens
SET revoked = TRUE, revoked_at = ?
WHERE token_hash = ? AND revoked = FALSE AND expires_at > ?
"#,
        )
        .bind(now)
        .bind(hash.as_bytes())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(result.rows_affected() == 1)
    }
}
