use super::util::{is_dup_key, store_err};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

pub struct MySqlUserStore {
    pool: MySqlPool,
}

impl MySqlUserStore {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlUserStore { pool }
    }

    fn row_to_credential(row: MySqlRow) -> Result<Credential, AuthError> {
        let id: String = row.try_get("id").map_err(store_err)?;
        let email: String = row.try_get("email").map_err(store_err)?;
        let password_hash: String = row.try_get("password_hash").map_err(store_err)?;

        Ok(Credential {
            id: UserId(id),
            email,
            password_hash,
        })
    }
}

#[async_trait::async_trait]
impl UserStore for MySqlUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>, AuthError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT id, email, password_hash
FROM users
WHERE email = ?
"#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row_opt.map(Self::row_to_credential).transpose()
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<Credential>, AuthError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT id, email, password_hash
FROM users
WHERE id = ?
"#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row_opt.map(Self::row_to_credential).transpose()
    }

    async fn create(&self, credential: Credential) -> Result<(), AuthError> {
        let result = sqlx::query(
            r#"
INSERT INTO users (id, email, password_hash)
VALUES (?, ?, ?)
"#,
        )
        .bind(credential.id.as_str())
        .bind(&credential.email)
        .bind(&credential.password_hash)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_dup_key(&e) => Err(AuthError::EmailTaken),
            Err(e) => Err(store_err(e)),
        }
    }
}
