use crate::api::v1::{ApiConfig, RefreshCookie};
use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::Settings;
use anyhow::{Context, anyhow};
use sqlx::MySqlPool;
use std::sync::Arc;
use std::time::Duration;

pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pub api_config: Arc<ApiConfig>,
    pool: Option<MySqlPool>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let session_config = settings.auth.session_config();

        let token_codec: Arc<dyn TokenCodec> = Arc::new(
            JwtHs256Codec::new(settings.auth.signing_secret.as_bytes())
                .map_err(|e| anyhow!("signing secret: {}", e))?,
        );
        let credential_hasher: Arc<dyn CredentialHasher> =
            Arc::new(Argon2PasswordHasher::default());

        let needs_mysql =
            settings.users.backend == "mysql" || settings.refresh_tokens.backend == "mysql";
        let pool = if needs_mysql {
            let mysql = settings
                .mysql
                .as_ref()
                .ok_or_else(|| anyhow!("mysql backend selected but [mysql] is missing"))?;
            Some(
                MySqlPool::connect(&mysql.url)
                    .await
                    .context("connecting to mysql")?,
            )
        } else {
            None
        };

        let user_store: Arc<dyn UserStore> = match settings.users.backend.as_str() {
            "memory" => Arc::new(MemoryUserStore::new()),
            "mysql" => Arc::new(MySqlUserStore::new(mysql_pool(&pool)?)),
            other => return Err(anyhow!("Unknown users backend: {}", other)),
        };

        let refresh_store: Arc<dyn RefreshTokenStore> =
            match settings.refresh_tokens.backend.as_str() {
                "memory" => Arc::new(MemoryRefreshTokenStore::new()),
                "mysql" => Arc::new(MySqlRefreshTokenStore::new(mysql_pool(&pool)?)),
                "redis" => {
                    let redis = settings
                        .redis
                        .as_ref()
                        .ok_or_else(|| anyhow!("redis backend selected but [redis] is missing"))?;
                    let client = redis::Client::open(redis.url.as_str())?;
                    let manager = client
                        .get_connection_manager()
                        .await
                        .context("connecting to redis")?;
                    Arc::new(RedisRefreshTokenStore::new(manager, redis.prefix.clone()))
                }
                other => return Err(anyhow!("Unknown refresh_tokens backend: {}", other)),
            };

        let api_config = ApiConfig {
            cookie: RefreshCookie::from_settings(&settings.cookie, session_config.refresh_ttl),
            request_timeout: Duration::from_secs(settings.http.request_timeout_secs),
        };

        let auth_service: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
            user_store,
            refresh_store,
            credential_hasher,
            token_codec,
            session_config,
        ));

        info!(
            users = %settings.users.backend,
            refresh_tokens = %settings.refresh_tokens.backend,
            "server started"
        );

        Ok(Self {
            auth_service,
            api_config: Arc::new(api_config),
            pool,
        })
    }

    /// Assembles a server from ready-made parts, without touching any backend.
    pub fn from_parts(auth_service: Arc<dyn AuthService>, api_config: ApiConfig) -> Self {
        Self {
            auth_service,
            api_config: Arc::new(api_config),
            pool: None,
        }
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}

fn mysql_pool(pool: &Option<MySqlPool>) -> anyhow::Result<MySqlPool> {
    pool.clone()
        .ok_or_else(|| anyhow!("mysql pool was not initialised"))
}
