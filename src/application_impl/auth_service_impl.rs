use super::refresh_token::{IssuedRefreshToken, generate_refresh_token};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::{RefreshTokenStore, UserStore};
use argon2::password_hash::rand_core::OsRng;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

const MAX_PASSWORD_LEN: usize = 128;

/// Hashed once and verified against when the email is unknown, so a login for
/// a missing account costs the same as one with a wrong password.
const DUMMY_PASSWORD: &str = "dummy-password-for-unknown-accounts";

/// Emails are compared case-insensitively on every backend.
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub struct RealAuthService {
    user_store: Arc<dyn UserStore>,
    refresh_store: Arc<dyn RefreshTokenStore>,
    credential_hasher: Arc<dyn CredentialHasher>,
    token_codec: Arc<dyn TokenCodec>,
    config: SessionConfig,
    dummy_hash: OnceCell<String>,
}

impl RealAuthService {
    pub fn new(
        user_store: Arc<dyn UserStore>,
        refresh_store: Arc<dyn RefreshTokenStore>,
        credential_hasher: Arc<dyn CredentialHasher>,
        token_codec: Arc<dyn TokenCodec>,
        config: SessionConfig,
    ) -> Self {
        Self {
            user_store,
            refresh_store,
            credential_hasher,
            token_codec,
            config,
            dummy_hash: OnceCell::new(),
        }
    }

    async fn burn_password_check(&self, password: &str) -> Result<(), AuthError> {
        let dummy_hash = self
            .dummy_hash
            .get_or_try_init(|| self.credential_hasher.hash_password(DUMMY_PASSWORD))
            .await?;
        self.credential_hasher
            .verify_password(password, dummy_hash)
            .await?;
        Ok(())
    }

    fn validate_register(&self, email: &str, password: &str) -> Result<(), AuthError> {
        if email.trim().is_empty() || !email.contains('@') {
            return Err(AuthError::InvalidInput("email is not valid".to_string()));
        }
        if password.len() < self.config.min_password_len {
            return Err(AuthError::InvalidInput(format!(
                "password must be at least {} characters",
                self.config.min_password_len
            )));
        }
        if password.len() > MAX_PASSWORD_LEN {
            return Err(AuthError::InvalidInput(format!(
                "password must be at most {} characters",
                MAX_PASSWORD_LEN
            )));
        }
        Ok(())
    }

    /// Signs an access token and persists a new refresh token for `user_id`.
    /// Nothing is returned unless the refresh token is durably stored.
    async fn issue_tokens(&self, user_id: &UserId) -> Result<AuthTokens, AuthError> {
        let (access_token, access_exp) = self.token_codec.sign(user_id, self.config.access_ttl)?;

        let IssuedRefreshToken {
            plain,
            hash,
            expires_at,
        } = generate_refresh_token(&mut OsRng, self.config.refresh_ttl)?;

        self.refresh_store.insert(user_id, &hash, expires_at).await?;

        Ok(AuthTokens {
            access_token,
            refresh_token: plain,
            access_token_expires_at: access_exp,
            refresh_token_expires_at: expires_at,
        })
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn register(&self, request: RegisterInput) -> Result<UserId, AuthError> {
        let RegisterInput { email, password } = request;
        let email = normalize_email(&email);

        self.validate_register(&email, &password)?;

        if self.user_store.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = self.credential_hasher.hash_password(&password).await?;
        let id = UserId::new_random();
        self.user_store
            .create(Credential {
                id: id.clone(),
                email,
                password_hash,
            })
            .await?;

        info!(user_id = %id, "user registered");
        Ok(id)
    }

    async fn login(&self, request: LoginInput) -> Result<AuthTokens, AuthError> {
        let LoginInput { email, password } = request;

        let Some(credential) = self.user_store.find_by_email(&normalize_email(&email)).await?
        else {
            self.burn_password_check(&password).await?;
            return Err(AuthError::InvalidCredentials);
        };

        let ok = self
            .credential_hasher
            .verify_password(&password, &credential.password_hash)
            .await?;
        if !ok {
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self.issue_tokens(&credential.id).await?;

        info!(user_id = %credential.id, "user logged in");
        Ok(tokens)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, AuthError> {
        if refresh_token.is_empty() {
            return Err(AuthError::InvalidRefreshToken);
        }
        let hash = TokenHash::of(refresh_token);

        let user_id = self
            .refresh_store
            .find_active_owner_by_hash(&hash)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        // Rotation: the conditional revoke must land before anything new is
        // minted. Losing it means a concurrent refresh or a replay got here first.
        if !self.refresh_store.revoke_active_by_hash(&hash).await? {
            warn!(user_id = %user_id, "refresh token reused or rotated concurrently");
            return Err(AuthError::InvalidRefreshToken);
        }

        let tokens = self.issue_tokens(&user_id).await?;

        info!(user_id = %user_id, "refresh token rotated");
        Ok(tokens)
    }

    async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        if refresh_token.is_empty() {
            return Ok(());
        }
        self.refresh_store
            .revoke_by_hash(&TokenHash::of(refresh_token))
            .await
    }

    async fn verify_token(&self, access_token: &str) -> Result<UserId, AuthError> {
        self.token_codec.verify(access_token)
    }

    async fn profile(&self, user_id: &UserId) -> Result<UserProfile, AuthError> {
        let credential = self
            .user_store
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        Ok(UserProfile {
            id: credential.id,
            email: credential.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::credential_hasher_argon2::cheap_hasher;
    use crate::application_impl::Argon2PasswordHasher;
    use crate::application_impl::JwtHs256Codec;
    use crate::infra_memory::{MemoryRefreshTokenStore, MemoryUserStore};
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    struct Harness {
        service: RealAuthService,
        users: Arc<MemoryUserStore>,
        refresh_tokens: Arc<MemoryRefreshTokenStore>,
    }

    fn harness() -> Harness {
        harness_with(SessionConfig::default())
    }

    fn harness_with(config: SessionConfig) -> Harness {
        let users = Arc::new(MemoryUserStore::new());
        let refresh_tokens = Arc::new(MemoryRefreshTokenStore::new());
        let service = RealAuthService::new(
            users.clone(),
            refresh_tokens.clone(),
            Arc::new(cheap_hasher()),
            Arc::new(JwtHs256Codec::new(b"test-secret").unwrap()),
            config,
        );
        Harness {
            service,
            users,
            refresh_tokens,
        }
    }

    fn register_input(email: &str, password: &str) -> RegisterInput {
        RegisterInput {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    fn login_input(email: &str, password: &str) -> LoginInput {
        LoginInput {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    async fn registered(h: &Harness) -> UserId {
        h.service
            .register(register_input("alice@example.com", "pw123456"))
            .await
            .expect("Failed to register")
    }

    /// Refresh store that fails on demand, wrapping a real in-memory store.
    struct FlakyRefreshStore {
        inner: MemoryRefreshTokenStore,
        fail_insert: AtomicBool,
        fail_find: AtomicBool,
    }

    impl FlakyRefreshStore {
        fn new() -> Self {
            FlakyRefreshStore {
                inner: MemoryRefreshTokenStore::new(),
                fail_insert: AtomicBool::new(false),
                fail_find: AtomicBool::new(false),
            }
        }
    }

    #[async_trait::async_trait]
    impl RefreshTokenStore for FlakyRefreshStore {
        async fn insert(
            &self,
            owner: &UserId,
            hash: &TokenHash,
            expires_at: DateTime<Utc>,
        ) -> Result<(), AuthError> {
            if self.fail_insert.load(Ordering::SeqCst) {
                return Err(AuthError::Store("connection reset".to_string()));
            }
            self.inner.insert(owner, hash, expires_at).await
        }

        async fn find_active_owner_by_hash(
            &self,
            hash: &TokenHash,
        ) -> Result<Option<UserId>, AuthError> {
            if self.fail_find.load(Ordering::SeqCst) {
                return Err(AuthError::Store("connection reset".to_string()));
            }
            self.inner.find_active_owner_by_hash(hash).await
        }

        async fn revoke_by_hash(&self, hash: &TokenHash) -> Result<(), AuthError> {
            self.inner.revoke_by_hash(hash).await
        }

        async fn revoke_active_by_hash(&self, hash: &TokenHash) -> Result<bool, AuthError> {
            self.inner.revoke_active_by_hash(hash).await
        }
    }

    #[tokio::test]
    async fn test_register_success() {
        let h = harness();
        let id = registered(&h).await;

        let credential = h
            .users
            .find_by_email("alice@example.com")
            .await
            .unwrap()
            .expect("user should exist");
        assert_eq!(credential.id, id);
        assert_ne!(credential.password_hash, "pw123456");
    }

    #[tokio::test]
    async fn test_register_email_taken() {
        let h = harness();
        registered(&h).await;

        let result = h
            .service
            .register(register_input("alice@example.com", "another-pw"))
            .await;
        assert!(matches!(result, Err(AuthError::EmailTaken)));
    }

    #[tokio::test]
    async fn test_register_rejects_bad_input() {
        let h = harness();

        for (email, password) in [
            ("", "pw123456"),
            ("not-an-email", "pw123456"),
            ("bob@example.com", "short"),
        ] {
            let result = h.service.register(register_input(email, password)).await;
            assert!(matches!(result, Err(AuthError::InvalidInput(_))));
        }
        let long = "x".repeat(MAX_PASSWORD_LEN + 1);
        let result = h
            .service
            .register(register_input("bob@example.com", &long))
            .await;
        assert!(matches!(result, Err(AuthError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_login_success() {
        let h = harness();
        let id = registered(&h).await;

        let tokens = h
            .service
            .login(login_input("alice@example.com", "pw123456"))
            .await
            .expect("Failed to login");

        assert!(!tokens.access_token.0.is_empty());
        assert!(!tokens.refresh_token.as_str().is_empty());
        assert_eq!(h.service.verify_token(&tokens.access_token.0).await.unwrap(), id);
        assert_eq!(h.refresh_tokens.active_count_for(&id), 1);
        assert!(tokens.refresh_token_expires_at > tokens.access_token_expires_at);
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let h = harness();
        registered(&h).await;

        let unknown = h
            .service
            .login(login_input("nobody@example.com", "pw123456"))
            .await
            .unwrap_err();
        let wrong = h
            .service
            .login(login_input("alice@example.com", "wrong-password"))
            .await
            .unwrap_err();

        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    /// Hasher that counts verifications, wrapping the real one.
    struct CountingHasher {
        inner: Argon2PasswordHasher,
        verifications: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl CredentialHasher for CountingHasher {
        async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
            self.inner.hash_password(password).await
        }

        async fn verify_password(
            &self,
            password: &str,
            password_hash: &str,
        ) -> Result<bool, AuthError> {
            self.verifications.fetch_add(1, Ordering::SeqCst);
            self.inner.verify_password(password, password_hash).await
        }
    }

    #[tokio::test]
    async fn test_unknown_email_still_verifies_a_password() {
        let hasher = Arc::new(CountingHasher {
            inner: cheap_hasher(),
            verifications: AtomicUsize::new(0),
        });
        let service = RealAuthService::new(
            Arc::new(MemoryUserStore::new()),
            Arc::new(MemoryRefreshTokenStore::new()),
            hasher.clone(),
            Arc::new(JwtHs256Codec::new(b"test-secret").unwrap()),
            SessionConfig::default(),
        );

        for _ in 0..2 {
            let result = service
                .login(login_input("nobody@example.com", "pw123456"))
                .await;
            assert!(matches!(result, Err(AuthError::InvalidCredentials)));
        }
        assert_eq!(hasher.verifications.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_email_is_case_insensitive() {
        let h = harness();
        let id = h
            .service
            .register(register_input(" Alice@Example.COM ", "pw123456"))
            .await
            .expect("Failed to register");

        let taken = h
            .service
            .register(register_input("alice@example.com", "pw123456"))
            .await;
        assert!(matches!(taken, Err(AuthError::EmailTaken)));

        let tokens = h
            .service
            .login(login_input("ALICE@example.com", "pw123456"))
            .await
            .expect("Failed to login");
        assert_eq!(h.service.verify_token(&tokens.access_token.0).await.unwrap(), id);

        let profile = h.service.profile(&id).await.unwrap();
        assert_eq!(profile.email, "alice@example.com");
    }

    #[tokio::test]
    async fn test_login_fails_when_refresh_token_cannot_be_stored() {
        let users = Arc::new(MemoryUserStore::new());
        let refresh_store = Arc::new(FlakyRefreshStore::new());
        let service = RealAuthService::new(
            users,
            refresh_store.clone(),
            Arc::new(cheap_hasher()),
            Arc::new(JwtHs256Codec::new(b"test-secret").unwrap()),
            SessionConfig::default(),
        );
        service
            .register(register_input("alice@example.com", "pw123456"))
            .await
            .unwrap();
        refresh_store.fail_insert.store(true, Ordering::SeqCst);

        let result = service
            .login(login_input("alice@example.com", "pw123456"))
            .await;
        assert!(matches!(result, Err(AuthError::Store(_))));
    }

    #[tokio::test]
    async fn test_refresh_rotates_exactly_once() {
        let h = harness();
        let id = registered(&h).await;
        let first = h
            .service
            .login(login_input("alice@example.com", "pw123456"))
            .await
            .unwrap();

        let second = h
            .service
            .refresh(first.refresh_token.as_str())
            .await
            .expect("Failed to refresh");
        assert_ne!(second.refresh_token, first.refresh_token);
        assert_eq!(h.service.verify_token(&second.access_token.0).await.unwrap(), id);
        assert_eq!(h.refresh_tokens.active_count_for(&id), 1);

        let replay = h.service.refresh(first.refresh_token.as_str()).await;
        assert!(matches!(replay, Err(AuthError::InvalidRefreshToken)));
        assert_eq!(h.refresh_tokens.active_count_for(&id), 1);
    }

    #[tokio::test]
    async fn test_refresh_unknown_and_empty_tokens() {
        let h = harness();

        for token in ["", "never-issued"] {
            let result = h.service.refresh(token).await;
            assert!(matches!(result, Err(AuthError::InvalidRefreshToken)));
        }
    }

    #[tokio::test]
    async fn test_refresh_expired_token() {
        let h = harness_with(SessionConfig {
            refresh_ttl: Duration::ZERO,
            ..SessionConfig::default()
        });
        registered(&h).await;
        let tokens = h
            .service
            .login(login_input("alice@example.com", "pw123456"))
            .await
            .unwrap();

        let result = h.service.refresh(tokens.refresh_token.as_str()).await;
        assert!(matches!(result, Err(AuthError::InvalidRefreshToken)));
    }

    #[tokio::test]
    async fn test_concurrent_refresh_has_one_winner() {
        let h = Arc::new(harness());
        let id = registered(&h).await;
        let tokens = h
            .service
            .login(login_input("alice@example.com", "pw123456"))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let h = h.clone();
            let plain = tokens.refresh_token.as_str().to_string();
            handles.push(tokio::spawn(async move { h.service.refresh(&plain).await }));
        }

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(e) => assert!(matches!(e, AuthError::InvalidRefreshToken)),
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(h.refresh_tokens.active_count_for(&id), 1);
    }

    #[tokio::test]
    async fn test_refresh_store_error_propagates() {
        let refresh_store = Arc::new(FlakyRefreshStore::new());
        refresh_store.fail_find.store(true, Ordering::SeqCst);
        let service = RealAuthService::new(
            Arc::new(MemoryUserStore::new()),
            refresh_store,
            Arc::new(cheap_hasher()),
            Arc::new(JwtHs256Codec::new(b"test-secret").unwrap()),
            SessionConfig::default(),
        );

        let result = service.refresh("anything").await;
        assert!(matches!(result, Err(AuthError::Store(_))));
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let h = harness();
        let id = registered(&h).await;
        let tokens = h
            .service
            .login(login_input("alice@example.com", "pw123456"))
            .await
            .unwrap();

        h.service.logout("").await.expect("empty logout");
        h.service
            .logout(tokens.refresh_token.as_str())
            .await
            .expect("first logout");
        h.service
            .logout(tokens.refresh_token.as_str())
            .await
            .expect("second logout");
        h.service.logout("never-issued").await.expect("unknown logout");

        assert_eq!(h.refresh_tokens.active_count_for(&id), 0);
        let result = h.service.refresh(tokens.refresh_token.as_str()).await;
        assert!(matches!(result, Err(AuthError::InvalidRefreshToken)));
    }

    #[tokio::test]
    async fn test_profile() {
        let h = harness();
        let id = registered(&h).await;

        let profile = h.service.profile(&id).await.expect("Failed to load profile");
        assert_eq!(profile.id, id);
        assert_eq!(profile.email, "alice@example.com");

        let missing = h.service.profile(&UserId::from("ghost")).await;
        assert!(matches!(missing, Err(AuthError::UserNotFound)));
    }

    #[tokio::test]
    async fn test_verify_token_rejects_garbage() {
        let h = harness();

        let result = h.service.verify_token("garbage").await;
        assert!(matches!(result, Err(AuthError::MalformedToken)));
    }
}
