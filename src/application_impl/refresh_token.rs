use crate::application_port::AuthError;
use crate::domain_model::{RefreshToken, TokenHash};
use argon2::password_hash::rand_core::RngCore;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use std::time::Duration;

const REFRESH_TOKEN_BYTES: usize = 32;

/// A freshly minted refresh token. `plain` goes to the client, `hash` to the store.
pub struct IssuedRefreshToken {
    pub plain: RefreshToken,
    pub hash: TokenHash,
    pub expires_at: DateTime<Utc>,
}

/// 256 random bits, base64url without padding. A failing entropy source is
/// reported, never retried.
pub fn generate_refresh_token(
    rng: &mut dyn RngCore,
    ttl: Duration,
) -> Result<IssuedRefreshToken, AuthError> {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    rng.try_fill_bytes(&mut bytes)
        .map_err(|e| AuthError::Entropy(e.to_string()))?;

    let ttl = chrono::Duration::from_std(ttl).map_err(|e| AuthError::Internal(e.to_string()))?;
    let expires_at = Utc::now()
        .checked_add_signed(ttl)
        .ok_or_else(|| AuthError::Internal("refresh token ttl out of range".to_string()))?;
    let plain = RefreshToken(URL_SAFE_NO_PAD.encode(bytes));
    let hash = plain.hash();

    Ok(IssuedRefreshToken {
        plain,
        hash,
        expires_at,
    })
}
