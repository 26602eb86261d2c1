use crate::application_port::{AuthError, TokenCodec};
use crate::domain_model::{AccessToken, UserId};
use chrono::{DateTime, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, crypto, decode, encode,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize)]
struct AccessClaims {
    #[serde(default)]
    sub: String,
    iat: i64,
    exp: i64,
}

/// HS256 codec for compact `header.payload.signature` access tokens.
pub struct JwtHs256Codec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtHs256Codec {
    pub fn new(signing_key: &[u8]) -> Result<Self, AuthError> {
        if signing_key.is_empty() {
            return Err(AuthError::Internal("empty signing key".to_string()));
        }

        // Expiry is checked by `verify` itself with no leeway, so the
        // library must not reject or require anything on its own.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.required_spec_claims.clear();

        Ok(JwtHs256Codec {
            encoding_key: EncodingKey::from_secret(signing_key),
            decoding_key: DecodingKey::from_secret(signing_key),
            validation,
        })
    }
}

impl TokenCodec for JwtHs256Codec {
    fn sign(
        &self,
        subject: &UserId,
        ttl: Duration,
    ) -> Result<(AccessToken, DateTime<Utc>), AuthError> {
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| AuthError::Internal(e.to_string()))?;
        let iat_dt = Utc::now();
        let exp_dt = iat_dt
            .checked_add_signed(ttl)
            .ok_or_else(|| AuthError::Internal("access token ttl out of range".to_string()))?;
        let claims = AccessClaims {
            sub: subject.0.clone(),
            iat: iat_dt.timestamp(),
            exp: exp_dt.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        Ok((AccessToken(token), exp_dt))
    }

    fn verify(&self, token: &str) -> Result<UserId, AuthError> {
        let parts: Vec<&str> = token.split('.').collect();
        let [header, payload, signature] = parts[..] else {
            return Err(AuthError::MalformedToken);
        };

        // Signature first: nothing in an unauthenticated token is parsed.
        let message = format!("{}.{}", header, payload);
        let valid = crypto::verify(
            signature,
            message.as_bytes(),
            &self.decoding_key,
            Algorithm::HS256,
        )
        .map_err(|_| AuthError::BadSignature)?;
        if !valid {
            return Err(AuthError::BadSignature);
        }

        let claims = decode::<AccessClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| AuthError::MalformedToken)?
            .claims;

        if claims.sub.is_empty() {
            return Err(AuthError::MissingSubject);
        }
        if Utc::now().timestamp() >= claims.exp {
            return Err(AuthError::Expired);
        }

        Ok(UserId(claims.sub))
    }
}
