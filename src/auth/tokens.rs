//! Credential token issue and verification
//!
//! HS256 tokens with `{sub, iat, exp}` claims. The same token is accepted
//! from the `Authorization: Bearer` header or the http-only cookie named
//! [`TOKEN_COOKIE`]; expiry is checked with zero leeway so
//! password-change invalidation has a crisp boundary.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{Error, Result};

/// Name of the http-only cookie carrying the token
pub const TOKEN_COOKIE: &str = "jwt";

/// Claims carried by every credential token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's document id
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|_| Error::InvalidToken)
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.iat, 0).unwrap_or_else(Utc::now)
    }
}

/// Signing and verification keys for credential tokens
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenKeys {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.token_secret.as_bytes(),
            Duration::hours(config.token_ttl_hours),
        )
    }

    /// Issue a token for a user id
    pub fn sign(&self, user_id: &Uuid) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Verify a token and return its claims
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(ttl: Duration) -> TokenKeys {
        TokenKeys::new(b"test-secret", ttl)
    }

    #[test]
    fn sign_and_verify_roundtrip() {
        let keys = keys(Duration::hours(1));
        let user_id = Uuid::now_v7();
        let token = keys.sign(&user_id).unwrap();

        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), user_id);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn expired_token_surfaces_expired_kind() {
        let keys = keys(Duration::hours(-1));
        let token = keys.sign(&Uuid::now_v7()).unwrap();
        let err = keys.verify(&token).unwrap_err();
        assert!(matches!(err, Error::ExpiredToken));
    }

    #[test]
    fn wrong_secret_surfaces_invalid_kind() {
        let token = keys(Duration::hours(1)).sign(&Uuid::now_v7()).unwrap();
        let err = TokenKeys::new(b"other-secret", Duration::hours(1))
            .verify(&token)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidToken));
    }

    #[test]
    fn garbage_subject_is_an_invalid_token() {
        let claims = Claims {
            sub: "not-a-uuid".to_string(),
            iat: 0,
            exp: 0,
        };
        assert!(matches!(claims.user_id(), Err(Error::InvalidToken)));
    }
}
