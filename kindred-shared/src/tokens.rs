use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::errors::{AppError, AppResult, ErrorCode};
use crate::types::auth::{Claims, TokenPair, UserRole};

/// Mints and validates HS256 access tokens and opaque refresh tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl TokenIssuer {
    pub fn new(secret: &str, access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    pub fn refresh_ttl_secs(&self) -> i64 {
        self.refresh_ttl_secs
    }

    pub fn create_access_token(&self, user_id: i64, role: UserRole) -> AppResult<String> {
        let claims = Claims::new(user_id, role, self.access_ttl_secs);
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::internal(format!("failed to encode token: {e}")))
    }

    /// Returns the pair handed to the client plus the refresh token hash to persist.
    pub fn create_token_pair(&self, user_id: i64, role: UserRole) -> AppResult<(TokenPair, String)> {
        let access = self.create_access_token(user_id, role)?;
        let refresh = create_refresh_token();
        let refresh_hash = hash_token(&refresh);
        Ok((TokenPair::new(access, refresh, self.access_ttl_secs), refresh_hash))
    }

    pub fn validate(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                AppError::new(ErrorCode::TokenExpired, "token has expired")
            }
            _ => AppError::new(ErrorCode::TokenInvalid, "invalid token"),
        })?;

        if data.claims.is_expired() {
            return Err(AppError::new(ErrorCode::TokenExpired, "token has expired"));
        }
        Ok(data.claims)
    }
}

pub fn create_refresh_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_token_round_trip() {
        let issuer = TokenIssuer::new("test-secret", 3600, 86400);
        let token = issuer.create_access_token(42, UserRole::Admin).unwrap();
        let claims = issuer.validate(&token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, UserRole::Admin);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = TokenIssuer::new("one", 3600, 60).create_access_token(1, UserRole::User).unwrap();
        let err = TokenIssuer::new("two", 3600, 60).validate(&token).unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::TokenInvalid));
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = TokenIssuer::new("secret", -120, 60);
        let token = issuer.create_access_token(7, UserRole::User).unwrap();
        let err = issuer.validate(&token).unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::TokenExpired));
    }

    #[test]
    fn garbage_token_is_invalid() {
        let issuer = TokenIssuer::new("secret", 60, 60);
        assert!(issuer.validate("mock_jwt_token").is_err());
    }

    #[test]
    fn refresh_tokens_are_random_hex() {
        let a = create_refresh_token();
        let b = create_refresh_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert_eq!(hash_token(&a), hash_token(&a));
        assert_ne!(hash_token(&a), a);
    }
}
