//! JWT token service
//!
//! Generates, validates and parses the bearer tokens returned by
//! `/api/auth/register` and `/api/auth/login`.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const ISSUER: &str = "techshop-server";
const AUDIENCE: &str = "techshop-clients";

/// Claims stored in the token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID (subject)
    pub sub: String,
    /// User email
    pub email: String,
    /// Role name ("user" | "admin")
    pub role: String,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued-at timestamp
    pub iat: i64,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
}

/// JWT errors
#[derive(Error, Debug)]
pub enum JwtError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    ExpiredToken,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Token generation failed: {0}")]
    GenerationFailed(String),
}

/// JWT token service
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_minutes: i64,
}

impl JwtService {
    pub fn new(secret: &str, expiration_minutes: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_minutes,
        }
    }

    /// Generate a token for a user
    pub fn generate_token(
        &self,
        user_id: &str,
        email: &str,
        role: &str,
    ) -> Result<String, JwtError> {
        let now = Utc::now();
        let expiration = now + Duration::minutes(self.expiration_minutes);

        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            role: role.to_string(),
            exp: expiration.timestamp(),
            iat: now.timestamp(),
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| JwtError::GenerationFailed(e.to_string()))
    }

    /// Validate and decode a token
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[AUDIENCE]);
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["sub", "exp", "iat", "iss", "aud"]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::ExpiredToken,
                ErrorKind::InvalidSignature => JwtError::InvalidSignature,
                ErrorKind::InvalidToken => JwtError::InvalidToken(e.to_string()),
                _ => JwtError::InvalidToken(format!("Token validation failed: {}", e)),
            }
        })?;

        Ok(token_data.claims)
    }

    /// Extract the token from an Authorization header value
    pub fn extract_from_header(header: &str) -> Option<&str> {
        header.strip_prefix("Bearer ")
    }
}

/// Current user context, resolved by the auth middleware
///
/// Built from validated claims plus a fresh user lookup, so a deleted
/// account cannot keep using an old token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
}

impl CurrentUser {
    /// Admin role grants cross-user read/write
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new("unit-test-secret-at-least-32-bytes!!", 60)
    }

    #[test]
    fn test_jwt_generation_and_validation() {
        let service = service();

        let token = service
            .generate_token("user123", "john@example.com", "user")
            .expect("Failed to generate test token");

        let claims = service
            .validate_token(&token)
            .expect("Failed to validate test token");

        assert_eq!(claims.sub, "user123");
        assert_eq!(claims.email, "john@example.com");
        assert_eq!(claims.role, "user");
        assert_eq!(claims.iss, ISSUER);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = service()
            .generate_token("user123", "john@example.com", "user")
            .expect("Failed to generate test token");

        let other = JwtService::new("another-secret-also-32-bytes-long!!!", 60);
        assert!(matches!(
            other.validate_token(&token),
            Err(JwtError::InvalidSignature)
        ));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let expired = JwtService::new("unit-test-secret-at-least-32-bytes!!", -10);
        let token = expired
            .generate_token("user123", "john@example.com", "user")
            .expect("Failed to generate test token");

        assert!(matches!(
            service().validate_token(&token),
            Err(JwtError::ExpiredToken)
        ));
    }

    #[test]
    fn test_extract_from_header() {
        assert_eq!(
            JwtService::extract_from_header("Bearer abc.def.ghi"),
            Some("abc.def.ghi")
        );
        assert_eq!(JwtService::extract_from_header("Basic abc"), None);
    }

    #[test]
    fn test_admin_check() {
        let admin = CurrentUser {
            id: "1".to_string(),
            name: "Admin".to_string(),
            email: "admin@example.com".to_string(),
            role: "admin".to_string(),
        };
        let user = CurrentUser {
            role: "user".to_string(),
            ..admin.clone()
        };

        assert!(admin.is_admin());
        assert!(!user.is_admin());
    }
}
