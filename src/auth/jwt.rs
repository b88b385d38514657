use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::shared::error::ApiError;
use crate::shared::models::User;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub company_id: String,
    pub branch_id: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn issue(user: &User, secret: &str, expiry_hours: i64) -> Result<String, ApiError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id.to_string(),
        role: user.role.clone(),
        company_id: user.company_id.clone(),
        branch_id: user.branch_id.clone(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(expiry_hours)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("token encode: {e}")))
}

pub fn verify(token: &str, secret: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::Unauthorized("Invalid or expired token".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_user() -> User {
        User {
            id: 7,
            name: "Alice Admin".to_string(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password: String::new(),
            role: "admin".to_string(),
            company_id: "C001".to_string(),
            branch_id: "B001".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn issue_then_verify_roundtrip() {
        let token = issue(&sample_user(), SECRET, 24).unwrap();
        let claims = verify(&token, SECRET).unwrap();
        assert_eq!(claims.sub, "7");
        assert_eq!(claims.role, "admin");
        assert_eq!(claims.company_id, "C001");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue(&sample_user(), SECRET, 24).unwrap();
        let err = verify(&token, "ffffffffffffffffffffffffffffffff").unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = issue(&sample_user(), SECRET, -1).unwrap();
        assert!(verify(&token, SECRET).is_err());
    }
}
