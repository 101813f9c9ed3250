use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ErrorMessage, HttpError},
    models::usermodel::UserRole,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub role: UserRole,
    pub iat: usize,
    pub exp: usize,
}

pub fn create_token(
    user_id: &str,
    role: UserRole,
    secret: &[u8],
    expires_in_minutes: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    if user_id.is_empty() {
        return Err(jsonwebtoken::errors::ErrorKind::InvalidSubject.into());
    }

    let now = Utc::now();
    let iat = now.timestamp() as usize;
    let exp = (now + Duration::minutes(expires_in_minutes)).timestamp() as usize;
    let claims = TokenClaims {
        sub: user_id.to_string(),
        role,
        iat,
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
}

pub fn decode_token<T: Into<String>>(token: T, secret: &[u8]) -> Result<TokenClaims, HttpError> {
    let decoded = decode::<TokenClaims>(
        &token.into(),
        &DecodingKey::from_secret(secret),
        &Validation::new(Algorithm::HS256),
    );

    match decoded {
        Ok(token) => Ok(token.claims),
        Err(_) => Err(HttpError::new(
            ErrorMessage::InvalidToken.to_string(),
            axum::http::StatusCode::UNAUTHORIZED,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    #[test]
    fn test_token_round_trip_keeps_role() {
        let token = create_token("4a3c1b1e-0000-0000-0000-000000000001", UserRole::Admin, SECRET, 5).unwrap();
        let claims = decode_token(token, SECRET).unwrap();
        assert_eq!(claims.sub, "4a3c1b1e-0000-0000-0000-000000000001");
        assert_eq!(claims.role, UserRole::Admin);
    }

    #[test]
    fn test_empty_subject_is_rejected() {
        assert!(create_token("", UserRole::ServiceProvider, SECRET, 5).is_err());
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = create_token("user", UserRole::ServiceProvider, SECRET, 5).unwrap();
        assert!(decode_token(token, b"other-secret").is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let token = create_token("user", UserRole::ServiceProvider, SECRET, -10).unwrap();
        assert!(decode_token(token, SECRET).is_err());
    }
}
