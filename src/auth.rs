//! Bearer-token authentication for the REST surface.
//!
//! Every protected handler takes an [`AuthUser`] extractor argument. The
//! extractor reads the `Authorization` header, verifies the HS256 signature
//! against the configured secret, and rejects expired or malformed tokens
//! before the handler body runs.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::api::ApiError;
use crate::config::get_config;

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Stable user identifier.
    pub id: String,
    /// Account email address.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
}

/// The authenticated caller, extracted from the request's bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

/// Verify a raw token string against `secret`.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|err| match err.kind() {
        ErrorKind::ExpiredSignature => ApiError::Unauthorized("Token has expired".into()),
        _ => ApiError::Unauthorized("Invalid token".into()),
    })
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".into()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("Invalid Authorization header".into()))?;

        let claims = verify_token(token, &get_config().jwt_secret)?;
        tracing::debug!(user_id = %claims.id, "Authenticated request");
        Ok(AuthUser(claims))
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::issue_token;
    use super::*;
    use crate::api::ApiError;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn valid_token_yields_claims() {
        let token = issue_token(SECRET, 3600);
        let claims = verify_token(&token, SECRET).expect("token verifies");
        assert_eq!(claims.id, "user-1");
        assert_eq!(claims.email, "student@example.com");
    }

    #[test]
    fn expired_token_is_rejected_with_specific_message() {
        let token = issue_token(SECRET, -3600);
        let err = verify_token(&token, SECRET).expect_err("token must be rejected");
        match err {
            ApiError::Unauthorized(msg) => assert_eq!(msg, "Token has expired"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_token("some-other-secret", 3600);
        let err = verify_token(&token, SECRET).expect_err("token must be rejected");
        match err {
            ApiError::Unauthorized(msg) => assert_eq!(msg, "Invalid token"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn garbage_token_is_rejected() {
        let err = verify_token("not-a-jwt", SECRET).expect_err("token must be rejected");
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }
}
