use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::debug;
use uuid::Uuid;

use tidings_types::api::Claims;

use crate::error::ApiError;
use crate::state::AppState;

pub fn create_session_token(
    secret: &str,
    user_id: Uuid,
    email: &str,
    ttl: Duration,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (Utc::now() + ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn verify_session_token(secret: &str, token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        debug!("Rejected session token: {}", e);
        ApiError::InvalidSession
    })
}

/// The signed-in user, taken from `Authorization: Bearer <jwt>`.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub email: String,
}

impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthenticated)?;

        let claims = verify_session_token(&state.jwt_secret, token.trim())?;
        Ok(Session {
            user_id: claims.sub,
            email: claims.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_identity() {
        let user = Uuid::new_v4();
        let token = create_session_token("s3cret", user, "u1@example.com", Duration::days(7)).unwrap();

        let claims = verify_session_token("s3cret", &token).unwrap();
        assert_eq!(claims.sub, user);
        assert_eq!(claims.email, "u1@example.com");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token =
            create_session_token("s3cret", Uuid::new_v4(), "u1@example.com", Duration::days(7)).unwrap();
        assert!(matches!(
            verify_session_token("other", &token),
            Err(ApiError::InvalidSession)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        // Past the default 60s leeway.
        let token =
            create_session_token("s3cret", Uuid::new_v4(), "u1@example.com", Duration::minutes(-5)).unwrap();
        assert!(matches!(
            verify_session_token("s3cret", &token),
            Err(ApiError::InvalidSession)
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            verify_session_token("s3cret", "not.a.jwt"),
            Err(ApiError::InvalidSession)
        ));
    }
}
