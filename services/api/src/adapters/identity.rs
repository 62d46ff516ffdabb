//! services/api/src/adapters/identity.rs
//!
//! Verifies HS256 bearer tokens issued by the authentication layer and turns
//! their claims into a `Caller`. Implements the `IdentityService` port.

use async_trait::async_trait;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use threadboard_core::domain::Caller;
use threadboard_core::ports::{IdentityService, PortError, PortResult};
use tracing::warn;

/// Allowed clock skew between the token issuer and this service, in seconds.
const CLOCK_SKEW_SECS: u64 = 300;

/// The claims this service reads from a bearer token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email_verified: bool,
    pub exp: usize,
}

#[derive(Clone)]
pub struct JwtIdentityAdapter {
    key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityAdapter {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = CLOCK_SKEW_SECS;
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl IdentityService for JwtIdentityAdapter {
    async fn verify_token(&self, token: &str) -> PortResult<Caller> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => warn!("Bearer token has expired"),
                ErrorKind::InvalidSignature => warn!("Bearer token has an invalid signature"),
                _ => warn!("Bearer token rejected: {}", e),
            }
            PortError::Unauthorized
        })?;

        if data.claims.sub.is_empty() {
            warn!("Bearer token has an empty subject");
            return Err(PortError::Unauthorized);
        }
        Ok(Caller::new(data.claims.sub, data.claims.email_verified))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret";

    fn token(secret: &str, sub: &str, email_verified: bool, expires_in: Duration) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            email_verified,
            exp: (Utc::now() + expires_in).timestamp() as usize,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn valid_token_resolves_to_caller() {
        let adapter = JwtIdentityAdapter::new(SECRET);
        let caller = adapter
            .verify_token(&token(SECRET, "U1", true, Duration::hours(1)))
            .await
            .unwrap();
        assert_eq!(caller, Caller::new("U1", true));
    }

    #[tokio::test]
    async fn missing_verification_claim_means_unverified() {
        let claims = serde_json::json!({
            "sub": "U2",
            "exp": (Utc::now() + Duration::hours(1)).timestamp(),
        });
        let raw = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        let caller = JwtIdentityAdapter::new(SECRET).verify_token(&raw).await.unwrap();
        assert!(!caller.email_verified);
    }

    #[tokio::test]
    async fn wrong_secret_is_unauthorized() {
        let adapter = JwtIdentityAdapter::new(SECRET);
        let result = adapter
            .verify_token(&token("other-secret", "U1", true, Duration::hours(1)))
            .await;
        assert!(matches!(result, Err(PortError::Unauthorized)));
    }

    #[tokio::test]
    async fn expired_token_is_unauthorized() {
        let adapter = JwtIdentityAdapter::new(SECRET);
        let result = adapter
            .verify_token(&token(SECRET, "U1", true, Duration::hours(-2)))
            .await;
        assert!(matches!(result, Err(PortError::Unauthorized)));
    }

    #[tokio::test]
    async fn garbage_is_unauthorized() {
        let adapter = JwtIdentityAdapter::new(SECRET);
        assert!(matches!(
            adapter.verify_token("not.a.jwt").await,
            Err(PortError::Unauthorized)
        ));
    }
}
