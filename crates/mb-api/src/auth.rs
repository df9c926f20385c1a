use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use clap::ValueEnum;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::error::ApiError;

const API_KEY_HEADER: &str = "x-api-key";

/// Subject recorded for trusted service callers holding the shared key.
/// User-facing deployments run in `jwt` mode instead, where the subject is
/// the token's `sub` claim.
const SERVICE_SUBJECT: &str = "api_key";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum AuthMode {
    ApiKey,
    Jwt,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub api_key: Option<String>,
    pub jwt_secret: Option<String>,
}

/// Authenticated caller of a protected route. The subject names who acted:
/// the admission handlers pass it through as the origin on usage records, so
/// quota consumption stays attributable per caller.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub subject: String,
}

impl AuthUser {
    fn service() -> Self {
        Self {
            subject: SERVICE_SUBJECT.to_string(),
        }
    }

    fn session(subject: String) -> Self {
        Self { subject }
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
}

impl AuthConfig {
    fn authenticate(&self, parts: &Parts) -> Result<AuthUser, ApiError> {
        match self.mode {
            AuthMode::ApiKey => self.verify_api_key(parts),
            AuthMode::Jwt => self.verify_bearer(parts),
        }
    }

    fn verify_api_key(&self, parts: &Parts) -> Result<AuthUser, ApiError> {
        let expected = self
            .api_key
            .as_deref()
            .ok_or_else(|| ApiError::Unauthorized("missing MB_API_KEY".into()))?;

        let provided = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing X-API-Key header".into()))?;

        if provided != expected {
            return Err(ApiError::Unauthorized("invalid API key".into()));
        }

        Ok(AuthUser::service())
    }

    fn verify_bearer(&self, parts: &Parts) -> Result<AuthUser, ApiError> {
        let secret = self
            .jwt_secret
            .as_deref()
            .ok_or_else(|| ApiError::Unauthorized("missing JWT_SECRET".into()))?;

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::Unauthorized("expected Bearer token".into()))?;

        // Validation::new requires and checks `exp`, so stale tokens fail here.
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|err| ApiError::Unauthorized(format!("invalid token: {err}")))?;

        Ok(AuthUser::session(data.claims.sub))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    AuthConfig: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        AuthConfig::from_ref(state).authenticate(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn parts_with(header: &str, value: &str) -> Parts {
        Request::builder()
            .header(header, value)
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    fn key_config(key: &str) -> AuthConfig {
        AuthConfig {
            mode: AuthMode::ApiKey,
            api_key: Some(key.to_string()),
            jwt_secret: None,
        }
    }

    fn jwt_config(secret: &str) -> AuthConfig {
        AuthConfig {
            mode: AuthMode::Jwt,
            api_key: None,
            jwt_secret: Some(secret.to_string()),
        }
    }

    fn unix_now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64
    }

    fn token(secret: &str, sub: &str, exp: i64) -> String {
        encode(
            &Header::default(),
            &json!({ "sub": sub, "exp": exp }),
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn api_key_mode_tags_the_caller_as_service() {
        let config = key_config("sekrit");
        let user = config
            .authenticate(&parts_with("x-api-key", "sekrit"))
            .unwrap();
        assert_eq!(user.subject, "api_key");
    }

    #[test]
    fn api_key_mode_rejects_a_wrong_key() {
        let config = key_config("sekrit");
        let err = config
            .authenticate(&parts_with("x-api-key", "guess"))
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[test]
    fn jwt_mode_carries_the_subject_claim() {
        let config = jwt_config("signing-secret");
        let future = unix_now() + 600;
        let bearer = format!("Bearer {}", token("signing-secret", "cand-7", future));

        let user = config
            .authenticate(&parts_with("authorization", &bearer))
            .unwrap();
        assert_eq!(user.subject, "cand-7");
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let config = jwt_config("signing-secret");
        let past = unix_now() - 600;
        let bearer = format!("Bearer {}", token("signing-secret", "cand-7", past));

        let err = config
            .authenticate(&parts_with("authorization", &bearer))
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }
}
