use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;

use crate::config::AppConfig;
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub session_id: Option<String>,
}

/// Verifies HS256 access tokens minted by the identity service
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    issuer: Option<String>,
    audience: String,
    clock_skew: std::time::Duration,
}

impl JwtVerifier {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
            clock_skew: config.auth_clock_skew,
        }
    }

    pub fn verify_access_token(&self, token: &str) -> Result<AuthenticatedUser, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        validation.leeway = self.clock_skew.as_secs();
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer.as_str()]);
        }

        let decoded = decode::<AccessClaims>(token, &self.key, &validation).map_err(|error| {
            AppError::unauthorized(format!("Token validation failed: {}", sanitize(&error)))
        })?;

        if !audience_matches(decoded.claims.aud.as_ref(), &self.audience) {
            return Err(AppError::unauthorized("Token audience is not allowed"));
        }
        if decoded.claims.sub.trim().is_empty() {
            return Err(AppError::unauthorized("Token subject is missing"));
        }
        validate_temporal_claims(&decoded.claims, self.clock_skew)?;

        Ok(AuthenticatedUser {
            user_id: decoded.claims.sub,
            session_id: decoded.claims.session_id.or(decoded.claims.jti),
        })
    }
}

pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let header = headers
        .get("authorization")
        .ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?
        .to_str()
        .map_err(|_| AppError::unauthorized("Authorization header is not valid UTF-8"))?;

    let (scheme, token) = header
        .split_once(' ')
        .ok_or_else(|| AppError::unauthorized("Authorization header must be `Bearer <token>`"))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AppError::unauthorized(
            "Authorization scheme must be `Bearer`",
        ));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::unauthorized("Bearer token is empty"));
    }

    Ok(token)
}

#[derive(Debug, Deserialize)]
struct AccessClaims {
    sub: String,
    aud: Option<Value>,
    exp: Option<i64>,
    iat: Option<i64>,
    nbf: Option<i64>,
    jti: Option<String>,
    session_id: Option<String>,
}

fn validate_temporal_claims(
    claims: &AccessClaims,
    clock_skew: std::time::Duration,
) -> Result<(), AppError> {
    let now = chrono::Utc::now().timestamp();
    let skew = i64::try_from(clock_skew.as_secs()).unwrap_or(0);

    let exp = claims
        .exp
        .ok_or_else(|| AppError::unauthorized("Token missing `exp` claim"))?;
    if exp <= now.saturating_sub(skew) {
        return Err(AppError::unauthorized("Token is expired"));
    }

    let iat = claims
        .iat
        .ok_or_else(|| AppError::unauthorized("Token missing `iat` claim"))?;
    if iat > now.saturating_add(skew) {
        return Err(AppError::unauthorized("Token `iat` is in the future"));
    }

    if let Some(nbf) = claims.nbf {
        if nbf > now.saturating_add(skew) {
            return Err(AppError::unauthorized("Token is not yet valid"));
        }
    }

    Ok(())
}

fn audience_matches(aud: Option<&Value>, expected: &str) -> bool {
    let Some(aud) = aud else {
        return false;
    };

    match aud {
        Value::String(value) => value == expected,
        Value::Array(values) => values
            .iter()
            .filter_map(Value::as_str)
            .any(|value| value == expected),
        _ => false,
    }
}

fn sanitize(error: &impl std::fmt::Display) -> String {
    error.to_string().replace('\n', " ").trim().to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use std::time::Duration;

    use super::*;

    pub(crate) const TEST_SECRET: &str = "test-secret-that-is-at-least-32-bytes";

    pub(crate) fn test_config() -> AppConfig {
        AppConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            database_path: ":memory:".into(),
            replica: None,
            jwt_secret: TEST_SECRET.to_string(),
            jwt_issuer: Some("https://id.example.com".to_string()),
            jwt_audience: "mobile".to_string(),
            auth_clock_skew: Duration::from_secs(30),
            scope_cache_ttl: Duration::ZERO,
        }
    }

    /// Sign `claims` with the test secret
    pub(crate) fn mint(claims: &Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap()
    }

    pub(crate) fn valid_claims(sub: &str) -> Value {
        let now = chrono::Utc::now().timestamp();
        json!({
            "sub": sub,
            "aud": "mobile",
            "iss": "https://id.example.com",
            "iat": now,
            "exp": now + 300,
        })
    }

    fn verifier() -> JwtVerifier {
        JwtVerifier::from_config(&test_config())
    }

    fn claims(exp: Option<i64>, iat: Option<i64>) -> AccessClaims {
        AccessClaims {
            sub: "user".to_string(),
            aud: Some(Value::String("mobile".to_string())),
            exp,
            iat,
            nbf: None,
            jti: None,
            session_id: None,
        }
    }

    #[test]
    fn bearer_token_extractor_accepts_standard_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );

        assert_eq!(extract_bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn bearer_token_extractor_rejects_wrong_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert!(extract_bearer_token(&headers).is_err());
    }

    #[test]
    fn verifier_accepts_valid_token() {
        let mut token_claims = valid_claims("tech-42");
        token_claims["jti"] = json!("session-1");

        let user = verifier().verify_access_token(&mint(&token_claims)).unwrap();
        assert_eq!(user.user_id, "tech-42");
        assert_eq!(user.session_id.as_deref(), Some("session-1"));
    }

    #[test]
    fn verifier_rejects_wrong_secret() {
        let token = encode(
            &Header::new(Algorithm::HS256),
            &valid_claims("tech-42"),
            &EncodingKey::from_secret(b"another-secret-of-sufficient-length!"),
        )
        .unwrap();
        assert!(verifier().verify_access_token(&token).is_err());
    }

    #[test]
    fn verifier_rejects_wrong_audience_and_issuer() {
        let mut wrong_audience = valid_claims("tech-42");
        wrong_audience["aud"] = json!("web");
        let err = verifier()
            .verify_access_token(&mint(&wrong_audience))
            .unwrap_err();
        assert!(err.to_string().contains("audience"));

        let mut wrong_issuer = valid_claims("tech-42");
        wrong_issuer["iss"] = json!("https://evil.example.com");
        assert!(verifier().verify_access_token(&mint(&wrong_issuer)).is_err());
    }

    #[test]
    fn verifier_rejects_blank_subject() {
        let err = verifier()
            .verify_access_token(&mint(&valid_claims("  ")))
            .unwrap_err();
        assert!(err.to_string().contains("subject"));
    }

    #[test]
    fn audience_matches_string_or_array() {
        assert!(audience_matches(
            Some(&Value::String("mobile".to_string())),
            "mobile"
        ));
        assert!(audience_matches(
            Some(&Value::Array(vec![
                Value::String("web".to_string()),
                Value::String("mobile".to_string())
            ])),
            "mobile"
        ));
        assert!(!audience_matches(None, "mobile"));
    }

    #[test]
    fn temporal_claims_require_exp_and_iat() {
        let err = validate_temporal_claims(&claims(None, None), Duration::from_secs(60))
            .unwrap_err();
        assert!(err.to_string().contains("missing `exp`"));
    }

    #[test]
    fn temporal_claims_reject_future_iat() {
        let now = chrono::Utc::now().timestamp();
        let err = validate_temporal_claims(
            &claims(Some(now + 300), Some(now + 120)),
            Duration::from_secs(30),
        )
        .unwrap_err();
        assert!(err.to_string().contains("future"));
    }
}
