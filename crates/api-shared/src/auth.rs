//! Bearer-token identity.
//!
//! Protected routes sit behind [`require_bearer`], which verifies the `Authorization: Bearer`
//! credential with a [`TokenVerifier`] and stores the resulting [`AuthenticatedIdentity`] in the
//! request extensions. Handlers take the identity as an extractor and never see unauthenticated
//! requests.

use async_trait::async_trait;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Opaque subject identifier of a verified caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    pub subject: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingCredentials,
    #[error("invalid bearer token: {0}")]
    InvalidToken(String),
    #[error("token expired")]
    Expired,
    #[error("token signed with an unknown key")]
    UnknownKey,
    #[error("failed to fetch verification keys: {0}")]
    KeySet(String),
    #[error("token verification is not configured")]
    NotConfigured,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::KeySet(_) | AuthError::NotConfigured => {
                tracing::error!(error = %self, "token verification unavailable");
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::UNAUTHORIZED,
        };

        let mut response =
            (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// Verifies a bearer token and returns the caller's identity.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<AuthenticatedIdentity, AuthError>;
}

pub type SharedVerifier = Arc<dyn TokenVerifier>;

/// Verifies RS256 JWTs against a remote JSON Web Key Set.
///
/// The key set is fetched on first use and refetched once whenever a token names a key id that
/// is not in the cached set, which covers provider key rotation.
pub struct JwksVerifier {
    client: reqwest::Client,
    jwks_url: String,
    keys: RwLock<Option<JwkSet>>,
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
}

impl JwksVerifier {
    pub fn new(client: reqwest::Client, jwks_url: impl Into<String>) -> Self {
        Self {
            client,
            jwks_url: jwks_url.into(),
            keys: RwLock::new(None),
        }
    }

    async fn fetch_keys(&self) -> Result<JwkSet, AuthError> {
        tracing::debug!(url = %self.jwks_url, "fetching JWKS");
        self.client
            .get(&self.jwks_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AuthError::KeySet(e.to_string()))?
            .json::<JwkSet>()
            .await
            .map_err(|e| AuthError::KeySet(e.to_string()))
    }

    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        if let Some(keys) = self.keys.read().await.as_ref() {
            if let Some(jwk) = keys.find(kid) {
                return DecodingKey::from_jwk(jwk).map_err(|e| AuthError::InvalidToken(e.to_string()));
            }
        }

        let fresh = self.fetch_keys().await?;
        let key = fresh
            .find(kid)
            .map(|jwk| DecodingKey::from_jwk(jwk).map_err(|e| AuthError::InvalidToken(e.to_string())));
        *self.keys.write().await = Some(fresh);

        key.unwrap_or(Err(AuthError::UnknownKey))
    }
}

#[async_trait]
impl TokenVerifier for JwksVerifier {
    async fn verify(&self, token: &str) -> Result<AuthenticatedIdentity, AuthError> {
        let header = decode_header(token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        if header.alg != Algorithm::RS256 {
            return Err(AuthError::InvalidToken(format!(
                "unsupported token algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| AuthError::InvalidToken("token header has no key id".into()))?;

        let key = self.decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_aud = false;

        let data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => AuthError::InvalidToken(e.to_string()),
        })?;

        Ok(AuthenticatedIdentity {
            subject: data.claims.sub,
        })
    }
}

/// Rejects every token. Installed when no key-set URL is configured.
pub struct DenyAllVerifier;

#[async_trait]
impl TokenVerifier for DenyAllVerifier {
    async fn verify(&self, _token: &str) -> Result<AuthenticatedIdentity, AuthError> {
        Err(AuthError::NotConfigured)
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Require a valid bearer token.
///
/// On success inserts `AuthenticatedIdentity` into the request extensions; otherwise responds
/// with the `AuthError` and the inner service is never called.
pub async fn require_bearer(
    State(verifier): State<SharedVerifier>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = match bearer_token(req.headers()) {
        Some(token) => token.to_owned(),
        None => return AuthError::MissingCredentials.into_response(),
    };

    match verifier.verify(&token).await {
        Ok(identity) => {
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(err) => {
            tracing::debug!(error = %err, "rejected bearer token");
            err.into_response()
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedIdentity
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedIdentity>()
            .cloned()
            .ok_or(AuthError::MissingCredentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::routing::get;
    use axum::Router;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    struct StaticVerifier;

    #[async_trait]
    impl TokenVerifier for StaticVerifier {
        async fn verify(&self, token: &str) -> Result<AuthenticatedIdentity, AuthError> {
            match token {
                "good" => Ok(AuthenticatedIdentity {
                    subject: "user_123".into(),
                }),
                "old" => Err(AuthError::Expired),
                _ => Err(AuthError::InvalidToken("bad signature".into())),
            }
        }
    }

    async fn whoami(identity: AuthenticatedIdentity) -> String {
        identity.subject
    }

    fn app(verifier: SharedVerifier) -> Router {
        Router::new()
            .route("/me", get(whoami))
            .route_layer(axum::middleware::from_fn_with_state(verifier, require_bearer))
    }

    async fn call(verifier: SharedVerifier, auth: Option<&str>) -> (StatusCode, HeaderMap, String) {
        let mut builder = axum::http::Request::builder().uri("/me");
        if let Some(value) = auth {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        let response = app(verifier)
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, headers, String::from_utf8(body.to_vec()).unwrap())
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bearer  xyz "));
        assert_eq!(bearer_token(&headers), Some("xyz"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[tokio::test]
    async fn test_valid_token_reaches_handler_with_identity() {
        let (status, _, body) = call(Arc::new(StaticVerifier), Some("Bearer good")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "user_123");
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorised() {
        let (status, headers, body) = call(Arc::new(StaticVerifier), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(headers.get(header::WWW_AUTHENTICATE).unwrap(), "Bearer");
        assert_eq!(body, r#"{"error":"missing bearer token"}"#);
    }

    #[tokio::test]
    async fn test_rejected_tokens_are_unauthorised() {
        let (status, _, body) = call(Arc::new(StaticVerifier), Some("Bearer old")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, r#"{"error":"token expired"}"#);

        let (status, _, _) = call(Arc::new(StaticVerifier), Some("Bearer forged")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unconfigured_verifier_is_unavailable() {
        let (status, headers, _) = call(Arc::new(DenyAllVerifier), Some("Bearer good")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(headers.get(header::WWW_AUTHENTICATE).is_none());
    }

    #[tokio::test]
    async fn test_jwks_verifier_rejects_malformed_and_symmetric_tokens_offline() {
        // The key set URL is never contacted: both tokens fail header checks first.
        let verifier = JwksVerifier::new(reqwest::Client::new(), "http://127.0.0.1:9/jwks.json");

        let err = verifier.verify("not-a-jwt").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));

        let hs256 = jsonwebtoken::encode(
            &jsonwebtoken::Header::new(Algorithm::HS256),
            &serde_json::json!({"sub": "user_123", "exp": 4_102_444_800u64}),
            &jsonwebtoken::EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        let err = verifier.verify(&hs256).await.unwrap_err();
        assert_eq!(err.to_string(), "invalid bearer token: unsupported token algorithm HS256");
    }
}
