//! Bearer-token verification against the identity provider's JWKS, plus the
//! per-route permission check.
//!
//! The `authenticate` middleware runs once per request, verifies the token and
//! stores the decoded [`Claims`] in request extensions; handlers then call
//! [`Claims::require`] with the permission string for their route.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::{AppState, error::ApiError};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Authorization header is expected.")]
    MissingHeader,
    #[error("Authorization header must be a bearer token.")]
    MalformedHeader,
    #[error("Unable to find the appropriate key.")]
    UnknownKey,
    #[error("Token expired.")]
    TokenExpired,
    #[error("Incorrect claims. Please check the audience and issuer.")]
    InvalidClaims,
    #[error("Unable to parse authentication token.")]
    InvalidToken,
    #[error("Permissions not included in JWT.")]
    PermissionsMissing,
    #[error("Permission not found.")]
    Forbidden,
    #[error("failed to fetch signing keys: {0}")]
    KeyFetch(#[from] reqwest::Error),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingHeader
            | AuthError::MalformedHeader
            | AuthError::UnknownKey
            | AuthError::TokenExpired
            | AuthError::InvalidClaims
            | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::PermissionsMissing => StatusCode::BAD_REQUEST,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::KeyFetch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Decoded token payload. `permissions` stays optional so that a token
/// lacking the claim entirely is distinguishable from an empty list.
#[derive(Clone, Debug, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Claims {
    pub fn require(&self, permission: &str) -> Result<(), AuthError> {
        let permissions = self.permissions.as_ref().ok_or(AuthError::PermissionsMissing)?;
        if !permissions.iter().any(|p| p == permission) {
            return Err(AuthError::Forbidden);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize)]
struct Jwk {
    kid: String,
    n: String,
    e: String,
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

/// Verifies RS256 bearer tokens against the provider's published key set.
///
/// Keys are cached in-process; an unrecognized `kid` triggers one refetch to
/// pick up rotated keys before the token is rejected.
#[derive(Clone)]
pub struct TokenVerifier {
    http: reqwest::Client,
    jwks_url: String,
    issuer: String,
    audience: String,
    keys: Arc<RwLock<Vec<Jwk>>>,
    #[cfg(test)]
    static_keys: bool,
}

impl TokenVerifier {
    pub fn new(http: reqwest::Client, domain: &str, audience: &str) -> Self {
        Self {
            http,
            jwks_url: format!("https://{domain}/.well-known/jwks.json"),
            issuer: format!("https://{domain}/"),
            audience: audience.to_string(),
            keys: Arc::new(RwLock::new(Vec::new())),
            #[cfg(test)]
            static_keys: false,
        }
    }

    /// Verifier preloaded with a fixed key, never touching the network.
    #[cfg(test)]
    pub fn with_static_key(domain: &str, audience: &str, kid: &str, n: &str, e: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            jwks_url: String::new(),
            issuer: format!("https://{domain}/"),
            audience: audience.to_string(),
            keys: Arc::new(RwLock::new(vec![Jwk {
                kid: kid.to_string(),
                n: n.to_string(),
                e: e.to_string(),
            }])),
            static_keys: true,
        }
    }

    pub async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let header = decode_header(token).map_err(|_| AuthError::InvalidToken)?;
        let kid = header.kid.ok_or(AuthError::InvalidToken)?;

        let key = match self.find_key(&kid).await {
            Some(key) => key,
            None => {
                self.refresh().await?;
                self.find_key(&kid).await.ok_or(AuthError::UnknownKey)?
            }
        };

        let decoding_key =
            DecodingKey::from_rsa_components(&key.n, &key.e).map_err(|_| AuthError::UnknownKey)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.issuer]);

        let data = decode::<Claims>(token, &decoding_key, &validation).map_err(|err| {
            use jsonwebtoken::errors::ErrorKind;
            match err.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                ErrorKind::InvalidAudience | ErrorKind::InvalidIssuer => AuthError::InvalidClaims,
                _ => AuthError::InvalidToken,
            }
        })?;

        Ok(data.claims)
    }

    async fn find_key(&self, kid: &str) -> Option<Jwk> {
        self.keys.read().await.iter().find(|k| k.kid == kid).cloned()
    }

    async fn refresh(&self) -> Result<(), AuthError> {
        #[cfg(test)]
        if self.static_keys {
            return Ok(());
        }

        let jwks: Jwks = self
            .http
            .get(&self.jwks_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        tracing::debug!(keys = jwks.keys.len(), "refreshed signing key set");
        *self.keys.write().await = jwks.keys;
        Ok(())
    }
}

/// Extracts the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers.get(AUTHORIZATION).ok_or(AuthError::MissingHeader)?;
    let value = value.to_str().map_err(|_| AuthError::MalformedHeader)?;

    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(AuthError::MalformedHeader),
    }
}

/// Router-level middleware: verify the bearer token and expose [`Claims`] to
/// handlers through request extensions.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())?.to_string();
    let claims = state.verifier.verify(&token).await?;
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;
    use crate::testutil;

    fn headers(value: Option<&str>) -> HeaderMap {
        let mut map = HeaderMap::new();
        if let Some(v) = value {
            map.insert(AUTHORIZATION, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    #[test]
    fn bearer_token_missing_header() {
        assert!(matches!(bearer_token(&headers(None)), Err(AuthError::MissingHeader)));
    }

    #[test]
    fn bearer_token_rejects_other_schemes_and_shapes() {
        for value in ["Basic abc", "Bearer", "Bearer a b", "abc"] {
            assert!(
                matches!(bearer_token(&headers(Some(value))), Err(AuthError::MalformedHeader)),
                "accepted {value:?}"
            );
        }
    }

    #[test]
    fn bearer_token_is_case_insensitive_on_scheme() {
        assert_eq!(bearer_token(&headers(Some("bearer tok"))).unwrap(), "tok");
        assert_eq!(bearer_token(&headers(Some("Bearer tok"))).unwrap(), "tok");
    }

    #[test]
    fn require_fails_without_permissions_claim() {
        let claims = Claims { permissions: None, extra: Default::default() };
        assert!(matches!(claims.require("view:movies"), Err(AuthError::PermissionsMissing)));
    }

    #[test]
    fn require_fails_when_permission_absent() {
        let claims = Claims {
            permissions: Some(vec!["view:actors".to_string()]),
            extra: Default::default(),
        };
        assert!(matches!(claims.require("view:movies"), Err(AuthError::Forbidden)));
    }

    #[test]
    fn require_accepts_member_permission() {
        let claims = Claims {
            permissions: Some(vec!["view:movies".to_string(), "post:movies".to_string()]),
            extra: Default::default(),
        };
        assert!(claims.require("post:movies").is_ok());
    }

    #[tokio::test]
    async fn verify_accepts_valid_token() {
        let verifier = testutil::verifier();
        let claims = verifier.verify(&testutil::token(&["view:movies"])).await.unwrap();
        assert_eq!(claims.permissions.unwrap(), vec!["view:movies"]);
    }

    #[tokio::test]
    async fn verify_rejects_expired_token() {
        let verifier = testutil::verifier();
        let err = verifier.verify(&testutil::expired_token(&["view:movies"])).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired));
    }

    #[tokio::test]
    async fn verify_rejects_wrong_audience() {
        let verifier = testutil::verifier();
        let token = testutil::token_with_audience("another-api", &["view:movies"]);
        assert!(matches!(verifier.verify(&token).await.unwrap_err(), AuthError::InvalidClaims));
    }

    #[tokio::test]
    async fn verify_rejects_unknown_kid() {
        let verifier = testutil::verifier();
        let token = testutil::token_with_kid("rotated-away", &["view:movies"]);
        assert!(matches!(verifier.verify(&token).await.unwrap_err(), AuthError::UnknownKey));
    }

    #[tokio::test]
    async fn verify_rejects_garbage() {
        let verifier = testutil::verifier();
        assert!(matches!(
            verifier.verify("not-a-jwt").await.unwrap_err(),
            AuthError::InvalidToken
        ));
    }
}
