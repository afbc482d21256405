//! Authentication Middleware
//!
//! Resolves the caller's user identity before a WebSocket upgrade.
//!
//! Tokens are issued upstream by the chat service; this service only
//! verifies them through an [`Authenticator`].

use axum::{
    extract::{Query, Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, errors::ErrorKind, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;
use crate::startup::AppState;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at time (Unix timestamp)
    pub iat: i64,
    /// Account type assigned by the chat service ("user", "superadmin")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<String>,
}

/// Authenticated user extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i64,
    pub user_type: Option<String>,
}

/// Authentication failures
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing access token")]
    MissingToken,

    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid token claims")]
    InvalidClaims,
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        AppError::Unauthorized(e.to_string())
    }
}

/// Upstream authentication collaborator.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, token: &str) -> Result<AuthUser, AuthError>;
}

/// HS256 JWT verifier sharing its secret with the token issuer.
pub struct JwtAuthenticator {
    key: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticator {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        }
    }
}

impl Authenticator for JwtAuthenticator {
    fn authenticate(&self, token: &str) -> Result<AuthUser, AuthError> {
        let token_data =
            decode::<Claims>(token, &self.key, &self.validation).map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken,
            })?;

        let user_id = token_data
            .claims
            .sub
            .parse()
            .map_err(|_| AuthError::InvalidClaims)?;

        Ok(AuthUser {
            user_id,
            user_type: token_data.claims.user_type,
        })
    }
}

/// Query string accepted on the upgrade request.
#[derive(Debug, Default, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Pull the access token from `Authorization: Bearer` or the `token` query parameter.
///
/// Browsers cannot set headers on a WebSocket upgrade, hence the query fallback.
fn extract_token(request: &Request) -> Option<String> {
    let from_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_owned);

    from_header.or_else(|| {
        Query::<TokenQuery>::try_from_uri(request.uri())
            .ok()
            .and_then(|Query(q)| q.token)
            .filter(|t| !t.is_empty())
    })
}

/// Authentication middleware that resolves the caller's identity
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(&request).ok_or(AuthError::MissingToken)?;

    let user = state.authenticator.authenticate(&token).map_err(|e| {
        tracing::debug!(error = %e, "Rejected upgrade request");
        e
    })?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}
