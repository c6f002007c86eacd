/// Session authentication for Axum
///
/// Resolves the `Authorization: Bearer <token>` header of a request into an
/// [`AuthContext`] through the configured identity provider. The API's
/// middleware layer inserts the context into request extensions; handlers
/// extract it with `Extension<AuthContext>`.
///
/// # Example
///
/// ```no_run
/// use axum::Extension;
/// use teamtasks_shared::auth::middleware::AuthContext;
///
/// async fn handler(Extension(auth): Extension<AuthContext>) -> String {
///     format!("Hello, {}!", auth.user_id)
/// }
/// ```

use axum::http::{header, HeaderMap};
use uuid::Uuid;

use super::identity::{IdentityError, IdentityProvider};

/// Authentication context added to request extensions
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Authenticated user (identity and profile id)
    pub user_id: Uuid,

    /// Session the request belongs to
    pub session_id: Uuid,

    /// The bearer token presented
    pub access_token: String,
}

/// Error type for request authentication
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Missing authorization header
    #[error("Missing authorization header")]
    MissingCredentials,

    /// Invalid authorization header format
    #[error("{0}")]
    InvalidFormat(String),

    /// Session could not be verified
    #[error("{0}")]
    InvalidSession(#[from] IdentityError),
}

/// Extracts the bearer token from request headers
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))?;

    Ok(token)
}

/// Verifies the request's bearer token and builds its auth context
pub async fn authenticate(
    identities: &dyn IdentityProvider,
    headers: &HeaderMap,
) -> Result<AuthContext, AuthError> {
    let token = bearer_token(headers)?;
    let session = identities.verify_session(token).await?;

    Ok(AuthContext {
        user_id: session.identity_id,
        session_id: session.session_id,
        access_token: token.to_string(),
    })
}
