/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /v1/auth/login` - Sign in and learn which dashboard to open
/// - `POST /v1/auth/refresh` - Exchange a refresh token for a new access token
/// - `POST /v1/auth/logout` - End the current session

use crate::{
    app::AppState,
    error::ApiResult,
    routes::MessageResponse,
};
use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use teamtasks_shared::auth::identity::Session;
use teamtasks_shared::auth::middleware::AuthContext;
use teamtasks_shared::models::{Role, UserProfile};
use teamtasks_shared::services::router;
use validator::Validate;

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Session tokens
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    /// Access token (24h)
    pub access_token: String,

    /// Refresh token (30d)
    pub refresh_token: String,

    /// Access token expiry
    pub expires_at: DateTime<Utc>,
}

impl From<Session> for TokenResponse {
    fn from(session: Session) -> Self {
        Self {
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            expires_at: session.expires_at,
        }
    }
}

/// Login response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// Dashboard to open
    pub dashboard: Role,

    /// Signed-in user's profile
    pub profile: UserProfile,

    #[serde(flatten)]
    pub tokens: TokenResponse,
}

/// Refresh token request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Login endpoint
///
/// Authenticates the user, loads their profile, and reports the dashboard
/// matching their role.
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/login
/// Content-Type: application/json
///
/// {
///   "email": "u@x.com",
///   "password": "pw123456"
/// }
/// ```
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Validation failed
/// - `401 Unauthorized`: Invalid credentials
/// - `403 Forbidden`: Profile carries an unrecognized role
/// - `404 Not Found`: No profile for this identity
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    req.validate()?;

    let signed_in = router::sign_in(&state.backend, &req.email, &req.password).await?;

    Ok(Json(LoginResponse {
        dashboard: signed_in.dashboard.role(),
        profile: signed_in.dashboard.profile().clone(),
        tokens: signed_in.session.into(),
    }))
}

/// Token refresh endpoint
///
/// The session id is kept, so signing out later still revokes the pair.
///
/// # Errors
///
/// - `401 Unauthorized`: Refresh token invalid, expired, or revoked
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let session = state
        .backend
        .identities
        .refresh_session(&req.refresh_token)
        .await?;

    tracing::debug!(user_id = %session.identity_id, "Session refreshed");
    Ok(Json(session.into()))
}

/// Logout endpoint
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<MessageResponse>> {
    router::sign_out(&state.backend, &auth.access_token).await?;

    Ok(Json(MessageResponse::new("Logged out successfully.")))
}
