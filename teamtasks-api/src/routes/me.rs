/// Endpoints for the signed-in user
///
/// # Endpoints
///
/// - `GET /v1/me` - Own profile (any role)
/// - `PUT /v1/me/push-token` - Set or clear the push token (any role)
/// - `GET /v1/me/tasks` - Task board split into to-do and completed (User role)
/// - `GET /v1/me/tasks/stream` - Live task board over SSE (User role)
/// - `POST /v1/me/tasks` - Add a task to the own board (User role)

use crate::{app::AppState, error::ApiResult, routes::stream::sse};
use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, Sse},
    Extension, Json,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use teamtasks_shared::auth::middleware::AuthContext;
use teamtasks_shared::models::{Task, TaskBoard, UserProfile};
use teamtasks_shared::services::{self, router, UserDashboard};
use validator::Validate;

/// Push token request; a missing or empty token clears it
#[derive(Debug, Deserialize)]
pub struct PushTokenRequest {
    #[serde(default)]
    pub token: Option<String>,
}

/// Push token response
#[derive(Debug, Serialize)]
pub struct PushTokenResponse {
    pub message: String,
    pub profile: UserProfile,
}

/// Create task request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(max = 500, message = "Title must be at most 500 characters"))]
    pub title: String,
}

/// Returns the caller's profile
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<UserProfile>> {
    let dashboard = router::route(&state.backend, auth.user_id).await?;
    Ok(Json(dashboard.profile().clone()))
}

/// Registers the caller's push token
pub async fn register_push_token(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<PushTokenRequest>,
) -> ApiResult<Json<PushTokenResponse>> {
    let profile =
        services::register_push_token(&state.backend, auth.user_id, req.token.as_deref()).await?;

    let message = if profile.push_token().is_some() {
        "Push token registered."
    } else {
        "Push token cleared."
    };

    Ok(Json(PushTokenResponse {
        message: message.to_string(),
        profile,
    }))
}

/// Returns the caller's task board
pub async fn get_board(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<TaskBoard>> {
    let dashboard = UserDashboard::open(&state.backend, auth.user_id).await?;
    Ok(Json(dashboard.board().await?))
}

/// Streams the caller's task board
///
/// Emits a `board` event with the full board on connect and on every change.
pub async fn stream_board(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let dashboard = UserDashboard::open(&state.backend, auth.user_id).await?;
    let live = dashboard.watch_board().await?;

    tracing::info!(user_id = %auth.user_id, "Streaming task board");
    Ok(sse(live.into_stream(), "board"))
}

/// Adds a task to the caller's board
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Blank title
/// - `403 Forbidden`: Caller is not a `User`
pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    req.validate()?;

    let dashboard = UserDashboard::open(&state.backend, auth.user_id).await?;
    let task = dashboard.create_task(&req.title).await?;

    Ok((StatusCode::CREATED, Json(task)))
}
