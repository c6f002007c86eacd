/// Admin endpoints: user lifecycle
///
/// # Endpoints
///
/// - `GET /v1/admin/users` - Directory of all users with manager names
/// - `GET /v1/admin/users/stream` - Live directory over SSE
/// - `POST /v1/admin/users` - Create identity and profile
/// - `DELETE /v1/admin/users/:id` - Delete user, their tasks, and identity
/// - `POST /v1/admin/users/:id/toggle-role` - Swap Manager and User

use crate::{app::AppState, error::ApiResult, routes::stream::sse};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, Sse},
    Extension, Json,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use teamtasks_shared::auth::middleware::AuthContext;
use teamtasks_shared::models::{Role, UnrecognizedProfile, UserDirectory, UserProfile};
use teamtasks_shared::services::{AdminDashboard, NewUser};
use uuid::Uuid;
use validator::Validate;

/// One directory row
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    #[serde(flatten)]
    pub profile: UserProfile,

    /// Resolved manager name; "Unknown" when the link is dangling
    pub manager_name: Option<String>,
}

/// Directory response
#[derive(Debug, Serialize)]
pub struct DirectoryResponse {
    pub users: Vec<DirectoryEntry>,

    /// Candidates for the manager picker
    pub managers: Vec<UserProfile>,

    /// Accounts whose stored profile does not decode; deletable only
    pub unrecognized: Vec<UnrecognizedProfile>,
}

impl From<UserDirectory> for DirectoryResponse {
    fn from(directory: UserDirectory) -> Self {
        let users = directory
            .users
            .iter()
            .map(|user| DirectoryEntry {
                profile: user.clone(),
                manager_name: directory.manager_name(user).map(str::to_string),
            })
            .collect();

        Self {
            users,
            managers: directory.managers,
            unrecognized: directory.unrecognized,
        }
    }
}

/// Create user request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: String,

    pub email: String,

    pub password: String,

    pub role: Role,

    #[serde(default)]
    pub manager_id: Option<Uuid>,
}

/// Create user response
#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    pub message: String,
    pub user: UserProfile,
}

/// Delete user response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteUserResponse {
    pub message: String,
    pub tasks_removed: usize,
}

/// Toggle role response
#[derive(Debug, Serialize)]
pub struct ToggleRoleResponse {
    pub message: String,
    pub role: Role,
}

/// Lists every user
pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<DirectoryResponse>> {
    let dashboard = AdminDashboard::open(&state.backend, auth.user_id).await?;
    let directory = dashboard.directory().await?;

    Ok(Json(directory.into()))
}

/// Streams the directory
///
/// Emits a `users` event with the full directory on connect and on every
/// change to the `users` collection.
pub async fn stream_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let dashboard = AdminDashboard::open(&state.backend, auth.user_id).await?;
    let live = dashboard.watch_directory().await?;

    tracing::info!(admin_id = %auth.user_id, "Streaming user directory");
    Ok(sse(live.into_stream().map(DirectoryResponse::from), "users"))
}

/// Creates a user
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Blank field, malformed email, weak password,
///   or a manager id that is not a manager
/// - `409 Conflict`: Email already in use
/// - `500 Internal Server Error`: Profile write failed (identity rolled back)
pub async fn create_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<CreateUserResponse>)> {
    req.validate()?;

    let dashboard = AdminDashboard::open(&state.backend, auth.user_id).await?;
    let user = dashboard
        .create_user(NewUser {
            name: req.name,
            email: req.email,
            password: req.password,
            role: req.role,
            manager_id: req.manager_id,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateUserResponse {
            message: "User added successfully.".to_string(),
            user,
        }),
    ))
}

/// Deletes a user
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<DeleteUserResponse>> {
    let dashboard = AdminDashboard::open(&state.backend, auth.user_id).await?;
    let deleted = dashboard.delete_user(user_id).await?;

    Ok(Json(DeleteUserResponse {
        message: "User deleted successfully.".to_string(),
        tasks_removed: deleted.tasks_removed,
    }))
}

/// Swaps a user between Manager and User
pub async fn toggle_role(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<ToggleRoleResponse>> {
    let dashboard = AdminDashboard::open(&state.backend, auth.user_id).await?;
    let role = dashboard.toggle_role(user_id).await?;

    Ok(Json(ToggleRoleResponse {
        message: format!("User role updated to {}.", role),
        role,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str, role: Role, manager_id: Option<Uuid>) -> UserProfile {
        UserProfile {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@x.com", name.to_lowercase()),
            role,
            manager_id,
            expo_push_token: String::new(),
        }
    }

    #[test]
    fn test_directory_entries_carry_manager_names() {
        let mia = profile("Mia", Role::Manager, None);
        let sam = profile("Sam", Role::User, Some(mia.id));
        let lost = profile("Lost", Role::User, Some(Uuid::new_v4()));

        let response =
            DirectoryResponse::from(UserDirectory::from_users(vec![mia.clone(), sam, lost]));
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["users"][0]["managerName"], serde_json::Value::Null);
        assert_eq!(json["users"][1]["managerName"], "Mia");
        assert_eq!(json["users"][2]["managerName"], "Unknown");
        assert_eq!(json["users"][1]["role"], "User");
        assert_eq!(json["managers"].as_array().unwrap().len(), 1);
    }
}
