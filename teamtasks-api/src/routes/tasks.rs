/// Task mutation endpoints
///
/// Shared by the Manager and User dashboards: the caller's role decides
/// which dashboard performs the change. Admins have no task rights.
///
/// # Endpoints
///
/// - `POST /v1/tasks/:id/toggle` - Flip completion
/// - `DELETE /v1/tasks/:id` - Delete

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::MessageResponse,
};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use teamtasks_shared::auth::middleware::AuthContext;
use teamtasks_shared::models::Task;
use teamtasks_shared::services::{router, Dashboard};
use uuid::Uuid;

fn admins_have_no_tasks() -> ApiError {
    ApiError::Forbidden("Admins cannot modify tasks".to_string())
}

/// Flips a task's completion flag
///
/// # Errors
///
/// - `403 Forbidden`: Caller is neither the owner nor the owner's manager
/// - `404 Not Found`: Task does not exist
pub async fn toggle_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<Task>> {
    let task = match router::route(&state.backend, auth.user_id).await? {
        Dashboard::Manager(dashboard) => dashboard.toggle_task(task_id).await?,
        Dashboard::User(dashboard) => dashboard.toggle_task(task_id).await?,
        Dashboard::Admin(_) => return Err(admins_have_no_tasks()),
    };

    Ok(Json(task))
}

/// Deletes a task
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    match router::route(&state.backend, auth.user_id).await? {
        Dashboard::Manager(dashboard) => dashboard.delete_task(task_id).await?,
        Dashboard::User(dashboard) => dashboard.delete_task(task_id).await?,
        Dashboard::Admin(_) => return Err(admins_have_no_tasks()),
    }

    Ok(Json(MessageResponse::new("Task deleted successfully.")))
}
