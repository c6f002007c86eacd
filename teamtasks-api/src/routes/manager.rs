/// Manager endpoints: subordinates and tabbed task views
///
/// # Endpoints
///
/// - `GET /v1/manager/subordinates` - The manager's subordinates
/// - `GET /v1/manager/tasks?tab=my_tasks|my_completed_tasks|my_subordinates`
/// - `GET /v1/manager/tasks/stream?tab=...` - Live tab over SSE
/// - `POST /v1/manager/tasks` - Create a task for self or a subordinate

use crate::{app::AppState, error::ApiResult, routes::stream::sse};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, Sse},
    Extension, Json,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use teamtasks_shared::auth::middleware::AuthContext;
use teamtasks_shared::models::{Task, TaskTab, UserProfile};
use teamtasks_shared::services::{ManagerDashboard, NewTask};
use uuid::Uuid;
use validator::Validate;

/// Tab selection
#[derive(Debug, Default, Deserialize)]
pub struct TabQuery {
    #[serde(default)]
    pub tab: TaskTab,
}

/// A task with its owner's display name
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,

    pub owner_name: String,
}

/// Create task request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[validate(length(max = 500, message = "Title must be at most 500 characters"))]
    pub title: String,

    /// Subordinate to assign to; the manager when absent
    #[serde(default)]
    pub assignee_id: Option<Uuid>,
}

fn task_views(dashboard: &ManagerDashboard, tasks: Vec<Task>, team: &[UserProfile]) -> Vec<TaskView> {
    tasks
        .into_iter()
        .map(|task| TaskView {
            owner_name: dashboard.owner_name(&task, team),
            task,
        })
        .collect()
}

/// Lists the manager's subordinates
pub async fn list_subordinates(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<UserProfile>>> {
    let dashboard = ManagerDashboard::open(&state.backend, auth.user_id).await?;
    Ok(Json(dashboard.subordinates().await?))
}

/// Lists one tab's tasks
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<TabQuery>,
) -> ApiResult<Json<Vec<TaskView>>> {
    let dashboard = ManagerDashboard::open(&state.backend, auth.user_id).await?;
    let tasks = dashboard.tasks(query.tab).await?;
    let team = dashboard.subordinates().await?;

    Ok(Json(task_views(&dashboard, tasks, &team)))
}

/// Streams one tab's tasks
///
/// Emits a `tasks` event per snapshot. Owner names are resolved against the
/// subordinate list at the time of each snapshot.
pub async fn stream_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<TabQuery>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let dashboard = ManagerDashboard::open(&state.backend, auth.user_id).await?;
    let live = dashboard.watch_tasks(query.tab).await?;

    tracing::info!(manager_id = %auth.user_id, tab = query.tab.as_str(), "Streaming manager tasks");

    let snapshots = live.into_stream().then(move |tasks| {
        let dashboard = dashboard.clone();
        async move {
            let team = match dashboard.subordinates().await {
                Ok(team) => team,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to resolve owner names");
                    Vec::new()
                }
            };
            task_views(&dashboard, tasks, &team)
        }
    });

    Ok(sse(snapshots, "tasks"))
}

/// Creates a task
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Blank title
/// - `403 Forbidden`: Assignee is not a subordinate
/// - `404 Not Found`: Assignee does not exist
pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    req.validate()?;

    let dashboard = ManagerDashboard::open(&state.backend, auth.user_id).await?;
    let task = dashboard
        .create_task(NewTask {
            title: req.title,
            assignee_id: req.assignee_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(task)))
}
