/// Dashboard services
///
/// The three role dashboards are session-scoped services over a [`Backend`]
/// handle. Each dashboard is opened for an authenticated user id, checks that
/// the user's stored role matches, and exposes that role's operations.
///
/// # Modules
///
/// - `router`: sign-in, sign-out, and role dispatch
/// - `admin`: user lifecycle (directory, create, delete, toggle role)
/// - `manager`: subordinates and tab-filtered task views
/// - `user`: personal task board
///
/// Views are reactive through live subscriptions only: mutations never
/// trigger a manual re-read, the subscriptions observe the write.
///
/// # Example
///
/// ```no_run
/// use teamtasks_shared::services::{router, Backend};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = Backend::in_memory("a-development-secret-of-32-bytes!!");
///
/// let signed_in = router::sign_in(&backend, "u@x.com", "pw123456").await?;
/// println!("{:?} dashboard", signed_in.dashboard.role());
/// # Ok(())
/// # }
/// ```

pub mod admin;
pub mod manager;
pub mod router;
pub mod user;

use std::sync::Arc;
use uuid::Uuid;

use crate::auth::authorization;
use crate::auth::identity::memory::MemoryIdentityProvider;
use crate::auth::identity::IdentityProvider;
use crate::error::{DomainError, DomainResult};
use crate::models::task::Task;
use crate::models::user::UserProfile;
use crate::notify::{NoopPushSender, PushSender};
use crate::store::memory::MemoryStore;
use crate::store::DocumentStore;

pub use admin::{bootstrap_admin, AdminDashboard, BootstrapOutcome, NewUser};
pub use manager::{ManagerDashboard, NewTask, TaskFeed};
pub use router::{Dashboard, SignedIn};
pub use user::UserDashboard;

/// Handles to the external collaborators
///
/// Constructed once at startup and passed to every service.
#[derive(Clone)]
pub struct Backend {
    /// Document store
    pub store: Arc<dyn DocumentStore>,

    /// Identity provider
    pub identities: Arc<dyn IdentityProvider>,

    /// Push delivery
    pub push: Arc<dyn PushSender>,
}

impl Backend {
    /// Bundles the three collaborators
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identities: Arc<dyn IdentityProvider>,
        push: Arc<dyn PushSender>,
    ) -> Self {
        Self {
            store,
            identities,
            push,
        }
    }

    /// In-process store and identities, push disabled
    pub fn in_memory(secret: impl Into<String>) -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryIdentityProvider::new(secret)),
            Arc::new(NoopPushSender),
        )
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend").finish_non_exhaustive()
    }
}

/// Sets or clears the caller's push token
///
/// Available to every role.
pub async fn register_push_token(
    backend: &Backend,
    user_id: Uuid,
    token: Option<&str>,
) -> DomainResult<UserProfile> {
    let profile = router::load_profile(backend, user_id).await?;
    let token = token.map(str::trim).filter(|token| !token.is_empty());

    UserProfile::set_push_token(backend.store.as_ref(), profile.id, token)
        .await
        .map_err(|e| {
            tracing::warn!(user_id = %user_id, error = %e, "Failed to store push token");
            DomainError::from(e)
        })?;

    tracing::info!(user_id = %user_id, registered = token.is_some(), "Push token updated");

    Ok(UserProfile {
        expo_push_token: token.unwrap_or_default().to_string(),
        ..profile
    })
}

/// Loads a task and checks `actor` may change it
pub(crate) async fn authorize_task(
    backend: &Backend,
    actor: &UserProfile,
    task_id: Uuid,
) -> DomainResult<Task> {
    let store = backend.store.as_ref();

    let task = Task::find_by_id(store, task_id)
        .await?
        .ok_or_else(|| DomainError::task_not_found(task_id))?;

    let owner = if task.user_id == actor.id {
        None
    } else {
        UserProfile::find_by_id(store, task.user_id).await?
    };

    authorization::require_task_access(actor, &task, owner.as_ref())?;
    Ok(task)
}

/// Flips a task's completion flag after an access check
pub(crate) async fn toggle_task(
    backend: &Backend,
    actor: &UserProfile,
    task_id: Uuid,
) -> DomainResult<Task> {
    authorize_task(backend, actor, task_id).await?;

    let task = Task::toggle_completion(backend.store.as_ref(), task_id)
        .await
        .map_err(|e| {
            tracing::warn!(task_id = %task_id, error = %e, "Failed to toggle task");
            DomainError::from(e)
        })?;

    tracing::info!(task_id = %task_id, user_id = %actor.id, completed = task.completed, "Task toggled");
    Ok(task)
}

/// Deletes a task after an access check
pub(crate) async fn delete_task(
    backend: &Backend,
    actor: &UserProfile,
    task_id: Uuid,
) -> DomainResult<()> {
    authorize_task(backend, actor, task_id).await?;

    Task::delete(backend.store.as_ref(), task_id)
        .await
        .map_err(|e| {
            tracing::warn!(task_id = %task_id, error = %e, "Failed to delete task");
            DomainError::from(e)
        })?;

    tracing::info!(task_id = %task_id, user_id = %actor.id, "Task deleted");
    Ok(())
}
