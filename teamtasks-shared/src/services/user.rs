/// User dashboard: a personal task board
///
/// Every view here is driven by live subscriptions. Creating, toggling or
/// deleting a task only writes; the board picks the change up from the
/// store's change feed.

use uuid::Uuid;

use super::router::load_profile;
use super::Backend;
use crate::auth::authorization::require_role;
use crate::error::{require_non_blank, DomainResult};
use crate::models::task::{CreateTask, Task, TaskBoard};
use crate::models::user::{Role, UserProfile};
use crate::store::Subscription;

#[derive(Debug, Clone)]
pub struct UserDashboard {
    backend: Backend,
    profile: UserProfile,
}

impl UserDashboard {
    /// Opens the dashboard for `user_id`, which must have role `User`
    pub async fn open(backend: &Backend, user_id: Uuid) -> DomainResult<Self> {
        let profile = load_profile(backend, user_id).await?;
        require_role(&profile, Role::User)?;
        Ok(Self::with_profile(backend.clone(), profile))
    }

    pub(crate) fn with_profile(backend: Backend, profile: UserProfile) -> Self {
        Self { backend, profile }
    }

    /// Profile as of opening
    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    /// Live profile; `None` once the profile is deleted
    pub async fn watch_profile(&self) -> DomainResult<Subscription<Option<UserProfile>>> {
        Ok(UserProfile::watch_by_id(self.backend.store.clone(), self.profile.id).await?)
    }

    pub async fn board(&self) -> DomainResult<TaskBoard> {
        let tasks = Task::list_owned_by(self.backend.store.as_ref(), self.profile.id).await?;
        Ok(TaskBoard::from_tasks(tasks))
    }

    /// Live board split into to-do and completed
    pub async fn watch_board(&self) -> DomainResult<Subscription<TaskBoard>> {
        let live = Task::watch_owned_by(self.backend.store.clone(), self.profile.id).await?;
        Ok(live.map(|tasks| TaskBoard::from_tasks(tasks.clone())))
    }

    /// Adds a task to the user's own board
    pub async fn create_task(&self, title: &str) -> DomainResult<Task> {
        let title = require_non_blank("title", title)?;

        let task = Task::create(
            self.backend.store.as_ref(),
            CreateTask {
                title: title.to_string(),
                user_id: self.profile.id,
                user_name: Some(self.profile.name.clone()),
            },
        )
        .await?;

        tracing::info!(user_id = %self.profile.id, task_id = %task.id, "Task created");
        Ok(task)
    }

    pub async fn toggle_task(&self, task_id: Uuid) -> DomainResult<Task> {
        super::toggle_task(&self.backend, &self.profile, task_id).await
    }

    pub async fn delete_task(&self, task_id: Uuid) -> DomainResult<()> {
        super::delete_task(&self.backend, &self.profile, task_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DomainError;
    use crate::models::user::CreateProfile;
    use std::time::Duration;

    async fn open(backend: &Backend, name: &str, role: Role) -> DomainResult<UserDashboard> {
        let profile = UserProfile::create(
            backend.store.as_ref(),
            Uuid::new_v4(),
            CreateProfile {
                name: name.to_string(),
                email: format!("{}@x.com", name.to_lowercase()),
                role,
                manager_id: None,
            },
        )
        .await
        .unwrap();

        UserDashboard::open(backend, profile.id).await
    }

    fn backend() -> Backend {
        Backend::in_memory("user-test-secret-that-is-32-bytes!!!")
    }

    #[tokio::test]
    async fn test_open_requires_user_role() {
        let backend = backend();
        assert!(matches!(
            open(&backend, "Mia", Role::Manager).await,
            Err(DomainError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_board_updates_without_refetch() {
        let backend = backend();
        let sam = open(&backend, "Sam", Role::User).await.unwrap();
        let mut board = sam.watch_board().await.unwrap();
        assert_eq!(board.current(), TaskBoard::default());

        let task = sam.create_task("  Ship report  ").await.unwrap();
        assert_eq!(task.title, "Ship report");
        assert_eq!(task.user_name.as_deref(), Some("Sam"));

        let snapshot = tokio::time::timeout(Duration::from_secs(1), board.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.todo.len(), 1);

        sam.toggle_task(task.id).await.unwrap();
        let snapshot = tokio::time::timeout(Duration::from_secs(1), board.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(snapshot.todo.is_empty());
        assert_eq!(snapshot.completed.len(), 1);
    }

    #[tokio::test]
    async fn test_blank_title_rejected() {
        let backend = backend();
        let sam = open(&backend, "Sam", Role::User).await.unwrap();

        assert!(matches!(
            sam.create_task(" ").await,
            Err(DomainError::Validation { .. })
        ));
        assert_eq!(sam.board().await.unwrap(), TaskBoard::default());
    }

    #[tokio::test]
    async fn test_cannot_touch_other_users_tasks() {
        let backend = backend();
        let sam = open(&backend, "Sam", Role::User).await.unwrap();
        let kai = open(&backend, "Kai", Role::User).await.unwrap();

        let task = kai.create_task("private").await.unwrap();
        assert!(matches!(
            sam.toggle_task(task.id).await,
            Err(DomainError::Forbidden(_))
        ));
        assert!(matches!(
            sam.delete_task(task.id).await,
            Err(DomainError::Forbidden(_))
        ));
        kai.delete_task(task.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_watch_profile_sees_push_token() {
        let backend = backend();
        let sam = open(&backend, "Sam", Role::User).await.unwrap();
        let mut live = sam.watch_profile().await.unwrap();

        crate::services::register_push_token(&backend, sam.profile().id, Some("ExponentPushToken[z]"))
            .await
            .unwrap();

        let snapshot = tokio::time::timeout(Duration::from_secs(1), live.changed())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.push_token(), Some("ExponentPushToken[z]"));
    }
}
