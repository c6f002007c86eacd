/// Manager dashboard: subordinates and tabbed task views
///
/// A manager sees three task tabs. The subordinate tab is a composed live
/// view: it follows the manager's subordinate list and re-subscribes to the
/// task query whenever the set of subordinate ids changes.

use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::router::load_profile;
use super::Backend;
use crate::auth::authorization::{require_assignable, require_role};
use crate::error::{require_non_blank, DomainError, DomainResult};
use crate::models::task::{CreateTask, Task, TaskTab};
use crate::models::user::{Role, UserProfile, UNKNOWN_NAME};
use crate::notify::{send_best_effort, PushMessage};
use crate::store::subscription::spawn_producer;
use crate::store::{DocumentStore, StoreResult, Subscription};

/// Input for creating a task
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,

    /// Subordinate to assign to; the manager when absent
    #[serde(default)]
    pub assignee_id: Option<Uuid>,
}

/// Session-scoped manager operations
#[derive(Debug, Clone)]
pub struct ManagerDashboard {
    backend: Backend,
    profile: UserProfile,
}

impl ManagerDashboard {
    /// Opens the dashboard for `user_id`, which must be a manager
    pub async fn open(backend: &Backend, user_id: Uuid) -> DomainResult<Self> {
        let profile = load_profile(backend, user_id).await?;
        require_role(&profile, Role::Manager)?;
        Ok(Self::with_profile(backend.clone(), profile))
    }

    pub(crate) fn with_profile(backend: Backend, profile: UserProfile) -> Self {
        Self { backend, profile }
    }

    /// The signed-in manager
    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    /// Users whose manager is the signed-in manager
    pub async fn subordinates(&self) -> DomainResult<Vec<UserProfile>> {
        Ok(UserProfile::list_subordinates(self.backend.store.as_ref(), self.profile.id).await?)
    }

    pub async fn watch_subordinates(&self) -> DomainResult<Subscription<Vec<UserProfile>>> {
        Ok(UserProfile::watch_subordinates(self.backend.store.clone(), self.profile.id).await?)
    }

    /// One-shot read of a tab
    pub async fn tasks(&self, tab: TaskTab) -> DomainResult<Vec<Task>> {
        let store = self.backend.store.as_ref();

        Ok(match tab {
            TaskTab::MyTasks => Task::list_owned_by(store, self.profile.id).await?,
            TaskTab::MyCompletedTasks => Task::list_owned_by(store, self.profile.id)
                .await?
                .into_iter()
                .filter(|task| task.completed)
                .collect(),
            TaskTab::MySubordinates => {
                let mut tasks = Vec::new();
                for subordinate in self.subordinates().await? {
                    tasks.extend(Task::list_owned_by(store, subordinate.id).await?);
                }
                tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
                tasks
            }
        })
    }

    /// Live view of a tab
    pub async fn watch_tasks(&self, tab: TaskTab) -> DomainResult<Subscription<Vec<Task>>> {
        let store = self.backend.store.clone();

        Ok(match tab {
            TaskTab::MyTasks => Task::watch_owned_by(store, self.profile.id).await?,
            TaskTab::MyCompletedTasks => {
                Task::watch_completed_owned_by(store, self.profile.id).await?
            }
            TaskTab::MySubordinates => watch_team_tasks(store, self.profile.id).await?,
        })
    }

    /// Live view that can switch tabs
    pub async fn task_feed(&self, tab: TaskTab) -> DomainResult<TaskFeed> {
        let live = self.watch_tasks(tab).await?;
        Ok(TaskFeed {
            dashboard: self.clone(),
            tab,
            live,
        })
    }

    /// Creates a task for the manager or one of their subordinates
    ///
    /// A subordinate with a registered push token is notified; delivery
    /// failures never fail the task creation.
    pub async fn create_task(&self, request: NewTask) -> DomainResult<Task> {
        let title = require_non_blank("title", &request.title)?.to_string();

        let assignee = match request.assignee_id {
            None => self.profile.clone(),
            Some(id) if id == self.profile.id => self.profile.clone(),
            Some(id) => {
                let assignee = UserProfile::find_by_id(self.backend.store.as_ref(), id)
                    .await?
                    .ok_or_else(|| DomainError::profile_not_found(id))?;
                require_assignable(&self.profile, &assignee)?;
                assignee
            }
        };

        let task = Task::create(
            self.backend.store.as_ref(),
            CreateTask {
                title,
                user_id: assignee.id,
                user_name: Some(assignee.name.clone()),
            },
        )
        .await?;

        tracing::info!(
            manager_id = %self.profile.id,
            task_id = %task.id,
            assignee_id = %assignee.id,
            "Task created"
        );

        if assignee.id != self.profile.id {
            if let Some(token) = assignee.push_token() {
                send_best_effort(
                    self.backend.push.clone(),
                    PushMessage::task_assigned(token, &task.title),
                );
            }
        }

        Ok(task)
    }

    /// Flips completion on an own or subordinate task
    pub async fn toggle_task(&self, task_id: Uuid) -> DomainResult<Task> {
        super::toggle_task(&self.backend, &self.profile, task_id).await
    }

    /// Deletes an own or subordinate task
    pub async fn delete_task(&self, task_id: Uuid) -> DomainResult<()> {
        super::delete_task(&self.backend, &self.profile, task_id).await
    }

    /// Display name for a task's owner
    ///
    /// Resolved against the current subordinate list first, then the stored
    /// `userName`, then [`UNKNOWN_NAME`].
    pub fn owner_name(&self, task: &Task, subordinates: &[UserProfile]) -> String {
        if task.user_id == self.profile.id {
            return self.profile.name.clone();
        }

        subordinates
            .iter()
            .find(|subordinate| subordinate.id == task.user_id)
            .map(|subordinate| subordinate.name.clone())
            .or_else(|| task.user_name.clone())
            .unwrap_or_else(|| UNKNOWN_NAME.to_string())
    }
}

/// A tab-switchable live task view
///
/// Switching tabs drops the previous subscription before the new one is
/// observed, so at most one tab query stays live.
#[derive(Debug)]
pub struct TaskFeed {
    dashboard: ManagerDashboard,
    tab: TaskTab,
    live: Subscription<Vec<Task>>,
}

impl TaskFeed {
    pub fn tab(&self) -> TaskTab {
        self.tab
    }

    /// Latest tasks for the selected tab
    pub fn current(&self) -> Vec<Task> {
        self.live.current()
    }

    /// Switches to `tab` and returns its first snapshot
    pub async fn select_tab(&mut self, tab: TaskTab) -> DomainResult<Vec<Task>> {
        if tab != self.tab {
            self.live = self.dashboard.watch_tasks(tab).await?;
            self.tab = tab;
            tracing::debug!(manager_id = %self.dashboard.profile.id, tab = tab.as_str(), "Task tab selected");
        }
        Ok(self.live.current())
    }

    /// Waits for the selected tab to change
    pub async fn changed(&mut self) -> Option<Vec<Task>> {
        self.live.changed().await
    }
}

fn team_ids(team: &[UserProfile]) -> Vec<Uuid> {
    team.iter().map(|member| member.id).collect()
}

enum TeamEvent {
    Team(Vec<UserProfile>),
    Tasks(Vec<Task>),
    Stop,
}

/// Tasks of every subordinate, following changes to the team itself
async fn watch_team_tasks(
    store: Arc<dyn DocumentStore>,
    manager_id: Uuid,
) -> StoreResult<Subscription<Vec<Task>>> {
    let mut team = UserProfile::watch_subordinates(store.clone(), manager_id).await?;
    let mut ids = team_ids(&team.current());
    let mut tasks = Task::watch_owned_by_any(store.clone(), &ids).await?;

    Ok(spawn_producer(tasks.current(), move |tx, cancelled| async move {
        loop {
            let event = tokio::select! {
                _ = cancelled.cancelled() => TeamEvent::Stop,
                changed = team.changed() => changed.map_or(TeamEvent::Stop, TeamEvent::Team),
                changed = tasks.changed() => changed.map_or(TeamEvent::Stop, TeamEvent::Tasks),
            };

            match event {
                TeamEvent::Stop => break,
                TeamEvent::Tasks(snapshot) => {
                    if tx.send(snapshot).is_err() {
                        break;
                    }
                }
                TeamEvent::Team(members) => {
                    let next_ids = team_ids(&members);
                    if next_ids == ids {
                        continue;
                    }

                    match Task::watch_owned_by_any(store.clone(), &next_ids).await {
                        Ok(next) => {
                            ids = next_ids;
                            tasks = next;
                            tx.send_if_modified(|current| {
                                let snapshot = tasks.current();
                                if *current == snapshot {
                                    false
                                } else {
                                    *current = snapshot;
                                    true
                                }
                            });
                        }
                        Err(e) => {
                            tracing::warn!(manager_id = %manager_id, error = %e, "Team task refresh failed");
                        }
                    }
                }
            }
        }

        tracing::debug!(manager_id = %manager_id, "Team task view released");
    }))
}
