/// Task model and store operations
///
/// Tasks are `tasks` documents owned by exactly one user through the
/// `userId` field. The owner's display name is denormalized into
/// `userName` at creation time.
///
/// # Document Shape
///
/// ```json
/// {
///   "title": "Ship report",
///   "completed": false,
///   "userId": "0b6e...",
///   "userName": "Sam",
///   "createdAt": "2025-01-10T09:30:00Z"
/// }
/// ```
///
/// # Example
///
/// ```no_run
/// use teamtasks_shared::models::task::{CreateTask, Task};
/// use teamtasks_shared::store::memory::MemoryStore;
/// use uuid::Uuid;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::new();
/// let owner = Uuid::new_v4();
///
/// let task = Task::create(
///     &store,
///     CreateTask {
///         title: "Ship report".to_string(),
///         user_id: owner,
///         user_name: Some("Sam".to_string()),
///     },
/// )
/// .await?;
///
/// let done = Task::toggle_completion(&store, task.id).await?;
/// assert!(done.completed);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::store::{
    self, encode_fields, Collection, Document, DocumentStore, Fields, Query, StoreError,
    StoreResult, Subscription,
};

/// Task record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Task id
    pub id: Uuid,

    /// Title (non-empty)
    pub title: String,

    /// Completion flag
    #[serde(default)]
    pub completed: bool,

    /// Owning user
    pub user_id: Uuid,

    /// Owner's name at creation time
    #[serde(default)]
    pub user_name: Option<String>,

    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Input for creating a task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTask {
    /// Title
    pub title: String,

    /// Owning user
    pub user_id: Uuid,

    /// Owner's display name
    pub user_name: Option<String>,
}

impl Task {
    /// Decodes a `tasks` document
    pub fn from_document(document: &Document) -> StoreResult<Self> {
        document.decode(Collection::Tasks)
    }

    /// Creates an incomplete task with a fresh id
    pub async fn create(store: &dyn DocumentStore, data: CreateTask) -> StoreResult<Self> {
        let task = Task {
            id: Uuid::new_v4(),
            title: data.title,
            completed: false,
            user_id: data.user_id,
            user_name: data.user_name,
            created_at: Utc::now(),
        };

        store
            .set(Collection::Tasks, task.id, encode_fields(&task)?)
            .await?;

        tracing::debug!(task_id = %task.id, user_id = %task.user_id, "Task written");
        Ok(task)
    }

    /// Finds a task by id
    pub async fn find_by_id(store: &dyn DocumentStore, id: Uuid) -> StoreResult<Option<Self>> {
        store
            .get(Collection::Tasks, id)
            .await?
            .map(|doc| Self::from_document(&doc))
            .transpose()
    }

    /// Sets the completion flag
    pub async fn set_completed(
        store: &dyn DocumentStore,
        id: Uuid,
        completed: bool,
    ) -> StoreResult<()> {
        let mut fields = Fields::new();
        fields.insert("completed".to_string(), json!(completed));

        store.update(Collection::Tasks, id, fields).await
    }

    /// Flips the completion flag and returns the updated task
    ///
    /// Reads the current flag first, so two toggles separated by a read
    /// return the task to its original state.
    pub async fn toggle_completion(store: &dyn DocumentStore, id: Uuid) -> StoreResult<Self> {
        let mut task = Self::find_by_id(store, id)
            .await?
            .ok_or(StoreError::NotFound {
                collection: Collection::Tasks,
                id,
            })?;

        task.completed = !task.completed;
        Self::set_completed(store, id, task.completed).await?;

        Ok(task)
    }

    /// Deletes a task, returning whether it existed
    pub async fn delete(store: &dyn DocumentStore, id: Uuid) -> StoreResult<bool> {
        store.delete(Collection::Tasks, id).await
    }

    /// Lists a user's tasks
    pub async fn list_owned_by(store: &dyn DocumentStore, user_id: Uuid) -> StoreResult<Vec<Self>> {
        let documents = store.query(&owned_by_query(user_id)).await?;
        Ok(decode_tasks(&documents))
    }

    /// Deletes every task a user owns, returning how many were removed
    pub async fn delete_owned_by(store: &dyn DocumentStore, user_id: Uuid) -> StoreResult<usize> {
        let documents = store.query(&owned_by_query(user_id)).await?;

        let mut removed = 0;
        for document in &documents {
            if store.delete(Collection::Tasks, document.id).await? {
                removed += 1;
            }
        }

        Ok(removed)
    }

    /// Live list of a user's tasks
    pub async fn watch_owned_by(
        store: Arc<dyn DocumentStore>,
        user_id: Uuid,
    ) -> StoreResult<Subscription<Vec<Self>>> {
        watch(store, owned_by_query(user_id)).await
    }

    /// Live list of a user's completed tasks
    pub async fn watch_completed_owned_by(
        store: Arc<dyn DocumentStore>,
        user_id: Uuid,
    ) -> StoreResult<Subscription<Vec<Self>>> {
        watch(store, owned_by_query(user_id).where_eq("completed", true)).await
    }

    /// Live list of tasks owned by any of `user_ids`
    ///
    /// An empty id set yields an empty list.
    pub async fn watch_owned_by_any(
        store: Arc<dyn DocumentStore>,
        user_ids: &[Uuid],
    ) -> StoreResult<Subscription<Vec<Self>>> {
        let query = Query::new(Collection::Tasks)
            .where_in("userId", user_ids.iter().map(Uuid::to_string));

        watch(store, query).await
    }
}

fn owned_by_query(user_id: Uuid) -> Query {
    Query::new(Collection::Tasks).where_eq("userId", user_id.to_string())
}

async fn watch(store: Arc<dyn DocumentStore>, query: Query) -> StoreResult<Subscription<Vec<Task>>> {
    let live = store::subscribe(store, query).await?;
    Ok(live.map(|documents| decode_tasks(documents)))
}

/// Decodes tasks, skipping malformed documents, oldest first
fn decode_tasks(documents: &[Document]) -> Vec<Task> {
    let mut tasks: Vec<Task> = documents
        .iter()
        .filter_map(|document| match Task::from_document(document) {
            Ok(task) => Some(task),
            Err(e) => {
                tracing::warn!(task_id = %document.id, error = %e, "Skipping undecodable task");
                None
            }
        })
        .collect();

    tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    tasks
}

/// Manager task tabs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskTab {
    /// Tasks the manager owns
    #[default]
    MyTasks,

    /// Completed tasks the manager owns
    MyCompletedTasks,

    /// Tasks owned by the manager's subordinates
    MySubordinates,
}

impl TaskTab {
    /// Gets the tab as its wire string
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskTab::MyTasks => "my_tasks",
            TaskTab::MyCompletedTasks => "my_completed_tasks",
            TaskTab::MySubordinates => "my_subordinates",
        }
    }
}

/// A user's tasks split into to-do and completed
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskBoard {
    /// Incomplete tasks
    pub todo: Vec<Task>,

    /// Completed tasks
    pub completed: Vec<Task>,
}

impl TaskBoard {
    /// Partitions tasks by completion, keeping their order
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        let (completed, todo) = tasks.into_iter().partition(|task| task.completed);
        Self { todo, completed }
    }
}
