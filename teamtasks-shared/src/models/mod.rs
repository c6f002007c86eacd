/// Domain models for TeamTasks
///
/// Each model maps onto one document collection and exposes its store
/// operations as associated functions taking the store handle, plus `watch_*`
/// variants returning live subscriptions.
///
/// # Models
///
/// - `user`: user profiles, roles, and the admin directory view
/// - `task`: tasks, manager tabs, and the user task board

pub mod task;
pub mod user;

pub use task::{CreateTask, Task, TaskBoard, TaskTab};
pub use user::{CreateProfile, Role, UnrecognizedProfile, UserDirectory, UserProfile};
