/// Authorization checks
///
/// Role-based access control over profiles and tasks:
///
/// 1. **Role**: each dashboard requires an exact role (Admin, Manager, User)
/// 2. **Task access**: a task may be toggled or deleted by its owner or by
///    the owner's manager
/// 3. **Assignment**: a manager may assign tasks to themself or to one of
///    their subordinates
///
/// These are pure checks over already-loaded records; callers load the
/// profiles and tasks.
///
/// # Example
///
/// ```
/// use teamtasks_shared::auth::authorization::require_role;
/// use teamtasks_shared::models::user::{Role, UserProfile};
/// use uuid::Uuid;
///
/// let admin = UserProfile {
///     id: Uuid::new_v4(),
///     name: "Ada".to_string(),
///     email: "ada@example.com".to_string(),
///     role: Role::Admin,
///     manager_id: None,
///     expo_push_token: String::new(),
/// };
///
/// assert!(require_role(&admin, Role::Admin).is_ok());
/// assert!(require_role(&admin, Role::Manager).is_err());
/// ```

use uuid::Uuid;

use crate::models::task::Task;
use crate::models::user::{Role, UserProfile};

/// Error type for authorization checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// Caller doesn't have the required role
    #[error("Insufficient permissions: requires {required}, has {actual}")]
    InsufficientRole { required: Role, actual: Role },

    /// Caller is neither the task's owner nor the owner's manager
    #[error("Not authorized to modify task {0}")]
    NotTaskParticipant(Uuid),

    /// Assignee is neither the manager nor one of their subordinates
    #[error("User {0} is not a subordinate")]
    NotSubordinate(Uuid),
}

/// Checks that a profile has exactly the required role
pub fn require_role(profile: &UserProfile, required: Role) -> Result<(), AuthzError> {
    if profile.role != required {
        return Err(AuthzError::InsufficientRole {
            required,
            actual: profile.role,
        });
    }

    Ok(())
}

/// Checks that `actor` may toggle or delete `task`
///
/// `owner` is the task owner's profile, if it still exists. A task whose
/// owner profile is gone can only be changed by the owner id itself.
pub fn require_task_access(
    actor: &UserProfile,
    task: &Task,
    owner: Option<&UserProfile>,
) -> Result<(), AuthzError> {
    if actor.id == task.user_id {
        return Ok(());
    }

    let manages_owner = owner
        .filter(|owner| owner.id == task.user_id)
        .and_then(|owner| owner.manager_id)
        .is_some_and(|manager_id| manager_id == actor.id);

    if manages_owner {
        Ok(())
    } else {
        Err(AuthzError::NotTaskParticipant(task.id))
    }
}

/// Checks that `manager` may assign a task to `assignee`
pub fn require_assignable(manager: &UserProfile, assignee: &UserProfile) -> Result<(), AuthzError> {
    if assignee.id == manager.id || assignee.manager_id == Some(manager.id) {
        return Ok(());
    }

    Err(AuthzError::NotSubordinate(assignee.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn profile(role: Role, manager_id: Option<Uuid>) -> UserProfile {
        UserProfile {
            id: Uuid::new_v4(),
            name: "someone".to_string(),
            email: "someone@example.com".to_string(),
            role,
            manager_id,
            expo_push_token: String::new(),
        }
    }

    fn task_for(owner: &UserProfile) -> Task {
        Task {
            id: Uuid::new_v4(),
            title: "Ship report".to_string(),
            completed: false,
            user_id: owner.id,
            user_name: Some(owner.name.clone()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_require_role_is_exact() {
        let manager = profile(Role::Manager, None);

        assert!(require_role(&manager, Role::Manager).is_ok());
        assert_eq!(
            require_role(&manager, Role::Admin),
            Err(AuthzError::InsufficientRole {
                required: Role::Admin,
                actual: Role::Manager,
            })
        );
    }

    #[test]
    fn test_task_access_owner_and_manager() {
        let manager = profile(Role::Manager, None);
        let user = profile(Role::User, Some(manager.id));
        let stranger = profile(Role::Manager, None);
        let task = task_for(&user);

        assert!(require_task_access(&user, &task, Some(&user)).is_ok());
        assert!(require_task_access(&manager, &task, Some(&user)).is_ok());
        assert_eq!(
            require_task_access(&stranger, &task, Some(&user)),
            Err(AuthzError::NotTaskParticipant(task.id))
        );
    }

    #[test]
    fn test_task_access_without_owner_profile() {
        let manager = profile(Role::Manager, None);
        let user = profile(Role::User, Some(manager.id));
        let task = task_for(&user);

        assert!(require_task_access(&manager, &task, None).is_err());
    }

    #[test]
    fn test_task_access_ignores_mismatched_owner() {
        let manager = profile(Role::Manager, None);
        let subordinate = profile(Role::User, Some(manager.id));
        let other = profile(Role::User, None);
        let task = task_for(&other);

        // Passing the wrong owner profile does not grant access
        assert!(require_task_access(&manager, &task, Some(&subordinate)).is_err());
    }

    #[test]
    fn test_require_assignable() {
        let manager = profile(Role::Manager, None);
        let subordinate = profile(Role::User, Some(manager.id));
        let other = profile(Role::User, Some(Uuid::new_v4()));

        assert!(require_assignable(&manager, &manager).is_ok());
        assert!(require_assignable(&manager, &subordinate).is_ok());
        assert_eq!(
            require_assignable(&manager, &other),
            Err(AuthzError::NotSubordinate(other.id))
        );
    }
}
