/// Admin dashboard: user lifecycle
///
/// Creating a user writes to two systems, the identity provider and the
/// `users` collection. The identity is created first; if the profile write
/// then fails the identity is deleted again. Only when that compensation also
/// fails does the operation report [`DomainError::Inconsistent`].
///
/// Deleting a user cascades: their tasks, then the profile, then the
/// identity. Managers are only deleted once nobody links to them.

use serde::Deserialize;
use uuid::Uuid;

use super::router::load_profile;
use super::Backend;
use crate::auth::authorization::require_role;
use crate::auth::identity::IdentityError;
use crate::error::{require_non_blank, DomainError, DomainResult};
use crate::models::task::Task;
use crate::models::user::{CreateProfile, Role, UserDirectory, UserProfile};
use crate::store::{Collection, Subscription};

/// Input for creating a user
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,

    /// Manager of a `User`; ignored for other roles
    #[serde(default)]
    pub manager_id: Option<Uuid>,
}

/// Outcome of [`AdminDashboard::delete_user`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletedUser {
    pub user_id: Uuid,
    pub tasks_removed: usize,
}

/// Session-scoped admin operations
#[derive(Debug, Clone)]
pub struct AdminDashboard {
    backend: Backend,
    profile: UserProfile,
}

impl AdminDashboard {
    /// Opens the dashboard for `user_id`, which must be an admin
    pub async fn open(backend: &Backend, user_id: Uuid) -> DomainResult<Self> {
        let profile = load_profile(backend, user_id).await?;
        require_role(&profile, Role::Admin)?;
        Ok(Self::with_profile(backend.clone(), profile))
    }

    pub(crate) fn with_profile(backend: Backend, profile: UserProfile) -> Self {
        Self { backend, profile }
    }

    /// The signed-in admin
    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    /// Every profile plus the manager list for assignment
    ///
    /// Profiles that do not decode, such as ones with an unrecognized role,
    /// are listed separately so they can still be deleted.
    pub async fn directory(&self) -> DomainResult<UserDirectory> {
        Ok(UserDirectory::load(self.backend.store.as_ref()).await?)
    }

    /// Live directory
    pub async fn watch_directory(&self) -> DomainResult<Subscription<UserDirectory>> {
        Ok(UserDirectory::watch(self.backend.store.clone()).await?)
    }

    /// Provisions an identity and profile
    ///
    /// All fields are checked before anything is written. A `User` may name
    /// a manager, which must be an existing `Manager` profile.
    pub async fn create_user(&self, request: NewUser) -> DomainResult<UserProfile> {
        let created = provision(&self.backend, request).await?;

        tracing::info!(
            admin_id = %self.profile.id,
            user_id = %created.id,
            role = %created.role,
            "User added successfully."
        );
        Ok(created)
    }

    /// Removes a user, their tasks, and their identity
    ///
    /// Works on the raw document, so a profile with an unrecognized role can
    /// be removed too. A manager who still has subordinates cannot be
    /// deleted.
    pub async fn delete_user(&self, user_id: Uuid) -> DomainResult<DeletedUser> {
        if user_id == self.profile.id {
            return Err(DomainError::validation(
                "userId",
                "cannot delete the signed-in admin",
            ));
        }

        let store = self.backend.store.as_ref();
        if store.get(Collection::Users, user_id).await?.is_none() {
            return Err(DomainError::profile_not_found(user_id));
        }

        let subordinates = UserProfile::count_subordinates(store, user_id).await?;
        if subordinates > 0 {
            return Err(DomainError::validation(
                "userId",
                format!("manager still has {} subordinate(s)", subordinates),
            ));
        }

        let tasks_removed = Task::delete_owned_by(store, user_id).await?;
        UserProfile::delete(store, user_id).await?;

        match self.backend.identities.delete_identity(user_id).await {
            Ok(existed) => {
                if !existed {
                    tracing::warn!(user_id = %user_id, "Deleted profile had no identity");
                }
            }
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "Profile deleted but identity removal failed");
                return Err(DomainError::Inconsistent(format!(
                    "profile {} deleted but its identity could not be removed: {}",
                    user_id, e
                )));
            }
        }

        tracing::info!(admin_id = %self.profile.id, user_id = %user_id, tasks_removed, "User deleted");
        Ok(DeletedUser {
            user_id,
            tasks_removed,
        })
    }

    /// Swaps a user between `Manager` and `User`
    ///
    /// Admins cannot be toggled. A manager who still has subordinates cannot
    /// be demoted.
    pub async fn toggle_role(&self, user_id: Uuid) -> DomainResult<Role> {
        let store = self.backend.store.as_ref();
        let target = load_profile(&self.backend, user_id).await?;

        let new_role = target
            .role
            .toggled()
            .ok_or_else(|| DomainError::validation("role", "admin roles cannot be toggled"))?;

        if target.role == Role::Manager {
            let subordinates = UserProfile::count_subordinates(store, target.id).await?;
            if subordinates > 0 {
                return Err(DomainError::validation(
                    "role",
                    format!("manager still has {} subordinate(s)", subordinates),
                ));
            }
        }

        UserProfile::set_role(store, target.id, new_role).await?;

        tracing::info!(admin_id = %self.profile.id, user_id = %user_id, "User role updated to {}.", new_role);
        Ok(new_role)
    }
}

/// Validates and writes identity plus profile, compensating on failure
async fn provision(backend: &Backend, request: NewUser) -> DomainResult<UserProfile> {
    let name = require_non_blank("name", &request.name)?.to_string();
    let email = require_non_blank("email", &request.email)?.to_string();
    if request.password.is_empty() {
        return Err(DomainError::validation("password", "password is required"));
    }

    let manager_id = match (request.role, request.manager_id) {
        (Role::User, Some(manager_id)) => {
            let manager = UserProfile::find_by_id(backend.store.as_ref(), manager_id).await?;
            if manager.map(|m| m.role) != Some(Role::Manager) {
                return Err(DomainError::validation(
                    "managerId",
                    format!("{} is not a manager", manager_id),
                ));
            }
            Some(manager_id)
        }
        _ => None,
    };

    let id = backend
        .identities
        .create_identity(&email, &request.password)
        .await?;

    let written = UserProfile::create(
        backend.store.as_ref(),
        id,
        CreateProfile {
            name,
            email,
            role: request.role,
            manager_id,
        },
    )
    .await;

    match written {
        Ok(profile) => Ok(profile),
        Err(write_err) => {
            tracing::warn!(user_id = %id, error = %write_err, "Profile write failed, removing identity");

            match backend.identities.delete_identity(id).await {
                Ok(_) => Err(DomainError::from(write_err)),
                Err(undo_err) => {
                    tracing::error!(
                        user_id = %id,
                        error = %undo_err,
                        "Identity exists without a profile"
                    );
                    Err(DomainError::Inconsistent(format!(
                        "identity {} created but profile write failed ({}) and rollback failed ({})",
                        id, write_err, undo_err
                    )))
                }
            }
        }
    }
}

/// What [`bootstrap_admin`] did
#[derive(Debug, Clone, PartialEq)]
pub enum BootstrapOutcome {
    /// A new admin was provisioned
    Created(UserProfile),

    /// An admin with this email already existed
    Existing(UserProfile),
}

/// Ensures an admin account exists for `email`
///
/// Used at startup so a fresh deployment has someone who can add users.
/// An identity that already exists must authenticate with `password` before
/// a missing profile is attached to it.
pub async fn bootstrap_admin(
    backend: &Backend,
    email: &str,
    password: &str,
    name: &str,
) -> DomainResult<BootstrapOutcome> {
    let request = NewUser {
        name: name.to_string(),
        email: email.to_string(),
        password: password.to_string(),
        role: Role::Admin,
        manager_id: None,
    };

    match provision(backend, request).await {
        Ok(profile) => {
            tracing::info!(user_id = %profile.id, "Bootstrap admin created");
            Ok(BootstrapOutcome::Created(profile))
        }
        Err(DomainError::Auth(IdentityError::EmailInUse(_))) => {
            let session = backend.identities.authenticate(email, password).await?;
            let id = session.identity_id;
            if let Err(e) = backend.identities.end_session(&session.access_token).await {
                tracing::debug!(error = %e, "Failed to end bootstrap session");
            }

            match UserProfile::find_by_id(backend.store.as_ref(), id).await? {
                Some(profile) if profile.role == Role::Admin => {
                    tracing::debug!(user_id = %id, "Bootstrap admin already present");
                    Ok(BootstrapOutcome::Existing(profile))
                }
                Some(profile) => Err(DomainError::validation(
                    "email",
                    format!("{} belongs to a {} account", email, profile.role),
                )),
                None => {
                    let profile = UserProfile::create(
                        backend.store.as_ref(),
                        id,
                        CreateProfile {
                            name: require_non_blank("name", name)?.to_string(),
                            email: email.trim().to_string(),
                            role: Role::Admin,
                            manager_id: None,
                        },
                    )
                    .await?;

                    tracing::info!(user_id = %id, "Bootstrap admin profile restored");
                    Ok(BootstrapOutcome::Created(profile))
                }
            }
        }
        Err(e) => Err(e),
    }
}
