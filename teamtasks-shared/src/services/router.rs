/// Sign-in and role dispatch
///
/// After authentication the caller's profile is loaded and its stored `role`
/// string decides which dashboard opens. Exactly one dashboard is produced per
/// sign-in: a missing profile or a role outside `Admin`/`Manager`/`User` fails
/// the sign-in instead of falling back to any dashboard.

use std::str::FromStr;
use uuid::Uuid;

use super::admin::AdminDashboard;
use super::manager::ManagerDashboard;
use super::user::UserDashboard;
use super::Backend;
use crate::auth::identity::Session;
use crate::error::{require_non_blank, DomainError, DomainResult};
use crate::models::user::{Role, UserProfile};
use crate::store::Collection;

/// The dashboard a signed-in user lands on
#[derive(Debug, Clone)]
pub enum Dashboard {
    Admin(AdminDashboard),
    Manager(ManagerDashboard),
    User(UserDashboard),
}

impl Dashboard {
    /// Role the dashboard was opened for
    pub fn role(&self) -> Role {
        match self {
            Dashboard::Admin(_) => Role::Admin,
            Dashboard::Manager(_) => Role::Manager,
            Dashboard::User(_) => Role::User,
        }
    }

    /// Profile of the signed-in user
    pub fn profile(&self) -> &UserProfile {
        match self {
            Dashboard::Admin(dashboard) => dashboard.profile(),
            Dashboard::Manager(dashboard) => dashboard.profile(),
            Dashboard::User(dashboard) => dashboard.profile(),
        }
    }
}

/// Result of a successful sign-in
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub session: Session,
    pub dashboard: Dashboard,
}

/// Authenticates and opens the caller's dashboard
///
/// If the dashboard cannot be determined the new session is ended again, so
/// a failed sign-in never leaves a usable session behind.
pub async fn sign_in(backend: &Backend, email: &str, password: &str) -> DomainResult<SignedIn> {
    let email = require_non_blank("email", email)?;
    if password.is_empty() {
        return Err(DomainError::validation("password", "password is required"));
    }

    let session = backend.identities.authenticate(email, password).await?;

    match route(backend, session.identity_id).await {
        Ok(dashboard) => {
            tracing::info!(
                user_id = %session.identity_id,
                role = %dashboard.role(),
                "User signed in"
            );
            Ok(SignedIn { session, dashboard })
        }
        Err(e) => {
            tracing::warn!(user_id = %session.identity_id, error = %e, "Sign-in could not be routed");
            if let Err(end_err) = backend.identities.end_session(&session.access_token).await {
                tracing::warn!(error = %end_err, "Failed to end unrouted session");
            }
            Err(e)
        }
    }
}

/// Ends the session behind `access_token`
pub async fn sign_out(backend: &Backend, access_token: &str) -> DomainResult<()> {
    backend.identities.end_session(access_token).await?;
    tracing::info!("User signed out");
    Ok(())
}

/// Opens the dashboard matching the user's stored role
pub async fn route(backend: &Backend, user_id: Uuid) -> DomainResult<Dashboard> {
    let profile = load_profile(backend, user_id).await?;

    Ok(match profile.role {
        Role::Admin => Dashboard::Admin(AdminDashboard::with_profile(backend.clone(), profile)),
        Role::Manager => {
            Dashboard::Manager(ManagerDashboard::with_profile(backend.clone(), profile))
        }
        Role::User => Dashboard::User(UserDashboard::with_profile(backend.clone(), profile)),
    })
}

/// Loads a profile, distinguishing an unknown role from a malformed document
pub(crate) async fn load_profile(backend: &Backend, user_id: Uuid) -> DomainResult<UserProfile> {
    let document = backend
        .store
        .get(Collection::Users, user_id)
        .await?
        .ok_or_else(|| DomainError::profile_not_found(user_id))?;

    let role = document
        .field("role")
        .and_then(|value| value.as_str())
        .unwrap_or_default();
    Role::from_str(role)?;

    Ok(UserProfile::from_document(&document)?)
}
