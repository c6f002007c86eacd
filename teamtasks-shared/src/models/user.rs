/// User profile model and store operations
///
/// A profile is the `users` document describing a person's role and
/// relationships. It is keyed by the same id as the person's identity but is
/// otherwise independent of it: credentials never appear here.
///
/// # Document Shape
///
/// ```json
/// {
///   "name": "Sam",
///   "email": "sam@example.com",
///   "role": "User",
///   "managerId": "6f1c...",
///   "expoPushToken": ""
/// }
/// ```
///
/// `managerId` is a weak reference: it is looked up by query and carries no
/// ownership. Only profiles with role `User` carry one.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use teamtasks_shared::models::user::{CreateProfile, Role, UserProfile};
/// use teamtasks_shared::store::{memory::MemoryStore, DocumentStore};
/// use uuid::Uuid;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
///
/// let manager = UserProfile::create(
///     store.as_ref(),
///     Uuid::new_v4(),
///     CreateProfile {
///         name: "Mia".to_string(),
///         email: "mia@example.com".to_string(),
///         role: Role::Manager,
///         manager_id: None,
///     },
/// )
/// .await?;
///
/// let team = UserProfile::list_subordinates(store.as_ref(), manager.id).await?;
/// assert!(team.is_empty());
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::store::{
    self, encode_fields, Collection, Document, DocumentStore, Fields, Query, StoreResult,
    Subscription,
};

/// Display name used when a referenced profile cannot be resolved
pub const UNKNOWN_NAME: &str = "Unknown";

/// A stored role string outside the recognized set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRoleError(pub String);

/// Role of a user
///
/// Serialized as the literal strings `"Admin"`, `"Manager"`, `"User"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Manages accounts
    Admin,

    /// Assigns and reviews subordinates' tasks
    Manager,

    /// Manages own tasks
    User,
}

impl Role {
    /// Converts role to its stored string
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Manager => "Manager",
            Role::User => "User",
        }
    }

    /// The role an admin toggle switches to
    ///
    /// Manager and User swap; Admin has no toggle.
    pub fn toggled(&self) -> Option<Role> {
        match self {
            Role::Manager => Some(Role::User),
            Role::User => Some(Role::Manager),
            Role::Admin => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" => Ok(Role::Admin),
            "Manager" => Ok(Role::Manager),
            "User" => Ok(Role::User),
            other => Err(UnknownRoleError(other.to_string())),
        }
    }
}

/// User profile record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Profile id (equal to the identity id)
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Email address, as entered at creation
    pub email: String,

    /// Role
    pub role: Role,

    /// Manager of a `User`-role profile
    #[serde(default)]
    pub manager_id: Option<Uuid>,

    /// Push delivery token; empty when none is registered
    #[serde(default)]
    pub expo_push_token: String,
}

/// Input for creating a profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProfile {
    /// Display name
    pub name: String,

    /// Email address
    pub email: String,

    /// Role
    pub role: Role,

    /// Manager link; ignored unless `role` is `User`
    pub manager_id: Option<Uuid>,
}

impl UserProfile {
    /// Returns the push token, if one is registered
    pub fn push_token(&self) -> Option<&str> {
        let token = self.expo_push_token.trim();
        (!token.is_empty()).then_some(token)
    }

    /// Decodes a `users` document
    pub fn from_document(document: &Document) -> StoreResult<Self> {
        document.decode(Collection::Users)
    }

    /// Writes a new profile keyed by `id`
    ///
    /// The push token starts empty. The manager link is dropped for any role
    /// other than `User`.
    pub async fn create(
        store: &dyn DocumentStore,
        id: Uuid,
        data: CreateProfile,
    ) -> StoreResult<Self> {
        let manager_id = match data.role {
            Role::User => data.manager_id,
            Role::Admin | Role::Manager => None,
        };

        let profile = UserProfile {
            id,
            name: data.name,
            email: data.email,
            role: data.role,
            manager_id,
            expo_push_token: String::new(),
        };

        store
            .set(Collection::Users, id, encode_fields(&profile)?)
            .await?;

        tracing::debug!(user_id = %id, role = %profile.role, "Profile written");
        Ok(profile)
    }

    /// Finds a profile by id
    pub async fn find_by_id(store: &dyn DocumentStore, id: Uuid) -> StoreResult<Option<Self>> {
        store
            .get(Collection::Users, id)
            .await?
            .map(|doc| Self::from_document(&doc))
            .transpose()
    }

    /// Lists every profile
    pub async fn list(store: &dyn DocumentStore) -> StoreResult<Vec<Self>> {
        let documents = store.query(&Query::new(Collection::Users)).await?;
        Ok(decode_profiles(&documents))
    }

    /// Lists the profiles whose manager is `manager_id`
    pub async fn list_subordinates(
        store: &dyn DocumentStore,
        manager_id: Uuid,
    ) -> StoreResult<Vec<Self>> {
        let documents = store.query(&subordinates_query(manager_id)).await?;
        Ok(decode_profiles(&documents))
    }

    /// Number of `users` documents linked to `manager_id`
    ///
    /// Counts raw documents, so links held by profiles that do not decode
    /// are included.
    pub async fn count_subordinates(
        store: &dyn DocumentStore,
        manager_id: Uuid,
    ) -> StoreResult<usize> {
        Ok(store.query(&subordinates_query(manager_id)).await?.len())
    }

    /// Changes a profile's role
    ///
    /// Any role other than `User` clears the manager link.
    pub async fn set_role(store: &dyn DocumentStore, id: Uuid, role: Role) -> StoreResult<()> {
        let mut fields = Fields::new();
        fields.insert("role".to_string(), json!(role));
        if role != Role::User {
            fields.insert("managerId".to_string(), Value::Null);
        }

        store.update(Collection::Users, id, fields).await
    }

    /// Sets or clears the push token
    pub async fn set_push_token(
        store: &dyn DocumentStore,
        id: Uuid,
        token: Option<&str>,
    ) -> StoreResult<()> {
        let mut fields = Fields::new();
        fields.insert(
            "expoPushToken".to_string(),
            json!(token.map(str::trim).unwrap_or_default()),
        );

        store.update(Collection::Users, id, fields).await
    }

    /// Deletes a profile, returning whether it existed
    pub async fn delete(store: &dyn DocumentStore, id: Uuid) -> StoreResult<bool> {
        store.delete(Collection::Users, id).await
    }

    /// Live list of every profile
    pub async fn watch_all(store: Arc<dyn DocumentStore>) -> StoreResult<Subscription<Vec<Self>>> {
        let live = store::subscribe(store, Query::new(Collection::Users)).await?;
        Ok(live.map(|documents| decode_profiles(documents)))
    }

    /// Live list of a manager's subordinates
    pub async fn watch_subordinates(
        store: Arc<dyn DocumentStore>,
        manager_id: Uuid,
    ) -> StoreResult<Subscription<Vec<Self>>> {
        let live = store::subscribe(store, subordinates_query(manager_id)).await?;
        Ok(live.map(|documents| decode_profiles(documents)))
    }

    /// Live view of one profile; `None` while it does not exist
    pub async fn watch_by_id(
        store: Arc<dyn DocumentStore>,
        id: Uuid,
    ) -> StoreResult<Subscription<Option<Self>>> {
        let live = store::subscribe_document(store, Collection::Users, id).await?;
        Ok(live.map(|document| {
            document
                .as_ref()
                .and_then(|doc| decode_or_skip(doc))
        }))
    }
}

fn subordinates_query(manager_id: Uuid) -> Query {
    Query::new(Collection::Users).where_eq("managerId", manager_id.to_string())
}

fn decode_or_skip(document: &Document) -> Option<UserProfile> {
    match UserProfile::from_document(document) {
        Ok(profile) => Some(profile),
        Err(e) => {
            tracing::warn!(user_id = %document.id, error = %e, "Skipping undecodable profile");
            None
        }
    }
}

/// Decodes profiles, skipping malformed documents, ordered by name
fn decode_profiles(documents: &[Document]) -> Vec<UserProfile> {
    let mut profiles: Vec<UserProfile> = documents.iter().filter_map(decode_or_skip).collect();
    profiles.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    profiles
}

/// A `users` document that does not decode as a profile
///
/// Usually a role outside the recognized set. Kept visible to admins so the
/// account can still be removed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnrecognizedProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,

    /// Stored role, verbatim
    pub role: String,
}

impl UnrecognizedProfile {
    fn from_document(document: &Document) -> Self {
        let text = |name: &str| match document.field(name) {
            Some(Value::String(value)) => value.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };

        Self {
            id: document.id,
            name: text("name"),
            email: text("email"),
            role: text("role"),
        }
    }
}

/// Admin directory: every profile plus the managers among them
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserDirectory {
    /// All profiles
    pub users: Vec<UserProfile>,

    /// Profiles with role `Manager`
    pub managers: Vec<UserProfile>,

    /// Documents that could not be decoded
    pub unrecognized: Vec<UnrecognizedProfile>,
}

impl UserDirectory {
    /// Partitions a profile list
    pub fn from_users(users: Vec<UserProfile>) -> Self {
        let managers = users
            .iter()
            .filter(|user| user.role == Role::Manager)
            .cloned()
            .collect();

        Self {
            users,
            managers,
            unrecognized: Vec::new(),
        }
    }

    /// Builds the directory from raw `users` documents
    pub fn from_documents(documents: &[Document]) -> Self {
        let mut users = Vec::new();
        let mut unrecognized = Vec::new();

        for document in documents {
            match UserProfile::from_document(document) {
                Ok(profile) => users.push(profile),
                Err(e) => {
                    tracing::debug!(user_id = %document.id, error = %e, "Unrecognized profile");
                    unrecognized.push(UnrecognizedProfile::from_document(document));
                }
            }
        }

        users.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

        Self {
            unrecognized,
            ..Self::from_users(users)
        }
    }

    /// Reads the current directory
    pub async fn load(store: &dyn DocumentStore) -> StoreResult<Self> {
        let documents = store.query(&Query::new(Collection::Users)).await?;
        Ok(Self::from_documents(&documents))
    }

    /// Live directory
    pub async fn watch(store: Arc<dyn DocumentStore>) -> StoreResult<Subscription<Self>> {
        let live = store::subscribe(store, Query::new(Collection::Users)).await?;
        Ok(live.map(|documents| Self::from_documents(documents)))
    }

    /// Name of a profile's manager
    ///
    /// `None` when the profile has no manager link; [`UNKNOWN_NAME`] when the
    /// link does not resolve to a manager.
    pub fn manager_name(&self, user: &UserProfile) -> Option<&str> {
        let manager_id = user.manager_id?;

        Some(
            self.managers
                .iter()
                .find(|manager| manager.id == manager_id)
                .map(|manager| manager.name.as_str())
                .unwrap_or(UNKNOWN_NAME),
        )
    }
}
