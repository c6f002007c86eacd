/// Domain error taxonomy
///
/// Every dashboard operation fails with a [`DomainError`]:
///
/// - `Validation`: a required field is empty or a reference is invalid;
///   raised before any store write
/// - `Auth`: credential or provisioning failure from the identity provider
/// - `NotFound`: a profile or task does not exist
/// - `Remote`: a document store operation failed
/// - `UnknownRole`: a stored role outside the recognized set
/// - `Forbidden`: the caller's role or relationship does not allow the action
/// - `Inconsistent`: a multi-step operation failed and could not be undone

use uuid::Uuid;

use crate::auth::authorization::AuthzError;
use crate::auth::identity::IdentityError;
use crate::models::user::UnknownRoleError;
use crate::store::StoreError;

/// Domain result type alias
pub type DomainResult<T> = Result<T, DomainError>;

/// Error type for dashboard operations
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    /// Invalid input, caught before any write
    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    /// Identity provider failure
    #[error("Authentication failed: {0}")]
    Auth(#[from] IdentityError),

    /// Record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Document store failure
    #[error("Remote error: {0}")]
    Remote(StoreError),

    /// Stored role outside the recognized set
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    /// Caller may not perform the action
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Partial failure that could not be compensated
    #[error("Inconsistent state: {0}")]
    Inconsistent(String),
}

impl DomainError {
    /// Creates a validation error for a field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a not-found error for a profile
    pub fn profile_not_found(id: Uuid) -> Self {
        Self::NotFound(format!("profile {}", id))
    }

    /// Creates a not-found error for a task
    pub fn task_not_found(id: Uuid) -> Self {
        Self::NotFound(format!("task {}", id))
    }
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { collection, id } => {
                DomainError::NotFound(format!("{} {}", collection, id))
            }
            other => DomainError::Remote(other),
        }
    }
}

impl From<AuthzError> for DomainError {
    fn from(err: AuthzError) -> Self {
        DomainError::Forbidden(err.to_string())
    }
}

impl From<UnknownRoleError> for DomainError {
    fn from(err: UnknownRoleError) -> Self {
        DomainError::UnknownRole(err.0)
    }
}

/// Rejects blank (empty or whitespace-only) input
///
/// Returns the trimmed value.
pub fn require_non_blank<'a>(field: &str, value: &'a str) -> DomainResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(field, format!("{} is required", field)));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Collection;

    #[test]
    fn test_require_non_blank() {
        assert_eq!(require_non_blank("title", "  Ship report ").unwrap(), "Ship report");

        match require_non_blank("title", " \t\n") {
            Err(DomainError::Validation { field, message }) => {
                assert_eq!(field, "title");
                assert_eq!(message, "title is required");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_store_not_found_maps_to_not_found() {
        let id = Uuid::new_v4();
        let err = DomainError::from(StoreError::NotFound {
            collection: Collection::Tasks,
            id,
        });

        assert!(matches!(err, DomainError::NotFound(msg) if msg == format!("tasks {}", id)));
        assert!(matches!(
            DomainError::from(StoreError::Backend("down".to_string())),
            DomainError::Remote(_)
        ));
    }

    #[test]
    fn test_unknown_role_conversion() {
        let err = DomainError::from(UnknownRoleError("Supervisor".to_string()));
        assert_eq!(err.to_string(), "Unknown role: Supervisor");
    }
}
