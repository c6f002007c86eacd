/// Error handling for the API server
///
/// This module provides a unified error type that maps to HTTP responses.
/// All handlers return `Result<T, ApiError>`; domain, identity, and request
/// validation errors convert into it with `?`.
///
/// | Source | Status |
/// |---|---|
/// | `DomainError::Validation`, request validation | 422 |
/// | bad credentials, invalid or revoked session | 401 |
/// | `Forbidden`, `UnknownRole` | 403 |
/// | `NotFound` | 404 |
/// | email already in use | 409 |
/// | `Remote`, `Inconsistent` | 500 |

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use teamtasks_shared::auth::identity::IdentityError;
use teamtasks_shared::auth::middleware::AuthError;
use teamtasks_shared::DomainError;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409) - e.g., duplicate email
    Conflict(String),

    /// Unprocessable entity (422) - validation errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// Internal server error (500)
    InternalError(String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

impl ValidationErrorDetail {
    fn single(field: impl Into<String>, message: impl Into<String>) -> Vec<Self> {
        vec![Self {
            field: field.into(),
            message: message.into(),
        }]
    }
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "validation_error", "unauthorized")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::ValidationError(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// Convert dashboard errors to API errors
impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation { field, message } => {
                ApiError::ValidationError(ValidationErrorDetail::single(field, message))
            }
            DomainError::Auth(err) => err.into(),
            DomainError::NotFound(what) => ApiError::NotFound(format!("{} not found", what)),
            DomainError::Remote(err) => ApiError::InternalError(format!("Store error: {}", err)),
            DomainError::UnknownRole(role) => {
                ApiError::Forbidden(format!("Unrecognized role: {}", role))
            }
            DomainError::Forbidden(msg) => ApiError::Forbidden(msg),
            DomainError::Inconsistent(msg) => ApiError::InternalError(msg),
        }
    }
}

/// Convert identity provider errors to API errors
impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidCredentials => {
                ApiError::Unauthorized("Invalid email or password".to_string())
            }
            IdentityError::EmailInUse(email) => {
                ApiError::Conflict(format!("Email already in use: {}", email))
            }
            IdentityError::InvalidEmail(msg) => {
                ApiError::ValidationError(ValidationErrorDetail::single("email", msg))
            }
            IdentityError::WeakPassword(msg) => {
                ApiError::ValidationError(ValidationErrorDetail::single("password", msg))
            }
            IdentityError::InvalidSession(_) | IdentityError::SessionRevoked | IdentityError::NotFound(_) => {
                ApiError::Unauthorized(err.to_string())
            }
            IdentityError::Password(_) | IdentityError::Database(_) => {
                ApiError::InternalError(err.to_string())
            }
        }
    }
}

/// Convert auth errors to API errors
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials => {
                ApiError::Unauthorized("Missing credentials".to_string())
            }
            AuthError::InvalidFormat(msg) => ApiError::BadRequest(msg),
            AuthError::InvalidSession(err) => err.into(),
        }
    }
}

/// Convert request validation failures to API errors
impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        let errors: Vec<ValidationErrorDetail> = err
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();
        ApiError::ValidationError(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        let err = ApiError::NotFound("Task not found".to_string());
        assert_eq!(err.to_string(), "Not found: Task not found");
    }

    #[test]
    fn test_domain_error_statuses() {
        let cases = [
            (DomainError::validation("title", "title is required"), StatusCode::UNPROCESSABLE_ENTITY),
            (DomainError::Auth(IdentityError::InvalidCredentials), StatusCode::UNAUTHORIZED),
            (DomainError::Auth(IdentityError::EmailInUse("a@x.com".into())), StatusCode::CONFLICT),
            (DomainError::task_not_found(Uuid::new_v4()), StatusCode::NOT_FOUND),
            (DomainError::UnknownRole("Supervisor".into()), StatusCode::FORBIDDEN),
            (DomainError::Forbidden("no".into()), StatusCode::FORBIDDEN),
            (DomainError::Inconsistent("half done".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn test_validation_detail_keeps_field() {
        match ApiError::from(DomainError::validation("name", "name is required")) {
            ApiError::ValidationError(details) => {
                assert_eq!(details.len(), 1);
                assert_eq!(details[0].field, "name");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_auth_error_mapping() {
        assert!(matches!(
            ApiError::from(AuthError::MissingCredentials),
            ApiError::Unauthorized(_)
        ));
        assert!(matches!(
            ApiError::from(AuthError::InvalidFormat("Expected Bearer token".into())),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(
            ApiError::from(AuthError::InvalidSession(IdentityError::SessionRevoked)),
            ApiError::Unauthorized(_)
        ));
    }
}
