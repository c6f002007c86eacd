/// Identity provider
///
/// Owns credentials and sessions. Profiles (role, manager link, push token)
/// live in the document store under the same id as the identity; this module
/// never touches them.
///
/// # Implementations
///
/// - [`memory::MemoryIdentityProvider`]: process-local, for development and tests
/// - [`postgres::PgIdentityProvider`]: `identities` and `revoked_sessions` tables
///
/// Both share [`SessionIssuer`] for token handling, so sessions behave the
/// same regardless of where credentials are stored.
///
/// # Rules
///
/// - Emails are trimmed and compared case-insensitively; duplicates fail with
///   [`IdentityError::EmailInUse`]
/// - Malformed emails fail with [`IdentityError::InvalidEmail`]
/// - Passwords shorter than 6 characters fail with [`IdentityError::WeakPassword`]
/// - Unknown email and wrong password are indistinguishable
///   ([`IdentityError::InvalidCredentials`])
///
/// # Example
///
/// ```
/// use teamtasks_shared::auth::identity::IdentityProvider;
/// use teamtasks_shared::auth::identity::memory::MemoryIdentityProvider;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let identities = MemoryIdentityProvider::new("a-development-secret-of-32-bytes!!");
///
/// let id = identities.create_identity("u@x.com", "pw123456").await?;
/// let session = identities.authenticate("u@x.com", "pw123456").await?;
/// assert_eq!(session.identity_id, id);
///
/// let verified = identities.verify_session(&session.access_token).await?;
/// assert_eq!(verified.identity_id, id);
/// # Ok(())
/// # }
/// ```

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;
use validator::ValidateEmail;

use super::jwt::{self, Claims, JwtError, TokenType};
use super::password::{self, PasswordError};

/// Error type for identity provider operations
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// Unknown email or wrong password
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Another identity already uses this email
    #[error("Email already in use: {0}")]
    EmailInUse(String),

    /// Email is not syntactically valid
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    /// Password does not meet the strength rules
    #[error("Weak password: {0}")]
    WeakPassword(String),

    /// Token is malformed, expired or of the wrong type
    #[error("Invalid session: {0}")]
    InvalidSession(#[from] JwtError),

    /// Session was ended
    #[error("Session has been revoked")]
    SessionRevoked,

    /// Identity no longer exists
    #[error("Identity not found: {0}")]
    NotFound(Uuid),

    /// Password hashing failure
    #[error("Password error: {0}")]
    Password(#[from] PasswordError),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// An authenticated session
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    /// Identity the session belongs to
    pub identity_id: Uuid,

    /// Session id (JWT `jti`)
    pub session_id: Uuid,

    /// Bearer token for requests
    pub access_token: String,

    /// Token for obtaining new access tokens
    pub refresh_token: String,

    /// Access token expiry
    pub expires_at: DateTime<Utc>,
}

/// Identity resolved from a verified access token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionIdentity {
    /// Identity id (also the profile id)
    pub identity_id: Uuid,

    /// Session id
    pub session_id: Uuid,

    /// When the session's access token expires
    pub expires_at: DateTime<Utc>,
}

/// Contract implemented by every identity backend
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Provisions a new identity, returning its id
    async fn create_identity(&self, email: &str, password: &str) -> Result<Uuid, IdentityError>;

    /// Checks credentials and opens a session
    async fn authenticate(&self, email: &str, password: &str) -> Result<Session, IdentityError>;

    /// Resolves an access token to its identity
    ///
    /// Fails for expired, revoked, or refresh tokens.
    async fn verify_session(&self, access_token: &str) -> Result<SessionIdentity, IdentityError>;

    /// Exchanges a refresh token for a new access token in the same session
    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, IdentityError>;

    /// Ends the session an access token belongs to
    async fn end_session(&self, access_token: &str) -> Result<(), IdentityError>;

    /// Deletes an identity, returning whether it existed
    ///
    /// Existing sessions of a deleted identity stop verifying.
    async fn delete_identity(&self, identity_id: Uuid) -> Result<bool, IdentityError>;
}

/// Normalizes an email for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Applies the email and password rules for new identities
///
/// Returns the normalized email.
pub fn check_new_credentials(email: &str, password: &str) -> Result<String, IdentityError> {
    let email = normalize_email(email);
    if !email.validate_email() {
        return Err(IdentityError::InvalidEmail(email));
    }

    password::validate_password_strength(password).map_err(IdentityError::WeakPassword)?;

    Ok(email)
}

/// Issues and checks session tokens
#[derive(Clone)]
pub struct SessionIssuer {
    secret: String,
}

impl std::fmt::Debug for SessionIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionIssuer").finish_non_exhaustive()
    }
}

impl SessionIssuer {
    /// Creates an issuer signing with `secret`
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Opens a new session for an identity
    pub fn open(&self, identity_id: Uuid) -> Result<Session, IdentityError> {
        let session_id = Uuid::new_v4();
        let access = Claims::new(identity_id, session_id, TokenType::Access);
        let refresh = Claims::new(identity_id, session_id, TokenType::Refresh);

        Ok(Session {
            identity_id,
            session_id,
            access_token: jwt::create_token(&access, &self.secret)?,
            refresh_token: jwt::create_token(&refresh, &self.secret)?,
            expires_at: access.expires_at(),
        })
    }

    /// Issues a new access token for the session a refresh token belongs to
    ///
    /// The refresh token itself is handed back unchanged.
    pub fn reissue(&self, refresh_token: &str, refresh: &Claims) -> Result<Session, IdentityError> {
        let access = Claims::new(refresh.sub, refresh.jti, TokenType::Access);

        Ok(Session {
            identity_id: refresh.sub,
            session_id: refresh.jti,
            access_token: jwt::create_token(&access, &self.secret)?,
            refresh_token: refresh_token.to_string(),
            expires_at: access.expires_at(),
        })
    }

    /// Validates an access token's signature and claims
    pub fn access_claims(&self, token: &str) -> Result<Claims, IdentityError> {
        Ok(jwt::validate_access_token(token, &self.secret)?)
    }

    /// Validates a refresh token's signature and claims
    pub fn refresh_claims(&self, token: &str) -> Result<Claims, IdentityError> {
        Ok(jwt::validate_refresh_token(token, &self.secret)?)
    }
}

impl From<&Claims> for SessionIdentity {
    fn from(claims: &Claims) -> Self {
        Self {
            identity_id: claims.sub,
            session_id: claims.jti,
            expires_at: claims.expires_at(),
        }
    }
}
