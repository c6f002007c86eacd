/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and strength rules
/// - [`jwt`]: session token generation and validation
/// - [`identity`]: the identity provider seam and its backends
/// - [`authorization`]: role, task-access, and assignment checks
/// - [`middleware`]: bearer-token resolution for Axum requests
///
/// # Example
///
/// ```no_run
/// use teamtasks_shared::auth::identity::{memory::MemoryIdentityProvider, IdentityProvider};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let identities = MemoryIdentityProvider::new("a-development-secret-of-32-bytes!!");
/// identities.create_identity("u@x.com", "pw123456").await?;
///
/// let session = identities.authenticate("u@x.com", "pw123456").await?;
/// identities.end_session(&session.access_token).await?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod identity;
pub mod jwt;
pub mod middleware;
pub mod password;
