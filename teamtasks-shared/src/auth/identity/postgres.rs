/// PostgreSQL identity provider
///
/// Credentials live in `identities`; ended sessions are recorded in
/// `revoked_sessions` until their refresh token would have expired.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    check_new_credentials, normalize_email, IdentityError, IdentityProvider, Session,
    SessionIdentity, SessionIssuer,
};
use crate::auth::jwt::{Claims, TokenType};
use crate::auth::password::{hash_password, verify_password};

/// Unique index on `LOWER(email)`
const EMAIL_UNIQUE_INDEX: &str = "idx_identities_email";

/// Identity provider backed by PostgreSQL
#[derive(Debug, Clone)]
pub struct PgIdentityProvider {
    pool: PgPool,
    issuer: SessionIssuer,
}

impl PgIdentityProvider {
    /// Creates a provider over `pool` signing sessions with `secret`
    pub fn new(pool: PgPool, secret: impl Into<String>) -> Self {
        Self {
            pool,
            issuer: SessionIssuer::new(secret),
        }
    }

    /// Removes revocation entries whose sessions have expired anyway
    pub async fn purge_expired_revocations(&self) -> Result<u64, IdentityError> {
        let result = sqlx::query("DELETE FROM revoked_sessions WHERE expires_at < NOW()")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn ensure_active(&self, claims: &Claims) -> Result<(), IdentityError> {
        let (revoked, exists): (bool, bool) = sqlx::query_as(
            r#"
            SELECT
                EXISTS (SELECT 1 FROM revoked_sessions WHERE jti = $1),
                EXISTS (SELECT 1 FROM identities WHERE id = $2)
            "#,
        )
        .bind(claims.jti)
        .bind(claims.sub)
        .fetch_one(&self.pool)
        .await?;

        if revoked {
            return Err(IdentityError::SessionRevoked);
        }
        if !exists {
            return Err(IdentityError::NotFound(claims.sub));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for PgIdentityProvider {
    async fn create_identity(&self, email: &str, password: &str) -> Result<Uuid, IdentityError> {
        let email = check_new_credentials(email, password)?;
        let password_hash = hash_password(password)?;
        let id = Uuid::new_v4();

        let inserted = sqlx::query(
            "INSERT INTO identities (id, email, password_hash, created_at) VALUES ($1, $2, $3, NOW())",
        )
        .bind(id)
        .bind(&email)
        .bind(&password_hash)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => {
                tracing::info!(identity_id = %id, email = %email, "Identity created");
                Ok(id)
            }
            Err(sqlx::Error::Database(db))
                if db.constraint() == Some(EMAIL_UNIQUE_INDEX) || db.is_unique_violation() =>
            {
                Err(IdentityError::EmailInUse(email))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let row: Option<(Uuid, String)> =
            sqlx::query_as("SELECT id, password_hash FROM identities WHERE LOWER(email) = $1")
                .bind(normalize_email(email))
                .fetch_optional(&self.pool)
                .await?;

        let (id, password_hash) = row.ok_or(IdentityError::InvalidCredentials)?;

        if !verify_password(password, &password_hash)? {
            return Err(IdentityError::InvalidCredentials);
        }

        self.issuer.open(id)
    }

    async fn verify_session(&self, access_token: &str) -> Result<SessionIdentity, IdentityError> {
        let claims = self.issuer.access_claims(access_token)?;
        self.ensure_active(&claims).await?;

        Ok(SessionIdentity::from(&claims))
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, IdentityError> {
        let claims = self.issuer.refresh_claims(refresh_token)?;
        self.ensure_active(&claims).await?;

        self.issuer.reissue(refresh_token, &claims)
    }

    async fn end_session(&self, access_token: &str) -> Result<(), IdentityError> {
        let claims = self.issuer.access_claims(access_token)?;

        // Keep the entry as long as the session's refresh token could be used
        let expires_at: DateTime<Utc> = Utc::now() + TokenType::Refresh.default_expiration();

        sqlx::query(
            r#"
            INSERT INTO revoked_sessions (jti, identity_id, expires_at, revoked_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (jti) DO NOTHING
            "#,
        )
        .bind(claims.jti)
        .bind(claims.sub)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        tracing::info!(identity_id = %claims.sub, session_id = %claims.jti, "Session ended");
        Ok(())
    }

    async fn delete_identity(&self, identity_id: Uuid) -> Result<bool, IdentityError> {
        let result = sqlx::query("DELETE FROM identities WHERE id = $1")
            .bind(identity_id)
            .execute(&self.pool)
            .await?;

        let removed = result.rows_affected() > 0;
        if removed {
            tracing::info!(identity_id = %identity_id, "Identity deleted");
        }
        Ok(removed)
    }
}
