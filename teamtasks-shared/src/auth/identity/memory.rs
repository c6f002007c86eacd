/// Process-local identity provider
///
/// Credentials and the revocation list are held in memory and lost on
/// restart. Hashes use the light Argon2id profile.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    check_new_credentials, normalize_email, IdentityError, IdentityProvider, Session,
    SessionIdentity, SessionIssuer,
};
use crate::auth::password::{hash_password_with, verify_password, HashParams};

#[derive(Debug, Clone)]
struct IdentityRecord {
    id: Uuid,
    password_hash: String,
}

#[derive(Debug, Default)]
struct State {
    by_email: HashMap<String, IdentityRecord>,
    revoked: HashSet<Uuid>,
}

impl State {
    fn exists(&self, id: Uuid) -> bool {
        self.by_email.values().any(|record| record.id == id)
    }
}

/// In-memory identity provider
#[derive(Debug)]
pub struct MemoryIdentityProvider {
    issuer: SessionIssuer,
    state: RwLock<State>,
}

impl MemoryIdentityProvider {
    /// Creates an empty provider signing sessions with `secret`
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            issuer: SessionIssuer::new(secret),
            state: RwLock::new(State::default()),
        }
    }

    /// Number of identities
    pub async fn len(&self) -> usize {
        self.state.read().await.by_email.len()
    }

    /// Whether an identity exists
    pub async fn contains(&self, identity_id: Uuid) -> bool {
        self.state.read().await.exists(identity_id)
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn create_identity(&self, email: &str, password: &str) -> Result<Uuid, IdentityError> {
        let email = check_new_credentials(email, password)?;
        let password_hash = hash_password_with(password, HashParams::LIGHT)?;

        let mut state = self.state.write().await;
        if state.by_email.contains_key(&email) {
            return Err(IdentityError::EmailInUse(email));
        }

        let id = Uuid::new_v4();
        state.by_email.insert(email.clone(), IdentityRecord { id, password_hash });

        tracing::info!(identity_id = %id, email = %email, "Identity created");
        Ok(id)
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let record = self
            .state
            .read()
            .await
            .by_email
            .get(&normalize_email(email))
            .cloned()
            .ok_or(IdentityError::InvalidCredentials)?;

        if !verify_password(password, &record.password_hash)? {
            return Err(IdentityError::InvalidCredentials);
        }

        self.issuer.open(record.id)
    }

    async fn verify_session(&self, access_token: &str) -> Result<SessionIdentity, IdentityError> {
        let claims = self.issuer.access_claims(access_token)?;

        let state = self.state.read().await;
        if state.revoked.contains(&claims.jti) {
            return Err(IdentityError::SessionRevoked);
        }
        if !state.exists(claims.sub) {
            return Err(IdentityError::NotFound(claims.sub));
        }

        Ok(SessionIdentity::from(&claims))
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, IdentityError> {
        let claims = self.issuer.refresh_claims(refresh_token)?;

        {
            let state = self.state.read().await;
            if state.revoked.contains(&claims.jti) {
                return Err(IdentityError::SessionRevoked);
            }
            if !state.exists(claims.sub) {
                return Err(IdentityError::NotFound(claims.sub));
            }
        }

        self.issuer.reissue(refresh_token, &claims)
    }

    async fn end_session(&self, access_token: &str) -> Result<(), IdentityError> {
        let claims = self.issuer.access_claims(access_token)?;
        self.state.write().await.revoked.insert(claims.jti);

        tracing::info!(identity_id = %claims.sub, session_id = %claims.jti, "Session ended");
        Ok(())
    }

    async fn delete_identity(&self, identity_id: Uuid) -> Result<bool, IdentityError> {
        let mut state = self.state.write().await;
        let before = state.by_email.len();
        state.by_email.retain(|_, record| record.id != identity_id);
        let removed = state.by_email.len() < before;

        if removed {
            tracing::info!(identity_id = %identity_id, "Identity deleted");
        }
        Ok(removed)
    }
}
