use async_trait::async_trait;
use chrono::Duration;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::AppEnvironment;
use crate::models::{CallerId, IssuedToken, SessionToken};
use crate::services::clock::Clock;
use crate::store::Store;
use crate::utils::error::{AppError, AppResult};

const TOKEN_BYTES: usize = 32;

pub fn session_lifetime() -> Duration {
    Duration::hours(24)
}

/// Resolves an opaque bearer credential into the caller it was issued to.
#[async_trait]
pub trait CallerResolver: Send + Sync {
    async fn resolve_caller(&self, credential: &str) -> AppResult<CallerId>;
}

/// Gate for destructive operations that must never run in production.
pub trait EnvironmentGuard: Send + Sync {
    fn assert_mutable_environment(&self) -> AppResult<()>;
}

impl EnvironmentGuard for AppEnvironment {
    fn assert_mutable_environment(&self) -> AppResult<()> {
        if self.is_production() {
            return Err(AppError::Forbidden(
                "Operation not allowed in the production environment".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn fingerprint(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Session-table backed identity: tokens are random, only their SHA-256
/// fingerprint is persisted.
pub struct SessionAuth<S: Store> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: Store> Clone for SessionAuth<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<S: Store> SessionAuth<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Creates a session for `user_id`. Called by whatever authenticates the
    /// user's credentials.
    pub async fn issue(&self, user_id: Uuid) -> AppResult<IssuedToken> {
        let access_token = generate_token();
        let expires_at = self.clock.now() + session_lifetime();
        self.store
            .insert_session(&SessionToken {
                user_id,
                token_hash: fingerprint(&access_token),
                expires_at,
            })
            .await?;

        tracing::info!(%user_id, "Session issued");
        Ok(IssuedToken {
            access_token,
            expires_at,
        })
    }

    /// Replaces a live token with a fresh one, extending the expiry.
    pub async fn refresh(&self, credential: &str) -> AppResult<IssuedToken> {
        let caller = self.resolve_caller(credential).await?;
        let access_token = generate_token();
        let expires_at = self.clock.now() + session_lifetime();

        let rotated = self
            .store
            .rotate_session(&fingerprint(credential), &fingerprint(&access_token), expires_at)
            .await?;
        if !rotated {
            return Err(AppError::AuthError("Invalid token".to_string()));
        }

        tracing::info!(user_id = %caller, "Session refreshed");
        Ok(IssuedToken {
            access_token,
            expires_at,
        })
    }

    pub async fn logout(&self, credential: &str) -> AppResult<()> {
        self.store.delete_session(&fingerprint(credential)).await
    }
}

#[async_trait]
impl<S: Store> CallerResolver for SessionAuth<S> {
    async fn resolve_caller(&self, credential: &str) -> AppResult<CallerId> {
        let session = self
            .store
            .find_session(&fingerprint(credential))
            .await?
            .ok_or_else(|| AppError::AuthError("Invalid token".to_string()))?;

        if session.is_expired(self.clock.now()) {
            return Err(AppError::AuthError("Token expired".to_string()));
        }
        Ok(CallerId(session.user_id))
    }
}
