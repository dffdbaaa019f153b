//! One-time tokens for passwordless login and message share links.
//!
//! Only an Argon2 hash of each raw token is stored. Because the hashes are
//! salted there is no lookup by value: redemption scans the active pool of
//! the requested scope and verifies against each hash. The pool is bounded
//! by token lifetime and issuance rate.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use tidings_crypto::CredentialHasher;
use tidings_crypto::tokens::{generate_raw_token, is_well_formed_token};
use tidings_db::Database;
use tidings_types::models::TokenScope;

use crate::error::ApiError;

/// A freshly issued token. `raw` exists only here; storage never sees it.
#[derive(Debug)]
pub struct IssuedToken {
    pub id: Uuid,
    pub raw: String,
    pub scope: TokenScope,
    pub scope_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

pub struct Tokens<'a> {
    db: &'a Database,
    hasher: &'a CredentialHasher,
}

impl<'a> Tokens<'a> {
    pub fn new(db: &'a Database, hasher: &'a CredentialHasher) -> Self {
        Self { db, hasher }
    }

    pub fn issue_login_token(&self, user_id: Uuid, ttl: Duration) -> Result<IssuedToken, ApiError> {
        self.issue(TokenScope::Login, user_id, ttl)
    }

    pub fn issue_share_token(
        &self,
        message_id: Uuid,
        ttl: Duration,
    ) -> Result<IssuedToken, ApiError> {
        self.issue(TokenScope::Share, message_id, ttl)
    }

    fn issue(&self, scope: TokenScope, scope_id: Uuid, ttl: Duration) -> Result<IssuedToken, ApiError> {
        let raw = generate_raw_token();
        let hash = self.hasher.hash(&raw).map_err(ApiError::Crypto)?;
        let id = Uuid::new_v4();
        let expires_at = Utc::now() + ttl;

        // The raw token is handed out only after the record is durable.
        self.db
            .insert_token(
                &id.to_string(),
                scope,
                &scope_id.to_string(),
                hash.as_str(),
                expires_at.timestamp_millis(),
            )
            .map_err(ApiError::Storage)?;

        info!(token_id = %id, scope = scope.as_str(), %expires_at, "Issued one-time token");

        Ok(IssuedToken {
            id,
            raw,
            scope,
            scope_id,
            expires_at,
        })
    }

    /// Redeem `raw` for the id it was issued for. Succeeds at most once per
    /// token; every failure is [`ApiError::TokenNotFound`].
    pub fn consume(&self, raw: &str, scope: TokenScope) -> Result<Uuid, ApiError> {
        self.consume_at(raw, scope, Utc::now())
    }

    fn consume_at(&self, raw: &str, scope: TokenScope, now: DateTime<Utc>) -> Result<Uuid, ApiError> {
        if !is_well_formed_token(raw) {
            return Err(ApiError::TokenNotFound);
        }

        let now_ms = now.timestamp_millis();
        let pool = self
            .db
            .active_tokens(scope, now_ms)
            .map_err(ApiError::Storage)?;

        let Some(hit) = pool
            .into_iter()
            .find(|t| self.hasher.verify(raw, &t.token_hash))
        else {
            debug!(scope = scope.as_str(), "No active token matched");
            return Err(ApiError::TokenNotFound);
        };

        // Single conditional update; a concurrent redeemer of the same
        // token gets false here.
        if !self
            .db
            .consume_token(&hit.id, now_ms)
            .map_err(ApiError::Storage)?
        {
            debug!(token_id = %hit.id, "Token consumed concurrently");
            return Err(ApiError::TokenNotFound);
        }

        let scope_id: Uuid = hit
            .scope_id
            .parse()
            .map_err(|e| ApiError::Internal(format!("corrupt scope id on token {}: {}", hit.id, e)))?;

        info!(token_id = %hit.id, scope = scope.as_str(), "Consumed one-time token");
        Ok(scope_id)
    }
}
