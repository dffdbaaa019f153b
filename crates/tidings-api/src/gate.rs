//! Access decisions for a message and the event trail they leave.
//!
//! Only `open` checks the message password. Download and reply are not
//! password-gated, and neither requires a prior open.

use chrono::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use tidings_crypto::CredentialHasher;
use tidings_db::Database;
use tidings_db::models::MessageRow;
use tidings_types::models::{Actor, Analytics, EventKind, Message, TokenScope};

use crate::error::ApiError;
use crate::tokens::{IssuedToken, Tokens};
use crate::views;

pub struct Gate<'a> {
    db: &'a Database,
    hasher: &'a CredentialHasher,
}

impl<'a> Gate<'a> {
    pub fn new(db: &'a Database, hasher: &'a CredentialHasher) -> Self {
        Self { db, hasher }
    }

    fn lookup(&self, slug: &str) -> Result<MessageRow, ApiError> {
        self.db
            .get_message_by_slug(slug)
            .map_err(ApiError::Storage)?
            .ok_or(ApiError::MessageNotFound)
    }

    fn record(
        &self,
        message_id: &str,
        kind: EventKind,
        actor: &Actor,
        reply_text: Option<&str>,
    ) -> Result<(), ApiError> {
        self.db
            .insert_event(
                &Uuid::new_v4().to_string(),
                message_id,
                kind,
                &actor.first_name,
                &actor.last_name,
                reply_text,
            )
            .map_err(ApiError::Storage)
    }

    /// Whether `slug` names a message, with its password hint if it has one.
    pub fn exists(&self, slug: &str) -> Result<(bool, Option<String>), ApiError> {
        let row = self.db.get_message_by_slug(slug).map_err(ApiError::Storage)?;
        Ok(match row {
            Some(row) => (true, row.password_hint),
            None => (false, None),
        })
    }

    pub fn open(&self, slug: &str, password: &str, actor: &Actor) -> Result<Message, ApiError> {
        let row = self.lookup(slug)?;

        if !self.hasher.verify(password, &row.password_hash) {
            info!(%slug, "Open denied: wrong password");
            return Err(ApiError::InvalidPassword);
        }

        let message = views::message(&row)?;
        self.record(&row.id, EventKind::Open, actor, None)?;
        info!(%slug, "Message opened by {} {}", actor.first_name, actor.last_name);
        Ok(message)
    }

    /// Possession of an unconsumed share token stands in for the password.
    pub fn open_via_magic_link(&self, raw_token: &str, actor: &Actor) -> Result<Message, ApiError> {
        let message_id = Tokens::new(self.db, self.hasher).consume(raw_token, TokenScope::Share)?;

        let row = self
            .db
            .get_message_by_id(&message_id.to_string())
            .map_err(ApiError::Storage)?
            .ok_or_else(|| {
                warn!(%message_id, "Share token points at a missing message");
                ApiError::MessageNotFound
            })?;

        let message = views::message(&row)?;
        self.record(&row.id, EventKind::Open, actor, None)?;
        info!(slug = %row.slug, "Message opened via magic link");
        Ok(message)
    }

    /// Artifact URL of a video message. The slug is resolved before the
    /// visitor's names are checked.
    pub fn download(&self, slug: &str, actor: Option<&Actor>) -> Result<String, ApiError> {
        let row = self.lookup(slug)?;

        let Some(actor) = actor else {
            return Err(ApiError::Validation(
                "First name and last name are required".into(),
            ));
        };

        let Some(url) = row.video_url.clone() else {
            warn!(%slug, "Download requested for a message without a video");
            return Err(ApiError::NoArtifact);
        };

        self.record(&row.id, EventKind::Download, actor, None)?;
        info!(%slug, "Download by {} {}", actor.first_name, actor.last_name);
        Ok(url)
    }

    pub fn reply(&self, slug: &str, actor: &Actor, text: &str) -> Result<(), ApiError> {
        let row = self.lookup(slug)?;
        self.record(&row.id, EventKind::Reply, actor, Some(text))?;
        info!(%slug, "Reply from {} {}", actor.first_name, actor.last_name);
        Ok(())
    }

    /// Mint a share token for `slug`. Only the message's sender may do this.
    pub fn create_share_link(
        &self,
        slug: &str,
        requesting_user: Uuid,
        ttl: Duration,
    ) -> Result<IssuedToken, ApiError> {
        let row = self.lookup(slug)?;

        if row.sender_id != requesting_user.to_string() {
            warn!(%slug, user_id = %requesting_user, "Share link refused: not the sender");
            return Err(ApiError::Forbidden);
        }

        let message_id: Uuid = row
            .id
            .parse()
            .map_err(|e| ApiError::Internal(format!("corrupt message id '{}': {}", row.id, e)))?;

        Tokens::new(self.db, self.hasher).issue_share_token(message_id, ttl)
    }

    pub fn analytics(&self, slug: &str) -> Result<Analytics, ApiError> {
        let row = self.lookup(slug)?;
        let events = self
            .db
            .get_events_for_message(&row.id)
            .map_err(ApiError::Storage)?;

        let mut analytics = Analytics {
            id: views::message(&row)?.id,
            opens: Vec::new(),
            downloads: Vec::new(),
            replies: Vec::new(),
        };
        for event in views::events(events) {
            match event.kind {
                EventKind::Open => analytics.opens.push(event),
                EventKind::Download => analytics.downloads.push(event),
                EventKind::Reply => analytics.replies.push(event),
            }
        }
        Ok(analytics)
    }
}
