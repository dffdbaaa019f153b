//! Message creation: validate, hash, upload (video only), commit.
//!
//! The record is written last, so a failed upload leaves nothing behind in
//! the database. The reverse is not covered: if the commit fails after an
//! upload succeeded, the artifact is orphaned and only logged.

use tracing::{info, warn};
use uuid::Uuid;

use tidings_crypto::tokens::generate_slug;
use tidings_db::Database;
use tidings_db::models::{InsertOutcome, NewMessageRow};
use tidings_types::api::{CreateMessageForm, UploadedFile};
use tidings_types::models::MessageKind;

use crate::error::{ApiError, optional, required};
use crate::state::{AppState, run_blocking};

/// Attempts before a run of slug collisions is treated as a storage fault.
const MAX_SLUG_ATTEMPTS: usize = 5;

#[derive(Debug)]
pub struct CreatedMessage {
    pub id: Uuid,
    pub slug: String,
}

/// A create request that passed validation.
#[derive(Debug)]
pub struct NewMessage {
    pub recipient_first_name: String,
    pub recipient_last_name: String,
    pub password: String,
    pub password_hint: Option<String>,
    pub theme: String,
    pub body: NewBody,
}

#[derive(Debug)]
pub enum NewBody {
    Text(String),
    Video(UploadedFile),
}

impl NewBody {
    fn kind(&self) -> MessageKind {
        match self {
            NewBody::Text(_) => MessageKind::Text,
            NewBody::Video(_) => MessageKind::Video,
        }
    }
}

pub fn validate(form: CreateMessageForm) -> Result<NewMessage, ApiError> {
    let recipient_first_name = required(form.recipient_first_name, "recipientFirstName")?;
    let recipient_last_name = required(form.recipient_last_name, "recipientLastName")?;
    // Passwords are taken verbatim; whitespace is part of the secret.
    let password = form
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::Validation("password is required".into()))?;
    let theme = required(form.theme, "theme")?;
    let kind = required(form.kind, "type")?;

    let body = match MessageKind::parse(&kind) {
        Some(MessageKind::Text) => NewBody::Text(required(form.text, "text")?),
        Some(MessageKind::Video) => match form.file {
            Some(file) if !file.data.is_empty() => NewBody::Video(file),
            _ => {
                return Err(ApiError::Validation(
                    "Video type requires a file upload".into(),
                ));
            }
        },
        None => return Err(ApiError::Validation(format!("unknown message type '{}'", kind))),
    };

    Ok(NewMessage {
        recipient_first_name,
        recipient_last_name,
        password,
        password_hint: optional(form.password_hint),
        theme,
        body,
    })
}

pub async fn create_message(
    state: &AppState,
    sender_id: Uuid,
    form: CreateMessageForm,
) -> Result<CreatedMessage, ApiError> {
    create_message_with(state, sender_id, form, generate_slug).await
}

/// Hashing and the commit run on the blocking pool; only the upload runs
/// on the async runtime.
async fn create_message_with<F>(
    state: &AppState,
    sender_id: Uuid,
    form: CreateMessageForm,
    mut next_slug: F,
) -> Result<CreatedMessage, ApiError>
where
    F: FnMut() -> String + Send + 'static,
{
    let msg = validate(form)?;
    let kind = msg.body.kind();

    let password = msg.password;
    let password_hash =
        run_blocking(state, move |s| s.hasher.hash(&password).map_err(ApiError::Crypto)).await?;

    let (text, video_url) = match msg.body {
        NewBody::Text(text) => (Some(text), None),
        NewBody::Video(file) => {
            let url = state
                .artifacts
                .upload(file)
                .await
                .map_err(ApiError::UploadFailed)?;
            (None, Some(url))
        }
    };

    let id = Uuid::new_v4();
    let uploaded = video_url.clone();
    let row = NewMessageRow {
        id: id.to_string(),
        sender_id: sender_id.to_string(),
        recipient_first_name: msg.recipient_first_name,
        recipient_last_name: msg.recipient_last_name,
        theme: msg.theme,
        kind: kind.as_str().to_string(),
        text,
        video_url,
        password_hash: password_hash.into_string(),
        password_hint: msg.password_hint,
    };

    match run_blocking(state, move |s| commit(&s.db, &row, &mut next_slug)).await {
        Ok(slug) => {
            info!(message_id = %id, %slug, kind = kind.as_str(), "Message created");
            Ok(CreatedMessage { id, slug })
        }
        Err(e) => {
            if let Some(url) = uploaded {
                warn!(message_id = %id, "Commit failed after upload; orphaned artifact {}", url);
            }
            Err(e)
        }
    }
}

fn commit<F>(db: &Database, row: &NewMessageRow, next_slug: &mut F) -> Result<String, ApiError>
where
    F: FnMut() -> String,
{
    for attempt in 1..=MAX_SLUG_ATTEMPTS {
        let slug = next_slug();
        match db.insert_message(&slug, row).map_err(ApiError::Storage)? {
            InsertOutcome::Inserted => return Ok(slug),
            InsertOutcome::SlugTaken => {
                warn!("Slug collision on '{}' (attempt {}), retrying", slug, attempt);
            }
        }
    }

    Err(ApiError::Storage(anyhow::anyhow!(
        "no free slug after {} attempts",
        MAX_SLUG_ATTEMPTS
    )))
}
