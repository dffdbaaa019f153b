use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use tidings_db::models::{EventRow, MessageRow};
use tidings_db::parse_timestamp;
use tidings_types::models::{AccessEvent, EventKind, Message, MessageKind};

use crate::error::ApiError;

fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::Internal(format!("corrupt {} '{}': {}", what, raw, e)))
}

fn timestamp(raw: &str, owner: &str) -> DateTime<Utc> {
    parse_timestamp(raw).unwrap_or_else(|| {
        warn!("Corrupt created_at '{}' on '{}'", raw, owner);
        DateTime::default()
    })
}

pub fn message(row: &MessageRow) -> Result<Message, ApiError> {
    let kind = MessageKind::parse(&row.kind)
        .ok_or_else(|| ApiError::Internal(format!("unknown kind '{}' on message {}", row.kind, row.id)))?;

    Ok(Message {
        id: parse_id(&row.id, "message id")?,
        slug: row.slug.clone(),
        sender_id: parse_id(&row.sender_id, "sender id")?,
        recipient_first_name: row.recipient_first_name.clone(),
        recipient_last_name: row.recipient_last_name.clone(),
        theme: row.theme.clone(),
        kind,
        text: row.text.clone(),
        video_url: row.video_url.clone(),
        password_hint: row.password_hint.clone(),
        created_at: timestamp(&row.created_at, &row.id),
    })
}

/// Rows with an unreadable kind or id are skipped rather than failing the
/// whole listing.
pub fn events(rows: Vec<EventRow>) -> Vec<AccessEvent> {
    rows.into_iter()
        .filter_map(|row| {
            let kind = EventKind::parse(&row.kind).or_else(|| {
                warn!("Unknown event kind '{}' on event {}", row.kind, row.id);
                None
            })?;
            let id = parse_id(&row.id, "event id").ok()?;
            let message_id = parse_id(&row.message_id, "message id").ok()?;
            Some(AccessEvent {
                id,
                message_id,
                kind,
                created_at: timestamp(&row.created_at, &row.id),
                first_name: row.first_name,
                last_name: row.last_name,
                reply_text: row.reply_text,
            })
        })
        .collect()
}
