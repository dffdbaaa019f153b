/// Database row types. These map directly to SQLite rows.
/// Distinct from tidings-types models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub slug: String,
    pub sender_id: String,
    pub recipient_first_name: String,
    pub recipient_last_name: String,
    pub theme: String,
    pub kind: String,
    pub text: Option<String>,
    pub video_url: Option<String>,
    pub password_hash: String,
    pub password_hint: Option<String>,
    pub created_at: String,
}

/// Everything needed to insert a message except the slug, which is
/// chosen per attempt.
pub struct NewMessageRow {
    pub id: String,
    pub sender_id: String,
    pub recipient_first_name: String,
    pub recipient_last_name: String,
    pub theme: String,
    pub kind: String,
    pub text: Option<String>,
    pub video_url: Option<String>,
    pub password_hash: String,
    pub password_hint: Option<String>,
}

/// An unconsumed, unexpired token as seen by the verifier scan.
pub struct ActiveTokenRow {
    pub id: String,
    pub scope_id: String,
    pub token_hash: String,
}

pub struct EventRow {
    pub id: String,
    pub message_id: String,
    pub kind: String,
    pub first_name: String,
    pub last_name: String,
    pub reply_text: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The slug is already used by another message; nothing was written.
    SlugTaken,
}
