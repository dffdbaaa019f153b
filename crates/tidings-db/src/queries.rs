use crate::Database;
use crate::models::{ActiveTokenRow, EventRow, InsertOutcome, MessageRow, NewMessageRow, UserRow};
use anyhow::Result;
use rusqlite::{Connection, ErrorCode, Row};
use tidings_types::models::{EventKind, TokenScope};

const MESSAGE_COLUMNS: &str = "id, slug, sender_id, recipient_first_name, recipient_last_name, \
     theme, kind, text, video_url, password_hash, password_hint, created_at";

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, email: &str, name: Option<&str>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, name) VALUES (?1, ?2, ?3)",
                (id, email, name),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    // -- Messages --

    /// Insert a message under `slug`. A slug clash is reported as
    /// [`InsertOutcome::SlugTaken`] so the caller can retry with a new one;
    /// any other failure is an error.
    pub fn insert_message(&self, slug: &str, msg: &NewMessageRow) -> Result<InsertOutcome> {
        self.with_conn_mut(|conn| {
            let res = conn.execute(
                "INSERT INTO messages (id, slug, sender_id, recipient_first_name, recipient_last_name,
                                       theme, kind, text, video_url, password_hash, password_hint)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                rusqlite::params![
                    msg.id,
                    slug,
                    msg.sender_id,
                    msg.recipient_first_name,
                    msg.recipient_last_name,
                    msg.theme,
                    msg.kind,
                    msg.text,
                    msg.video_url,
                    msg.password_hash,
                    msg.password_hint,
                ],
            );

            match res {
                Ok(_) => Ok(InsertOutcome::Inserted),
                Err(rusqlite::Error::SqliteFailure(e, Some(detail)))
                    if e.code == ErrorCode::ConstraintViolation
                        && detail.contains("messages.slug") =>
                {
                    Ok(InsertOutcome::SlugTaken)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_message_by_slug(&self, slug: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| query_message(conn, "slug", slug))
    }

    pub fn get_message_by_id(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| query_message(conn, "id", id))
    }

    // -- One-time tokens --

    pub fn insert_token(
        &self,
        id: &str,
        scope: TokenScope,
        scope_id: &str,
        token_hash: &str,
        expires_at_ms: i64,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO access_tokens (id, scope, scope_id, token_hash, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, scope.as_str(), scope_id, token_hash, expires_at_ms],
            )?;
            Ok(())
        })
    }

    /// Tokens of `scope` that are unconsumed and still valid at `now_ms`.
    pub fn active_tokens(&self, scope: TokenScope, now_ms: i64) -> Result<Vec<ActiveTokenRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, scope_id, token_hash FROM access_tokens
                 WHERE scope = ?1 AND consumed = 0 AND expires_at > ?2
                 ORDER BY created_at DESC",
            )?;

            let rows = stmt
                .query_map(rusqlite::params![scope.as_str(), now_ms], |row| {
                    Ok(ActiveTokenRow {
                        id: row.get(0)?,
                        scope_id: row.get(1)?,
                        token_hash: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Flip a token to consumed in one conditional statement.
    ///
    /// Returns true only for the single caller whose update matched an
    /// unconsumed, unexpired row. Everyone else gets false.
    pub fn consume_token(&self, id: &str, now_ms: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE access_tokens SET consumed = 1
                 WHERE id = ?1 AND consumed = 0 AND expires_at > ?2",
                rusqlite::params![id, now_ms],
            )?;
            Ok(changed == 1)
        })
    }

    // -- Access events --

    pub fn insert_event(
        &self,
        id: &str,
        message_id: &str,
        kind: EventKind,
        first_name: &str,
        last_name: &str,
        reply_text: Option<&str>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO access_events (id, message_id, kind, first_name, last_name, reply_text)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, message_id, kind.as_str(), first_name, last_name, reply_text],
            )?;
            Ok(())
        })
    }

    /// All events for a message, oldest first.
    pub fn get_events_for_message(&self, message_id: &str) -> Result<Vec<EventRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, message_id, kind, first_name, last_name, reply_text, created_at
                 FROM access_events
                 WHERE message_id = ?1
                 ORDER BY created_at ASC, rowid ASC",
            )?;

            let rows = stmt
                .query_map([message_id], |row| {
                    Ok(EventRow {
                        id: row.get(0)?,
                        message_id: row.get(1)?,
                        kind: row.get(2)?,
                        first_name: row.get(3)?,
                        last_name: row.get(4)?,
                        reply_text: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

// `column` is always one of our own literals, never user input.
fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT id, email, name, created_at FROM users WHERE {} = ?1", column);
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                name: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_message(conn: &Connection, column: &str, value: &str) -> Result<Option<MessageRow>> {
    let sql = format!("SELECT {} FROM messages WHERE {} = ?1", MESSAGE_COLUMNS, column);
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([value], message_from_row).optional()?;
    Ok(row)
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        slug: row.get(1)?,
        sender_id: row.get(2)?,
        recipient_first_name: row.get(3)?,
        recipient_last_name: row.get(4)?,
        theme: row.get(5)?,
        kind: row.get(6)?,
        text: row.get(7)?,
        video_url: row.get(8)?,
        password_hash: row.get(9)?,
        password_hint: row.get(10)?,
        created_at: row.get(11)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
