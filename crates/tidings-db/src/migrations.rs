use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                email       TEXT NOT NULL UNIQUE,
                name        TEXT,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE messages (
                id                    TEXT PRIMARY KEY,
                slug                  TEXT NOT NULL UNIQUE,
                sender_id             TEXT NOT NULL REFERENCES users(id),
                recipient_first_name  TEXT NOT NULL,
                recipient_last_name   TEXT NOT NULL,
                theme                 TEXT NOT NULL,
                kind                  TEXT NOT NULL CHECK (kind IN ('text', 'video')),
                text                  TEXT,
                video_url             TEXT,
                password_hash         TEXT NOT NULL,
                password_hint         TEXT,
                created_at            TEXT NOT NULL DEFAULT (datetime('now'))
            );

            -- Login and share tokens. scope_id is a user id or a message id
            -- depending on scope. expires_at is unix milliseconds.
            CREATE TABLE access_tokens (
                id          TEXT PRIMARY KEY,
                scope       TEXT NOT NULL CHECK (scope IN ('login', 'share')),
                scope_id    TEXT NOT NULL,
                token_hash  TEXT NOT NULL,
                expires_at  INTEGER NOT NULL,
                consumed    INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_access_tokens_active
                ON access_tokens(scope, consumed, expires_at);

            CREATE TABLE access_events (
                id          TEXT PRIMARY KEY,
                message_id  TEXT NOT NULL REFERENCES messages(id),
                kind        TEXT NOT NULL CHECK (kind IN ('open', 'download', 'reply')),
                first_name  TEXT NOT NULL,
                last_name   TEXT NOT NULL,
                reply_text  TEXT,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_access_events_message
                ON access_events(message_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
