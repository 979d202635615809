use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Timestamps are RFC 3339 UTC with milliseconds so they sort as text.
const SCHEMA_V1: &str = "
    CREATE TABLE users (
        id          TEXT PRIMARY KEY,
        username    TEXT NOT NULL UNIQUE,
        first_name  TEXT NOT NULL DEFAULT '',
        last_name   TEXT NOT NULL DEFAULT '',
        email       TEXT NOT NULL DEFAULT '',
        password    TEXT NOT NULL,
        created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );

    CREATE TABLE post_groups (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        title       TEXT NOT NULL,
        slug        TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL
    );

    CREATE TABLE posts (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        text        TEXT NOT NULL,
        author_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        group_id    INTEGER REFERENCES post_groups(id) ON DELETE SET NULL,
        image       TEXT,
        created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );

    CREATE INDEX idx_posts_created ON posts(created_at, id);
    CREATE INDEX idx_posts_author ON posts(author_id, created_at);
    CREATE INDEX idx_posts_group ON posts(group_id, created_at);

    CREATE TABLE comments (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        post_id     INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
        author_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        text        TEXT NOT NULL,
        created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );

    CREATE INDEX idx_comments_post ON comments(post_id, created_at);

    CREATE TABLE follows (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        author_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        UNIQUE(user_id, author_id),
        CHECK(user_id <> author_id)
    );

    CREATE INDEX idx_follows_author ON follows(author_id);

    INSERT INTO schema_version (version) VALUES (1);
";

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(SCHEMA_V1)?;
    }

    info!("Database migrations complete");
    Ok(())
}
