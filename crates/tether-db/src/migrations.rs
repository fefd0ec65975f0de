use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub const SCHEMA_VERSION: i64 = 1;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version = current_version(conn)?;

    if version < 1 {
        info!("Running migration v1 (users, channels, subscriptions)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE channels (
                id          TEXT PRIMARY KEY,
                guild_id    TEXT NOT NULL,
                owner_id    TEXT NOT NULL,
                is_dm       INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_channels_guild ON channels(guild_id);

            -- No REFERENCES clauses: parent rows are created and removed by
            -- the lifecycle layer, which tolerates transient orphans.
            CREATE TABLE subscriptions (
                channel_id  TEXT NOT NULL,
                user_id     TEXT NOT NULL,
                flags       INTEGER NOT NULL DEFAULT 0,
                is_dm       INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (channel_id, user_id)
            );

            CREATE INDEX idx_subscriptions_user ON subscriptions(user_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

pub fn current_version(conn: &Connection) -> Result<i64> {
    let version = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| {
        r.get(0)
    })?;
    Ok(version)
}
