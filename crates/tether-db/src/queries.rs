use crate::models::{ChannelRow, SubscriptionRow, UserRow};
use crate::Database;
use anyhow::Result;
use rusqlite::{Connection, Row, params};
use tether_types::SubFlags;

const SUB_COLUMNS: &str = "channel_id, user_id, flags, is_dm, created_at";
const CHANNEL_COLUMNS: &str = "id, guild_id, owner_id, is_dm, created_at";

impl Database {
    // -- Subscriptions --

    /// Insert a subscription, or update the flags of an existing one. `is_dm`
    /// is only written on insert.
    /// Returns 1 when a new row was created and 0 when an existing row was updated.
    pub fn insert_subscription(
        &self,
        channel_id: &str,
        user_id: &str,
        flags: SubFlags,
        is_dm: bool,
    ) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO subscriptions (channel_id, user_id, flags, is_dm) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(channel_id, user_id) DO NOTHING",
                params![channel_id, user_id, flags.bits(), is_dm],
            )?;

            if inserted == 0 {
                conn.execute(
                    "UPDATE subscriptions SET flags = ?3 WHERE channel_id = ?1 AND user_id = ?2",
                    params![channel_id, user_id, flags.bits()],
                )?;
            }
            Ok(inserted)
        })
    }

    /// Returns the number of rows removed (0 or 1).
    pub fn delete_subscription(&self, channel_id: &str, user_id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute(
                "DELETE FROM subscriptions WHERE channel_id = ?1 AND user_id = ?2",
                [channel_id, user_id],
            )?;
            Ok(removed)
        })
    }

    pub fn get_subscription(&self, channel_id: &str, user_id: &str) -> Result<Option<SubscriptionRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {SUB_COLUMNS} FROM subscriptions WHERE channel_id = ?1 AND user_id = ?2"),
                [channel_id, user_id],
                subscription_from_row,
            )
            .optional()
        })
    }

    pub fn count_user_subscriptions(&self, user_id: &str) -> Result<usize> {
        self.with_conn(|conn| count(conn, "SELECT COUNT(*) FROM subscriptions WHERE user_id = ?1", user_id))
    }

    pub fn count_channel_subscriptions(&self, channel_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            count(conn, "SELECT COUNT(*) FROM subscriptions WHERE channel_id = ?1", channel_id)
        })
    }

    pub fn get_all_subscriptions(&self) -> Result<Vec<SubscriptionRow>> {
        self.with_conn(|conn| {
            query_subscriptions(
                conn,
                &format!("SELECT {SUB_COLUMNS} FROM subscriptions ORDER BY channel_id, user_id"),
                None,
            )
        })
    }

    pub fn get_channel_subscriptions(&self, channel_id: &str) -> Result<Vec<SubscriptionRow>> {
        self.with_conn(|conn| {
            query_subscriptions(
                conn,
                &format!("SELECT {SUB_COLUMNS} FROM subscriptions WHERE channel_id = ?1 ORDER BY user_id"),
                Some(channel_id),
            )
        })
    }

    pub fn get_user_subscriptions(&self, user_id: &str) -> Result<Vec<SubscriptionRow>> {
        self.with_conn(|conn| {
            query_subscriptions(
                conn,
                &format!("SELECT {SUB_COLUMNS} FROM subscriptions WHERE user_id = ?1 ORDER BY channel_id"),
                Some(user_id),
            )
        })
    }

    /// Subscriptions of every channel stored under `guild_id`. Subscriptions
    /// whose channel row is missing are not visible here.
    pub fn get_guild_subscriptions(&self, guild_id: &str) -> Result<Vec<SubscriptionRow>> {
        self.with_conn(|conn| {
            query_subscriptions(
                conn,
                "SELECT s.channel_id, s.user_id, s.flags, s.is_dm, s.created_at
                 FROM subscriptions s
                 JOIN channels c ON c.id = s.channel_id
                 WHERE c.guild_id = ?1
                 ORDER BY s.channel_id, s.user_id",
                Some(guild_id),
            )
        })
    }

    // -- Users --

    /// Create a user, or overwrite the display name of an existing one.
    pub fn insert_user(&self, id: &str, name: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "INSERT INTO users (id, name) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name",
                [id, name],
            )?;
            Ok(n)
        })
    }

    pub fn delete_user(&self, id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| Ok(conn.execute("DELETE FROM users WHERE id = ?1", [id])?))
    }

    pub fn has_user(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| exists(conn, "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)", id))
    }

    pub fn get_user(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, created_at FROM users WHERE id = ?1",
                [id],
                user_from_row,
            )
            .optional()
        })
    }

    /// Case-insensitive lookup by display name.
    pub fn get_user_by_name(&self, name: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, created_at FROM users WHERE name = ?1 COLLATE NOCASE ORDER BY id LIMIT 1",
                [name],
                user_from_row,
            )
            .optional()
        })
    }

    pub fn get_user_ids(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM users ORDER BY id")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }

    // -- Channels --

    pub fn insert_channel(&self, id: &str, guild_id: &str, owner_id: &str, is_dm: bool) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "INSERT INTO channels (id, guild_id, owner_id, is_dm) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    guild_id = excluded.guild_id,
                    owner_id = excluded.owner_id,
                    is_dm = excluded.is_dm",
                params![id, guild_id, owner_id, is_dm],
            )?;
            Ok(n)
        })
    }

    pub fn delete_channel(&self, id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| Ok(conn.execute("DELETE FROM channels WHERE id = ?1", [id])?))
    }

    pub fn has_channel(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| exists(conn, "SELECT EXISTS(SELECT 1 FROM channels WHERE id = ?1)", id))
    }

    pub fn get_channel(&self, id: &str) -> Result<Option<ChannelRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {CHANNEL_COLUMNS} FROM channels WHERE id = ?1"),
                [id],
                channel_from_row,
            )
            .optional()
        })
    }

    pub fn get_guild_channels(&self, guild_id: &str) -> Result<Vec<ChannelRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CHANNEL_COLUMNS} FROM channels WHERE guild_id = ?1 ORDER BY id"
            ))?;
            let rows = stmt
                .query_map([guild_id], channel_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// One channel per guild (the lowest id). DMs are one-channel guilds and
    /// always appear.
    pub fn get_unique_channels(&self) -> Result<Vec<ChannelRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CHANNEL_COLUMNS} FROM channels
                 WHERE id IN (SELECT MIN(id) FROM channels GROUP BY guild_id)
                 ORDER BY id"
            ))?;
            let rows = stmt
                .query_map([], channel_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn count(conn: &Connection, sql: &str, key: &str) -> Result<usize> {
    let n: i64 = conn.query_row(sql, [key], |row| row.get(0))?;
    Ok(n as usize)
}

fn exists(conn: &Connection, sql: &str, key: &str) -> Result<bool> {
    let found: bool = conn.query_row(sql, [key], |row| row.get(0))?;
    Ok(found)
}

fn query_subscriptions(conn: &Connection, sql: &str, key: Option<&str>) -> Result<Vec<SubscriptionRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = match key {
        Some(key) => stmt.query_map([key], subscription_from_row)?,
        None => stmt.query_map([], subscription_from_row)?,
    }
    .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn subscription_from_row(row: &Row<'_>) -> rusqlite::Result<SubscriptionRow> {
    Ok(SubscriptionRow {
        channel_id: row.get(0)?,
        user_id: row.get(1)?,
        flags: SubFlags::from_bits(row.get(2)?),
        is_dm: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn channel_from_row(row: &Row<'_>) -> rusqlite::Result<ChannelRow> {
    Ok(ChannelRow {
        id: row.get(0)?,
        guild_id: row.get(1)?,
        owner_id: row.get(2)?,
        is_dm: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
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
