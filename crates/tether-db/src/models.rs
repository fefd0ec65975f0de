//! Database row types — these map directly to SQLite rows.
//! Distinct from tether-types values to keep the DB layer independent.
use tether_types::{ChannelRef, SubFlags};

/// `created_at` columns hold SQLite's "YYYY-MM-DD HH:MM:SS" UTC text as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRow {
    pub id: String,
    pub guild_id: String,
    pub owner_id: String,
    pub is_dm: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRow {
    pub channel_id: String,
    pub user_id: String,
    pub flags: SubFlags,
    pub is_dm: bool,
    pub created_at: String,
}

impl SubscriptionRow {
    pub fn channel_ref(&self) -> ChannelRef {
        ChannelRef::new(self.channel_id.clone(), self.is_dm)
    }
}
