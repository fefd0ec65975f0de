use anyhow::Result;
use tether_types::SubFlags;

use crate::Database;
use crate::models::{ChannelRow, SubscriptionRow, UserRow};

/// Storage primitives the lifecycle layer is built on.
///
/// Each method touches exactly one table and knows nothing about the others.
/// Write methods return the number of rows they affected so callers can gate
/// follow-up work on what actually happened. List methods return a snapshot
/// taken at call time.
pub trait SubscriptionStore: Send + Sync + 'static {
    /// 1 if a new row was inserted, 0 if an existing row was updated.
    fn insert_subscription(&self, channel_id: &str, user_id: &str, flags: SubFlags, is_dm: bool) -> Result<usize>;
    fn delete_subscription(&self, channel_id: &str, user_id: &str) -> Result<usize>;
    fn count_user_subscriptions(&self, user_id: &str) -> Result<usize>;
    fn count_channel_subscriptions(&self, channel_id: &str) -> Result<usize>;

    fn insert_user(&self, user_id: &str, name: &str) -> Result<usize>;
    fn delete_user(&self, user_id: &str) -> Result<usize>;
    fn has_user(&self, user_id: &str) -> Result<bool>;

    fn insert_channel(&self, channel_id: &str, guild_id: &str, owner_id: &str, is_dm: bool) -> Result<usize>;
    fn delete_channel(&self, channel_id: &str) -> Result<usize>;
    fn has_channel(&self, channel_id: &str) -> Result<bool>;

    fn all_subscriptions(&self) -> Result<Vec<SubscriptionRow>>;
    fn channel_subscriptions(&self, channel_id: &str) -> Result<Vec<SubscriptionRow>>;
    fn guild_channels(&self, guild_id: &str) -> Result<Vec<ChannelRow>>;

    // Lookups that never feed a cascade decision.
    fn subscription(&self, channel_id: &str, user_id: &str) -> Result<Option<SubscriptionRow>>;
    fn user_subscriptions(&self, user_id: &str) -> Result<Vec<SubscriptionRow>>;
    fn guild_subscriptions(&self, guild_id: &str) -> Result<Vec<SubscriptionRow>>;
    fn user(&self, user_id: &str) -> Result<Option<UserRow>>;
    fn user_by_name(&self, name: &str) -> Result<Option<UserRow>>;
    fn user_ids(&self) -> Result<Vec<String>>;
    fn unique_channels(&self) -> Result<Vec<ChannelRow>>;
}

impl SubscriptionStore for Database {
    fn insert_subscription(&self, channel_id: &str, user_id: &str, flags: SubFlags, is_dm: bool) -> Result<usize> {
        Database::insert_subscription(self, channel_id, user_id, flags, is_dm)
    }

    fn delete_subscription(&self, channel_id: &str, user_id: &str) -> Result<usize> {
        Database::delete_subscription(self, channel_id, user_id)
    }

    fn count_user_subscriptions(&self, user_id: &str) -> Result<usize> {
        Database::count_user_subscriptions(self, user_id)
    }

    fn count_channel_subscriptions(&self, channel_id: &str) -> Result<usize> {
        Database::count_channel_subscriptions(self, channel_id)
    }

    fn insert_user(&self, user_id: &str, name: &str) -> Result<usize> {
        Database::insert_user(self, user_id, name)
    }

    fn delete_user(&self, user_id: &str) -> Result<usize> {
        Database::delete_user(self, user_id)
    }

    fn has_user(&self, user_id: &str) -> Result<bool> {
        Database::has_user(self, user_id)
    }

    fn insert_channel(&self, channel_id: &str, guild_id: &str, owner_id: &str, is_dm: bool) -> Result<usize> {
        Database::insert_channel(self, channel_id, guild_id, owner_id, is_dm)
    }

    fn delete_channel(&self, channel_id: &str) -> Result<usize> {
        Database::delete_channel(self, channel_id)
    }

    fn has_channel(&self, channel_id: &str) -> Result<bool> {
        Database::has_channel(self, channel_id)
    }

    fn all_subscriptions(&self) -> Result<Vec<SubscriptionRow>> {
        self.get_all_subscriptions()
    }

    fn channel_subscriptions(&self, channel_id: &str) -> Result<Vec<SubscriptionRow>> {
        self.get_channel_subscriptions(channel_id)
    }

    fn guild_channels(&self, guild_id: &str) -> Result<Vec<ChannelRow>> {
        self.get_guild_channels(guild_id)
    }

    fn subscription(&self, channel_id: &str, user_id: &str) -> Result<Option<SubscriptionRow>> {
        self.get_subscription(channel_id, user_id)
    }

    fn user_subscriptions(&self, user_id: &str) -> Result<Vec<SubscriptionRow>> {
        self.get_user_subscriptions(user_id)
    }

    fn guild_subscriptions(&self, guild_id: &str) -> Result<Vec<SubscriptionRow>> {
        self.get_guild_subscriptions(guild_id)
    }

    fn user(&self, user_id: &str) -> Result<Option<UserRow>> {
        self.get_user(user_id)
    }

    fn user_by_name(&self, name: &str) -> Result<Option<UserRow>> {
        self.get_user_by_name(name)
    }

    fn user_ids(&self) -> Result<Vec<String>> {
        self.get_user_ids()
    }

    fn unique_channels(&self) -> Result<Vec<ChannelRow>> {
        self.get_unique_channels()
    }
}
