use tracing::{debug, info, warn};

use tether_db::SubscriptionStore;
use tether_resolver::ChannelResolver;
use tether_types::{ChannelRef, Changes, ResolvedChannel, SubFlags};

use crate::{Result, SubscriptionManager};

impl<S: SubscriptionStore, R: ChannelResolver> SubscriptionManager<S, R> {
    /// Subscribe `user_id` to `channel_id`, or update the flags of an
    /// existing subscription.
    ///
    /// User and channel rows are only looked at when the subscription is new,
    /// so re-adding never creates anything else. Each returned count is 0 or 1.
    pub async fn add(
        &self,
        channel_id: &str,
        user_id: &str,
        name: &str,
        flags: SubFlags,
        is_dm: bool,
    ) -> Result<Changes> {
        let _gate = self.inner.write_gate.lock().await;
        self.add_locked(channel_id, user_id, name, flags, is_dm).await
    }

    /// Remove one subscription, then the user and channel rows if this was
    /// their last subscription.
    pub async fn rm(&self, channel_id: &str, user_id: &str) -> Result<Changes> {
        let _gate = self.inner.write_gate.lock().await;
        self.rm_locked(channel_id, user_id).await
    }

    /// Create the user row unless it already exists. Returns 1 if created.
    pub async fn add_user_if_missing(&self, user_id: &str, name: &str) -> Result<usize> {
        let _gate = self.inner.write_gate.lock().await;
        self.ensure_user(user_id, name).await
    }

    /// Create the channel row unless it already exists, resolving its guild
    /// and owner. Returns 1 if created, 0 if present or unresolvable.
    pub async fn add_channel_if_missing(&self, channel_id: &str, is_dm: bool) -> Result<usize> {
        let _gate = self.inner.write_gate.lock().await;
        self.ensure_channel(&ChannelRef::new(channel_id, is_dm)).await
    }

    /// Store the user's current display name. Writes only when the user is
    /// unknown or the name changed; returns whether it wrote.
    pub async fn update_user(&self, user_id: &str, name: &str) -> Result<bool> {
        let _gate = self.inner.write_gate.lock().await;

        let u = user_id.to_string();
        let current = self.blocking(move |s| s.user(&u)).await?;
        if current.is_some_and(|row| row.name == name) {
            return Ok(false);
        }

        let (u, n) = (user_id.to_string(), name.to_string());
        self.blocking(move |s| s.insert_user(&u, &n)).await?;
        debug!("Updated name of user {} to {}", user_id, name);
        Ok(true)
    }

    pub(crate) async fn add_locked(
        &self,
        channel_id: &str,
        user_id: &str,
        name: &str,
        flags: SubFlags,
        is_dm: bool,
    ) -> Result<Changes> {
        let (c, u) = (channel_id.to_string(), user_id.to_string());
        let subs = self
            .blocking(move |s| s.insert_subscription(&c, &u, flags, is_dm))
            .await?;

        // Existing subscription: only its flags changed
        if subs == 0 {
            debug!("Updated flags of {} on {} to {}", user_id, channel_id, flags);
            return Ok(Changes::default());
        }

        let users = self.ensure_user(user_id, name).await?;
        let channels = self.ensure_channel(&ChannelRef::new(channel_id, is_dm)).await?;

        info!(
            "Subscribed {} to {} (new users: {}, new channels: {})",
            user_id, channel_id, users, channels
        );
        Ok(Changes::new(subs, users, channels))
    }

    pub(crate) async fn rm_locked(&self, channel_id: &str, user_id: &str) -> Result<Changes> {
        let (c, u) = (channel_id.to_string(), user_id.to_string());
        let subs = self.blocking(move |s| s.delete_subscription(&c, &u)).await?;

        if subs == 0 {
            return Ok(Changes::default());
        }

        let users = self.delete_user_if_empty(user_id).await?;
        let channels = self.delete_channel_if_empty(channel_id).await?;

        debug!(
            "Unsubscribed {} from {} (deleted users: {}, deleted channels: {})",
            user_id, channel_id, users, channels
        );
        Ok(Changes::new(subs, users, channels))
    }

    pub(crate) async fn ensure_user(&self, user_id: &str, name: &str) -> Result<usize> {
        let u = user_id.to_string();
        if self.blocking(move |s| s.has_user(&u)).await? {
            return Ok(0);
        }

        let (u, n) = (user_id.to_string(), name.to_string());
        self.blocking(move |s| s.insert_user(&u, &n)).await?;
        Ok(1)
    }

    pub(crate) async fn ensure_channel(&self, channel: &ChannelRef) -> Result<usize> {
        let c = channel.id.clone();
        if self.blocking(move |s| s.has_channel(&c)).await? {
            return Ok(0);
        }

        let resolved = match self.inner.resolver.resolve(channel).await {
            Ok(Some(resolved)) => resolved,
            Ok(None) => {
                warn!("Got a bad channel on a new subscription: {}", channel);
                return Ok(0);
            }
            Err(e) => {
                warn!("Could not resolve new channel {}: {}", channel, e);
                return Ok(0);
            }
        };

        self.store_channel(channel, &resolved).await?;
        Ok(1)
    }

    /// Like `ensure_channel`, with guild and owner already resolved.
    pub(crate) async fn ensure_resolved_channel(
        &self,
        channel: &ChannelRef,
        resolved: &ResolvedChannel,
    ) -> Result<usize> {
        let c = channel.id.clone();
        if self.blocking(move |s| s.has_channel(&c)).await? {
            return Ok(0);
        }

        self.store_channel(channel, resolved).await?;
        Ok(1)
    }

    async fn store_channel(&self, channel: &ChannelRef, resolved: &ResolvedChannel) -> Result<()> {
        // A DM is a one-channel guild it owns, whatever the resolver said
        let resolved = if channel.is_dm {
            ResolvedChannel::direct(&channel.id)
        } else {
            resolved.clone()
        };

        let (c, is_dm) = (channel.id.clone(), channel.is_dm);
        self.blocking(move |s| s.insert_channel(&c, &resolved.guild_id, &resolved.owner_id, is_dm))
            .await?;
        Ok(())
    }

    async fn delete_user_if_empty(&self, user_id: &str) -> Result<usize> {
        let u = user_id.to_string();
        let remaining = self.blocking(move |s| s.count_user_subscriptions(&u)).await?;
        if remaining > 0 {
            return Ok(0);
        }

        // Counted even when the row never existed: the user is now absent
        let u = user_id.to_string();
        self.blocking(move |s| s.delete_user(&u)).await?;
        Ok(1)
    }

    async fn delete_channel_if_empty(&self, channel_id: &str) -> Result<usize> {
        let c = channel_id.to_string();
        let remaining = self.blocking(move |s| s.count_channel_subscriptions(&c)).await?;
        if remaining > 0 {
            return Ok(0);
        }

        let c = channel_id.to_string();
        self.blocking(move |s| s.delete_channel(&c)).await?;
        Ok(1)
    }
}
