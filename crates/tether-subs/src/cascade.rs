use tracing::info;

use tether_db::SubscriptionStore;
use tether_resolver::ChannelResolver;
use tether_types::{Changes, Purged};

use crate::{Result, SubscriptionManager};

impl<S: SubscriptionStore, R: ChannelResolver> SubscriptionManager<S, R> {
    /// Remove every subscription under `channel_id`, cascading to users left
    /// without subscriptions, then delete the channel row itself even if it
    /// had no subscriptions.
    pub async fn delete_channel(&self, channel_id: &str) -> Result<Purged> {
        let _gate = self.inner.write_gate.lock().await;
        self.purge_channel_locked(channel_id).await
    }

    /// Run [`SubscriptionManager::delete_channel`] for every stored channel of
    /// `guild_id`. `channels` in the result is the number of channels processed.
    pub async fn delete_guild(&self, guild_id: &str) -> Result<Changes> {
        let _gate = self.inner.write_gate.lock().await;

        let g = guild_id.to_string();
        let channels = self.blocking(move |s| s.guild_channels(&g)).await?;

        let mut total = Changes::default();
        for channel in &channels {
            total += self.purge_channel_locked(&channel.id).await?;
        }
        total.channels = channels.len();

        info!(
            "Deleted guild {}: {} channels, {} subs, {} users",
            guild_id, total.channels, total.subs, total.users
        );
        Ok(total)
    }

    pub(crate) async fn purge_channel_locked(&self, channel_id: &str) -> Result<Purged> {
        let c = channel_id.to_string();
        let subs = self.blocking(move |s| s.channel_subscriptions(&c)).await?;

        // One at a time: each rm re-reads the user's remaining count
        let mut purged = Purged::default();
        for sub in &subs {
            let changes = self.rm_locked(channel_id, &sub.user_id).await?;
            purged.subs += changes.subs;
            purged.users += changes.users;
        }

        let c = channel_id.to_string();
        self.blocking(move |s| s.delete_channel(&c)).await?;

        info!("Deleted channel {}: {} subs, {} users", channel_id, purged.subs, purged.users);
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use tether_resolver::MockResolver;

    use crate::testutil::{TestManager, manager};
    use crate::*;

    fn resolver() -> MockResolver {
        MockResolver::new()
            .with_channel("C1", "G1", "O1")
            .with_channel("C2", "G1", "O1")
            .with_channel("C3", "G2", "O2")
    }

    async fn seed(m: &TestManager, channel: &str, users: &[&str]) {
        for user in users {
            m.add(channel, user, user, SubFlags::NONE, false).await.unwrap();
        }
    }

    #[tokio::test]
    async fn delete_channel_removes_exclusive_users() {
        let m = manager(resolver());
        seed(&m, "C1", &["U1", "U2", "U3"]).await;

        let purged = m.delete_channel("C1").await.unwrap();
        assert_eq!(purged, Purged { subs: 3, users: 3 });
        assert!(!m.store().has_channel("C1").unwrap());
        assert!(m.user_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_channel_keeps_shared_users() {
        let m = manager(resolver());
        seed(&m, "C1", &["U1", "U2"]).await;
        seed(&m, "C3", &["U2"]).await;

        let purged = m.delete_channel("C1").await.unwrap();
        assert_eq!(purged, Purged { subs: 2, users: 1 });
        assert_eq!(m.user_ids().await.unwrap(), vec!["U2"]);
        assert!(m.store().has_channel("C3").unwrap());
    }

    #[tokio::test]
    async fn delete_channel_without_subscriptions_still_deletes_row() {
        let m = manager(resolver());
        assert_eq!(m.add_channel_if_missing("C2", false).await.unwrap(), 1);

        let purged = m.delete_channel("C2").await.unwrap();
        assert_eq!(purged, Purged::default());
        assert!(!m.store().has_channel("C2").unwrap());

        // Unknown channels are a no-op
        assert_eq!(m.delete_channel("nope").await.unwrap(), Purged::default());
    }

    #[tokio::test]
    async fn delete_guild_sums_channel_results() {
        let m = manager(resolver());
        seed(&m, "C1", &["U1", "U2"]).await;
        seed(&m, "C2", &["U2", "U3"]).await;
        seed(&m, "C3", &["U3", "U4"]).await;

        let changes = m.delete_guild("G1").await.unwrap();
        // U3 survives through C3
        assert_eq!(changes, Changes::new(4, 2, 2));
        assert_eq!(m.user_ids().await.unwrap(), vec!["U3", "U4"]);
        assert!(!m.store().has_channel("C1").unwrap());
        assert!(!m.store().has_channel("C2").unwrap());
        assert!(m.store().has_channel("C3").unwrap());
    }

    #[tokio::test]
    async fn delete_unknown_guild_is_empty() {
        let m = manager(resolver());
        assert_eq!(m.delete_guild("G9").await.unwrap(), Changes::default());
    }
}
