use std::collections::HashMap;

use tracing::{info, warn};

use tether_db::SubscriptionStore;
use tether_resolver::ChannelResolver;
use tether_types::{ResolvedChannel, SanityReport};

use crate::{Result, SubscriptionManager};

/// Name given to users recreated by the reconciler. Overwritten the next time
/// the user's real name is seen.
pub const PLACEHOLDER_NAME: &str = "temp";

/// What one pass has learned about a channel.
#[derive(Debug, Clone)]
enum Verdict {
    Live(ResolvedChannel),
    Gone,
    /// Gone, and already cascaded in this pass
    Purged,
    /// The resolver could not answer
    Unknown,
}

impl<S: SubscriptionStore, R: ChannelResolver> SubscriptionManager<S, R> {
    /// Re-validate every stored subscription against the resolver.
    ///
    /// Channels the resolver reports gone are cascade-deleted. For live
    /// channels, missing channel and user rows are recreated. Rows whose
    /// channel cannot be resolved right now are left alone. Each channel is
    /// resolved at most once per pass.
    ///
    /// The write gate is taken per row, so other operations interleave with a
    /// long pass.
    pub async fn sanity_check(&self) -> Result<SanityReport> {
        let subs = self.blocking(|s| s.all_subscriptions()).await?;
        info!("Starting sanity check on {} subscriptions", subs.len());

        let mut report = SanityReport::default();
        let mut verdicts: HashMap<String, Verdict> = HashMap::new();

        for sub in &subs {
            report.checked += 1;
            let channel = sub.channel_ref();

            let verdict = match verdicts.get(&channel.id) {
                Some(v) => v.clone(),
                None => {
                    let v = match self.inner.resolver.resolve(&channel).await {
                        Ok(Some(resolved)) => Verdict::Live(resolved),
                        Ok(None) => Verdict::Gone,
                        Err(e) => {
                            warn!("Could not resolve channel {}: {}", channel, e);
                            Verdict::Unknown
                        }
                    };
                    verdicts.insert(channel.id.clone(), v.clone());
                    v
                }
            };

            match verdict {
                Verdict::Purged => {}
                Verdict::Unknown => report.skipped += 1,
                Verdict::Gone => {
                    let _gate = self.inner.write_gate.lock().await;
                    if !self.still_subscribed(&sub.channel_id, &sub.user_id).await? {
                        continue;
                    }
                    let purged = self.purge_channel_locked(&channel.id).await?;
                    info!(
                        "Found invalid channel: {}. Deleted {} subs, {} users.",
                        channel, purged.subs, purged.users
                    );
                    report.invalid_channels += 1;
                    report.purged_subs += purged.subs;
                    report.purged_users += purged.users;
                    verdicts.insert(channel.id.clone(), Verdict::Purged);
                }
                Verdict::Live(resolved) => {
                    let _gate = self.inner.write_gate.lock().await;
                    // Removed since the snapshot: restoring parents would orphan them
                    if !self.still_subscribed(&sub.channel_id, &sub.user_id).await? {
                        continue;
                    }
                    if self.ensure_resolved_channel(&channel, &resolved).await? > 0 {
                        info!("Channel wasn't in channels table: {}", channel);
                        report.restored_channels += 1;
                    }
                    if self.ensure_user(&sub.user_id, PLACEHOLDER_NAME).await? > 0 {
                        info!("User {} wasn't in users table", sub.user_id);
                        report.restored_users += 1;
                    }
                }
            }
        }

        info!(
            "Sanity check completed: {} checked, {} invalid channels, {} channels and {} users restored, {} skipped",
            report.checked,
            report.invalid_channels,
            report.restored_channels,
            report.restored_users,
            report.skipped
        );
        Ok(report)
    }

    async fn still_subscribed(&self, channel_id: &str, user_id: &str) -> Result<bool> {
        let (c, u) = (channel_id.to_string(), user_id.to_string());
        let row = self.blocking(move |s| s.subscription(&c, &u)).await?;
        Ok(row.is_some())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use tether_db::Database;
    use tether_resolver::{ChannelResolver, MockResolver, ResolveError};

    use crate::testutil::manager;
    use crate::*;

    /// Resolver that parks every call until released, so writes can land
    /// between the snapshot and the repair.
    #[derive(Clone)]
    struct PausingResolver {
        inner: MockResolver,
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    impl PausingResolver {
        fn new(inner: MockResolver) -> Self {
            Self {
                inner,
                entered: Arc::new(Notify::new()),
                release: Arc::new(Notify::new()),
            }
        }
    }

    #[async_trait]
    impl ChannelResolver for PausingResolver {
        async fn resolve(
            &self,
            channel: &ChannelRef,
        ) -> std::result::Result<Option<ResolvedChannel>, ResolveError> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.resolve(channel).await
        }
    }

    /// Seed one consistent subscription straight into storage, start a pass,
    /// and `rm` it while the pass waits on the resolver.
    async fn rm_during_pass(inner: MockResolver) -> (SanityReport, Changes, Arc<Database>) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.insert_user("U1", "Alice").unwrap();
        db.insert_channel("C1", "G1", "O1", false).unwrap();
        db.insert_subscription("C1", "U1", SubFlags::NONE, false).unwrap();

        let resolver = PausingResolver::new(inner);
        let m = SubscriptionManager::new(db.clone(), resolver.clone());

        let writer = async {
            resolver.entered.notified().await;
            let removed = m.rm("C1", "U1").await.unwrap();
            resolver.release.notify_one();
            removed
        };
        let (report, removed) = tokio::join!(m.sanity_check(), writer);
        (report.unwrap(), removed, db)
    }

    #[tokio::test]
    async fn rm_during_pass_is_not_undone() {
        let (report, removed, db) = rm_during_pass(MockResolver::new().with_channel("C1", "G1", "O1")).await;

        assert_eq!(removed, Changes::new(1, 1, 1));
        assert_eq!(report.checked, 1);
        assert!(report.is_clean());
        assert!(db.get_user_ids().unwrap().is_empty());
        assert!(!db.has_channel("C1").unwrap());
    }

    #[tokio::test]
    async fn rm_during_pass_is_not_counted_as_purge() {
        // C1 unknown to the resolver: gone by the time the pass resumes
        let (report, removed, db) = rm_during_pass(MockResolver::new()).await;

        assert_eq!(removed, Changes::new(1, 1, 1));
        assert_eq!(report.invalid_channels, 0);
        assert_eq!(report.purged_subs, 0);
        assert!(db.get_all_subscriptions().unwrap().is_empty());
        assert!(db.get_user_ids().unwrap().is_empty());
    }

    #[tokio::test]
    async fn consistent_store_is_a_fixed_point() {
        let resolver = MockResolver::new()
            .with_channel("C1", "G1", "O1")
            .with_dm("D1");
        let m = manager(resolver);
        m.add("C1", "U1", "Alice", SubFlags::NONE, false).await.unwrap();
        m.add("C1", "U2", "Bob", SubFlags::NONE, false).await.unwrap();
        m.add("D1", "U1", "Alice", SubFlags::NONE, true).await.unwrap();

        let first = m.sanity_check().await.unwrap();
        assert_eq!(first.checked, 3);
        assert!(first.is_clean());

        let second = m.sanity_check().await.unwrap();
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn vanished_channel_is_cascaded_once() {
        let resolver = MockResolver::new()
            .with_channel("C1", "G1", "O1")
            .with_channel("C2", "G1", "O1");
        let m = manager(resolver.clone());
        m.add("C1", "U1", "Alice", SubFlags::NONE, false).await.unwrap();
        m.add("C1", "U2", "Bob", SubFlags::NONE, false).await.unwrap();
        m.add("C2", "U2", "Bob", SubFlags::NONE, false).await.unwrap();

        // Deleted on the platform without us hearing about it
        resolver.remove("C1");
        let calls_before = resolver.call_count();

        let report = m.sanity_check().await.unwrap();
        assert_eq!(report.invalid_channels, 1);
        assert_eq!(report.purged_subs, 2);
        assert_eq!(report.purged_users, 1);
        // C1 and C2 resolved once each despite C1 having two rows
        let pass_calls: Vec<String> = resolver.calls()[calls_before..].iter().map(|c| c.id.clone()).collect();
        assert_eq!(pass_calls, vec!["C1", "C2"]);

        assert!(!m.store().has_channel("C1").unwrap());
        assert_eq!(m.user_ids().await.unwrap(), vec!["U2"]);

        let again = m.sanity_check().await.unwrap();
        assert!(again.is_clean());
        assert_eq!(again.checked, 1);
    }

    #[tokio::test]
    async fn missing_parent_rows_are_restored() {
        let resolver = MockResolver::new().with_channel("C1", "G1", "O1");
        let m = manager(resolver);

        // Out-of-band writes: subscription rows with no parents
        m.store().insert_subscription("C1", "U1", SubFlags::NONE, false).unwrap();
        m.store().insert_subscription("C1", "U2", SubFlags::NONE, false).unwrap();

        let report = m.sanity_check().await.unwrap();
        assert_eq!(report.restored_channels, 1);
        assert_eq!(report.restored_users, 2);

        let channel = m.store().get_channel("C1").unwrap().unwrap();
        assert_eq!(channel.guild_id, "G1");
        assert_eq!(channel.owner_id, "O1");
        assert_eq!(m.user("U1").await.unwrap().unwrap().name, PLACEHOLDER_NAME);

        // The real name wins on the next interaction
        assert!(m.update_user("U1", "Alice").await.unwrap());

        assert!(m.sanity_check().await.unwrap().is_clean());
    }

    #[tokio::test]
    async fn unresolvable_channels_are_skipped_not_deleted() {
        let resolver = MockResolver::new().with_channel("C1", "G1", "O1");
        let m = manager(resolver.clone());
        m.add("C1", "U1", "Alice", SubFlags::NONE, false).await.unwrap();
        m.add("C1", "U2", "Bob", SubFlags::NONE, false).await.unwrap();

        resolver.fail("C1", ResolveError::Network("connection reset".into()));
        let report = m.sanity_check().await.unwrap();
        assert_eq!(report.skipped, 2);
        assert!(report.is_clean());
        assert!(m.store().has_channel("C1").unwrap());
        assert_eq!(m.user_ids().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn subscription_added_while_resolver_failed_heals() {
        let resolver = MockResolver::new().with_channel("C1", "G1", "O1");
        resolver.fail("C1", ResolveError::RateLimited);
        let m = manager(resolver.clone());

        let changes = m.add("C1", "U1", "Alice", SubFlags::NONE, false).await.unwrap();
        assert_eq!(changes.channels, 0);

        resolver.clear_failure("C1");
        let report = m.sanity_check().await.unwrap();
        assert_eq!(report.restored_channels, 1);
        assert_eq!(report.restored_users, 0);
        assert!(m.store().has_channel("C1").unwrap());
    }
}
