//! Keeps users, channels and subscriptions consistent on top of a store that
//! has no foreign keys.
//!
//! - [`SubscriptionManager::add`] / [`SubscriptionManager::rm`] create and
//!   remove single subscriptions, creating or deleting the parent rows.
//! - [`SubscriptionManager::delete_channel`] / [`SubscriptionManager::delete_guild`]
//!   force-remove everything under a channel or guild.
//! - [`SubscriptionManager::sanity_check`] re-validates every subscription
//!   against the resolver and repairs drift.
//!
//! Every mutating operation holds the manager's write gate for its whole
//! cascade, so "remaining subscriptions" counts are never read while another
//! cascade is half done.

pub mod cascade;
pub mod error;
pub mod lifecycle;
pub mod reconcile;

use std::sync::Arc;

use tokio::sync::Mutex;

use tether_db::SubscriptionStore;
use tether_resolver::ChannelResolver;

pub use error::{Error, Result};
pub use reconcile::PLACEHOLDER_NAME;
pub use tether_db::{ChannelRow, SubscriptionRow, UserRow};
pub use tether_types::{ChannelRef, Changes, Purged, ResolvedChannel, SanityReport, SubFlags};

/// Entry point for all subscription lifecycle work. Clones share state.
pub struct SubscriptionManager<S, R> {
    inner: Arc<ManagerInner<S, R>>,
}

struct ManagerInner<S, R> {
    store: Arc<S>,
    resolver: R,
    /// Serializes cascades
    write_gate: Mutex<()>,
}

impl<S, R> Clone for SubscriptionManager<S, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: SubscriptionStore, R: ChannelResolver> SubscriptionManager<S, R> {
    pub fn new(store: Arc<S>, resolver: R) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                store,
                resolver,
                write_gate: Mutex::new(()),
            }),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.inner.store
    }

    pub fn resolver(&self) -> &R {
        &self.inner.resolver
    }

    /// Run a store call off the async runtime.
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&S) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.inner.store);
        let out = tokio::task::spawn_blocking(move || f(&store)).await?;
        Ok(out?)
    }

    // -- Reads --

    pub async fn subscription(&self, channel_id: &str, user_id: &str) -> Result<Option<SubscriptionRow>> {
        let (c, u) = (channel_id.to_string(), user_id.to_string());
        self.blocking(move |s| s.subscription(&c, &u)).await
    }

    pub async fn user(&self, user_id: &str) -> Result<Option<UserRow>> {
        let u = user_id.to_string();
        self.blocking(move |s| s.user(&u)).await
    }

    pub async fn user_by_name(&self, name: &str) -> Result<Option<UserRow>> {
        let name = name.to_string();
        self.blocking(move |s| s.user_by_name(&name)).await
    }

    pub async fn user_ids(&self) -> Result<Vec<String>> {
        self.blocking(|s| s.user_ids()).await
    }

    pub async fn user_subscriptions(&self, user_id: &str) -> Result<Vec<SubscriptionRow>> {
        let u = user_id.to_string();
        self.blocking(move |s| s.user_subscriptions(&u)).await
    }

    pub async fn channel_subscriptions(&self, channel_id: &str) -> Result<Vec<SubscriptionRow>> {
        let c = channel_id.to_string();
        self.blocking(move |s| s.channel_subscriptions(&c)).await
    }

    pub async fn guild_subscriptions(&self, guild_id: &str) -> Result<Vec<SubscriptionRow>> {
        let g = guild_id.to_string();
        self.blocking(move |s| s.guild_subscriptions(&g)).await
    }

    /// One channel per guild; DMs count as one-channel guilds.
    pub async fn unique_channels(&self) -> Result<Vec<ChannelRow>> {
        self.blocking(|s| s.unique_channels()).await
    }
}
