//! In-memory resolver for deterministic tests.
//!
//! Channels are registered up front; anything unregistered resolves as gone.
//! Every call is recorded so tests can assert how often the platform would
//! have been hit.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use tether_types::{ChannelRef, ResolvedChannel};

use crate::{ChannelResolver, ResolveError};

/// Mock resolver. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockResolver {
    inner: Arc<Mutex<MockResolverInner>>,
}

#[derive(Debug, Default)]
struct MockResolverInner {
    channels: HashMap<String, ResolvedChannel>,
    failing: HashMap<String, ResolveError>,
    calls: Vec<ChannelRef>,
}

impl MockResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live guild channel.
    pub fn with_channel(self, channel_id: &str, guild_id: &str, owner_id: &str) -> Self {
        self.insert(channel_id, guild_id, owner_id);
        self
    }

    /// Register a live DM recipient.
    pub fn with_dm(self, user_id: &str) -> Self {
        self.insert(user_id, user_id, user_id);
        self
    }

    pub fn insert(&self, channel_id: &str, guild_id: &str, owner_id: &str) {
        self.lock().channels.insert(
            channel_id.to_string(),
            ResolvedChannel {
                guild_id: guild_id.to_string(),
                owner_id: owner_id.to_string(),
            },
        );
    }

    /// Make a channel disappear, as if deleted on the platform.
    pub fn remove(&self, channel_id: &str) {
        self.lock().channels.remove(channel_id);
    }

    /// Make lookups of `channel_id` fail with `err` until cleared.
    pub fn fail(&self, channel_id: &str, err: ResolveError) {
        self.lock().failing.insert(channel_id.to_string(), err);
    }

    pub fn clear_failure(&self, channel_id: &str) {
        self.lock().failing.remove(channel_id);
    }

    /// Every channel passed to `resolve`, in call order.
    pub fn calls(&self) -> Vec<ChannelRef> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockResolverInner> {
        // A panicking test poisons the lock; the data is still usable
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ChannelResolver for MockResolver {
    async fn resolve(&self, channel: &ChannelRef) -> Result<Option<ResolvedChannel>, ResolveError> {
        let mut inner = self.lock();
        inner.calls.push(channel.clone());

        if let Some(err) = inner.failing.get(&channel.id) {
            return Err(err.clone());
        }
        Ok(inner.channels.get(&channel.id).cloned())
    }
}
