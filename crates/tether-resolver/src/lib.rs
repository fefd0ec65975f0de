//! Channel resolution: asking the chat platform whether a channel still
//! exists, and which guild and owner it belongs to.

pub mod discord;
pub mod mock;

use async_trait::async_trait;
use thiserror::Error;

use tether_types::{ChannelRef, ResolvedChannel};

pub use discord::DiscordResolver;
pub use mock::MockResolver;

/// Failures that leave the channel's status unknown.
///
/// A channel that is definitely gone is not an error: resolvers report it as
/// `Ok(None)`.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("rate limited")]
    RateLimited,

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected response body: {0}")]
    Decode(String),
}

/// Looks channels up on the platform. Must be free of side effects so it can
/// be called any number of times for the same channel.
#[async_trait]
pub trait ChannelResolver: Send + Sync {
    /// `Ok(Some(_))` for a live channel, `Ok(None)` for one that no longer
    /// exists or is no longer reachable by us.
    async fn resolve(&self, channel: &ChannelRef) -> Result<Option<ResolvedChannel>, ResolveError>;
}

#[async_trait]
impl<R: ChannelResolver + ?Sized> ChannelResolver for std::sync::Arc<R> {
    async fn resolve(&self, channel: &ChannelRef) -> Result<Option<ResolvedChannel>, ResolveError> {
        (**self).resolve(channel).await
    }
}
