pub mod changes;
pub mod models;

pub use changes::{Changes, Purged, SanityReport};
pub use models::{ChannelRef, ResolvedChannel, SubFlags};
