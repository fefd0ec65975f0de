use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

/// Rows created or deleted by a single lifecycle operation, per table.
///
/// For `add` each field is 0 or 1 and tells "already subscribed" apart from
/// "newly subscribed". For guild cascades `channels` is the number of
/// channels processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changes {
    pub subs: usize,
    pub users: usize,
    pub channels: usize,
}

impl Changes {
    pub const fn new(subs: usize, users: usize, channels: usize) -> Self {
        Self {
            subs,
            users,
            channels,
        }
    }
}

impl AddAssign for Changes {
    fn add_assign(&mut self, rhs: Changes) {
        self.subs += rhs.subs;
        self.users += rhs.users;
        self.channels += rhs.channels;
    }
}

/// Rows removed by a forced channel deletion. The channel row itself is
/// always deleted and is not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purged {
    pub subs: usize,
    pub users: usize,
}

impl AddAssign<Purged> for Changes {
    fn add_assign(&mut self, rhs: Purged) {
        self.subs += rhs.subs;
        self.users += rhs.users;
    }
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanityReport {
    /// Subscription rows in the snapshot
    pub checked: usize,
    /// Channels the resolver reported gone
    pub invalid_channels: usize,
    pub purged_subs: usize,
    pub purged_users: usize,
    /// Channel rows recreated for live subscriptions
    pub restored_channels: usize,
    /// User rows recreated with the placeholder name
    pub restored_users: usize,
    /// Rows left alone because the resolver could not give an answer
    pub skipped: usize,
}

impl SanityReport {
    /// Whether the pass changed anything in storage.
    pub const fn is_clean(&self) -> bool {
        self.invalid_channels == 0
            && self.purged_subs == 0
            && self.purged_users == 0
            && self.restored_channels == 0
            && self.restored_users == 0
    }
}
