use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// Feature bits a subscription opts into.
///
/// Stored as a plain integer column. Bits this crate does not name are kept
/// as-is so newer writers never lose data through older readers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubFlags(u32);

impl SubFlags {
    pub const NONE: SubFlags = SubFlags(0);
    /// Forward reposts of other accounts' posts
    pub const RETWEETS: SubFlags = SubFlags(1 << 0);
    /// Forward replies to other accounts
    pub const REPLIES: SubFlags = SubFlags(1 << 1);
    /// Drop quoted posts
    pub const NO_QUOTES: SubFlags = SubFlags(1 << 2);
    /// Only forward posts carrying media
    pub const MEDIA_ONLY: SubFlags = SubFlags(1 << 3);
    /// Mention the channel when forwarding
    pub const PING: SubFlags = SubFlags(1 << 4);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: SubFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: SubFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: SubFlags) {
        self.0 &= !other.0;
    }
}

impl BitOr for SubFlags {
    type Output = SubFlags;

    fn bitor(self, rhs: SubFlags) -> SubFlags {
        SubFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for SubFlags {
    fn bitor_assign(&mut self, rhs: SubFlags) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for SubFlags {
    type Output = SubFlags;

    fn bitand(self, rhs: SubFlags) -> SubFlags {
        SubFlags(self.0 & rhs.0)
    }
}

impl From<u32> for SubFlags {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl fmt::Display for SubFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#07b}", self.0)
    }
}

/// A channel as seen from the outside: its id and whether it is a direct
/// message. For DMs the id is the recipient's account id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelRef {
    pub id: String,
    pub is_dm: bool,
}

impl ChannelRef {
    pub fn new(id: impl Into<String>, is_dm: bool) -> Self {
        Self {
            id: id.into(),
            is_dm,
        }
    }

    pub fn guild(id: impl Into<String>) -> Self {
        Self::new(id, false)
    }

    pub fn dm(id: impl Into<String>) -> Self {
        Self::new(id, true)
    }
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dm {
            write!(f, "dm:{}", self.id)
        } else {
            write!(f, "{}", self.id)
        }
    }
}

/// What the resolver knows about a live channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedChannel {
    pub guild_id: String,
    pub owner_id: String,
}

impl ResolvedChannel {
    /// A DM is a one-channel guild owned by itself.
    pub fn direct(channel_id: &str) -> Self {
        Self {
            guild_id: channel_id.to_string(),
            owner_id: channel_id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_combine_and_test() {
        let mut flags = SubFlags::RETWEETS | SubFlags::PING;
        assert!(flags.contains(SubFlags::RETWEETS));
        assert!(!flags.contains(SubFlags::REPLIES));

        flags.insert(SubFlags::REPLIES);
        flags.remove(SubFlags::PING);
        assert_eq!(flags, SubFlags::RETWEETS | SubFlags::REPLIES);
        assert!(SubFlags::NONE.is_empty());
    }

    #[test]
    fn unknown_bits_survive() {
        let flags = SubFlags::from_bits(0x8000_0001);
        assert_eq!(flags.bits(), 0x8000_0001);
        assert!(flags.contains(SubFlags::RETWEETS));
    }

    #[test]
    fn flags_serialize_as_integer() {
        let json = serde_json::to_string(&(SubFlags::REPLIES | SubFlags::MEDIA_ONLY)).unwrap();
        assert_eq!(json, "10");
        let back: SubFlags = serde_json::from_str(&json).unwrap();
        assert_eq!(back.bits(), 10);
    }

    #[test]
    fn direct_channel_owns_itself() {
        let r = ResolvedChannel::direct("42");
        assert_eq!(r.guild_id, "42");
        assert_eq!(r.owner_id, "42");
        assert_eq!(ChannelRef::dm("42").to_string(), "dm:42");
    }
}
