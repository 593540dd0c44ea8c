use std::{fmt, str::FromStr};

/// Numeric account id, as Twitch hands it out (a decimal string on the wire)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(u32);

impl UserId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for UserId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid user id: '{input}'")]
pub struct InvalidUserId {
    pub input: String,
}

impl FromStr for UserId {
    type Err = InvalidUserId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // u32::from_str accepts a leading '+'
        if s.is_empty() || !s.bytes().all(|c| c.is_ascii_digit()) {
            return Err(InvalidUserId {
                input: s.to_string(),
            });
        }

        s.parse().map(Self).map_err(|_| InvalidUserId {
            input: s.to_string(),
        })
    }
}

/// What the cache knows about a login: the display form and the id.
///
/// Entries are never patched in place, a newer lookup replaces the whole thing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry {
    pub display_name: String,
    pub user_id: UserId,
}

impl CacheEntry {
    pub fn new(display_name: impl Into<String>, user_id: UserId) -> Self {
        Self {
            display_name: display_name.into(),
            user_id,
        }
    }
}
