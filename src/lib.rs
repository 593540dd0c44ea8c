//! A cache from Twitch login names to display names and user ids.
//!
//! Lookups go through a [`UserLookup`] (normally the [`helix::Client`]) and
//! are suppressed for a while after repeated transport failures.

mod cache;
pub use cache::UsernameCache;

mod clock;
pub use clock::{Clock, SystemClock};

pub mod config;
pub mod helix;

pub mod lookup;
pub use lookup::{FailureKind, LookupResult, LookupUser, UserLookup};

mod tags;
pub use tags::Tags;

mod user;
pub use user::{CacheEntry, InvalidUserId, UserId};

mod util;
