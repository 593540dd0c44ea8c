use std::sync::{Mutex, MutexGuard, PoisonError};

use dashmap::{mapref::entry::Entry, DashMap};
use time::OffsetDateTime;
use tracing::{debug, error, trace, warn};

use crate::{
    config::Backoff,
    lookup::{LookupResult, UserLookup},
    util::unescape_spaces,
    CacheEntry, Clock, InvalidUserId, SystemClock, Tags, UserId,
};

/// Service accounts that show up in chat but are never real users
const RESERVED: [&str; 2] = ["jtv", "twitchnotify"];

struct BackoffState {
    timeout_expire: OffsetDateTime,
    last_fail_window: OffsetDateTime,
    fail_count: u32,
}

/// Maps lowercase login names to display names and ids.
///
/// Misses are filled in from message tags when possible, otherwise from the
/// [`UserLookup`]. After `threshold` consecutive transport failures the remote
/// lookups from [`resolve`](Self::resolve) and [`get_id`](Self::get_id) are
/// skipped for one `window`.
pub struct UsernameCache {
    entries: DashMap<String, CacheEntry>,
    state: Mutex<BackoffState>,
    backoff: Backoff,
    lookup: Box<dyn UserLookup>,
    clock: Box<dyn Clock>,
}

impl UsernameCache {
    pub fn new(lookup: impl UserLookup + 'static) -> Self {
        Self::with_backoff(lookup, Backoff::default())
    }

    pub fn with_backoff(lookup: impl UserLookup + 'static, backoff: Backoff) -> Self {
        Self::with_clock(lookup, backoff, SystemClock)
    }

    pub fn with_clock(
        lookup: impl UserLookup + 'static,
        backoff: Backoff,
        clock: impl Clock + 'static,
    ) -> Self {
        let now = clock.now();
        Self {
            entries: DashMap::new(),
            state: Mutex::new(BackoffState {
                timeout_expire: now,
                last_fail_window: now,
                fail_count: 0,
            }),
            backoff,
            lookup: Box::new(lookup),
            clock: Box::new(clock),
        }
    }

    pub async fn resolve(&self, login: &str) -> String {
        self.resolve_with(login, &Tags::default()).await
    }

    /// Best-effort display name for `login`, falling back to the login itself
    pub async fn resolve_with(&self, login: &str, hints: &Tags) -> String {
        let lower = login.to_lowercase();
        if let Some(name) = self.display_name(&lower) {
            return name;
        }

        if RESERVED.iter().any(|name| login.eq_ignore_ascii_case(name)) {
            return login.to_string();
        }

        if let Some(display) = hints
            .display_name()
            .filter(|name| name.to_lowercase() == lower)
        {
            match hints.get_parsed::<UserId>(Tags::USER_ID) {
                Some(Ok(id)) => {
                    trace!(login = %lower, %id, "caching user from tags");
                    self.entries.insert(lower, CacheEntry::new(display, id));
                }
                Some(Err(err)) => warn!(login = %lower, %err, "ignoring user-id tag"),
                None => {}
            }
            return display.to_string();
        }

        if self.in_cooldown() {
            return login.to_string();
        }

        self.lookup_user_data(&lower).await;
        self.display_name(&lower).unwrap_or(lower)
    }

    /// Whether `login` (exact case) is known, asking the remote api if it isn't.
    ///
    /// This does not respect the cool-down.
    pub async fn exists(&self, login: &str) -> bool {
        if self.entries.contains_key(login) {
            return true;
        }

        self.lookup_user_data(login).await;
        self.entries.contains_key(login)
    }

    pub fn add_user(&self, login: &str, display_name: &str, user_id: UserId) {
        if display_name.is_empty() {
            return;
        }

        if let Entry::Vacant(entry) = self.entries.entry(login.to_string()) {
            entry.insert(CacheEntry::new(unescape_spaces(display_name), user_id));
        }
    }

    /// Like [`add_user`](Self::add_user), but with the id as it appears on the wire.
    ///
    /// Empty values are ignored, a non-numeric id is an error.
    pub fn add_user_str(
        &self,
        login: &str,
        display_name: &str,
        user_id: &str,
    ) -> Result<(), InvalidUserId> {
        if self.has_user(login) || display_name.is_empty() || user_id.is_empty() {
            return Ok(());
        }

        let user_id = user_id.parse()?;
        self.add_user(login, display_name, user_id);
        Ok(())
    }

    pub fn has_user(&self, login: &str) -> bool {
        self.entries.contains_key(login)
    }

    pub fn get(&self, login: &str) -> String {
        self.display_name(login)
            .unwrap_or_else(|| login.to_string())
    }

    pub async fn get_id(&self, login: &str) -> String {
        self.get_id_forced(login, false).await
    }

    /// The id for `login` as a decimal string, or `"0"` if it couldn't be found.
    ///
    /// `force_if_missing` looks it up even during a cool-down.
    pub async fn get_id_forced(&self, login: &str, force_if_missing: bool) -> String {
        const UNKNOWN: &str = "0";

        let lower = login.to_lowercase();
        if let Some(id) = self.user_id(&lower) {
            return id.to_string();
        }

        if self.in_cooldown() && !force_if_missing {
            return UNKNOWN.to_string();
        }

        self.lookup_user_data(&lower).await;
        self.user_id(&lower)
            .map(|id| id.to_string())
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    pub fn remove_user(&self, login: &str) {
        self.entries.remove(&login.to_lowercase());
    }

    /// Reserved for richer user data, always an empty object for now
    pub fn get_user_data(&self, _login: &str) -> serde_json::Value {
        serde_json::Value::Object(serde_json::Map::new())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn in_cooldown(&self) -> bool {
        self.clock.now() < self.state().timeout_expire
    }

    async fn lookup_user_data(&self, login: &str) {
        let users = match self.lookup.lookup(login).await {
            LookupResult::Response { status: 200, users } => users,
            LookupResult::Response { status, .. } => {
                debug!(login, status, "failed to get user");
                return;
            }
            LookupResult::Failed(kind) if kind.is_transport() => {
                debug!(login, ?kind, "transport failure");
                self.record_failure();
                return;
            }
            LookupResult::Failed(kind) => {
                error!(login, ?kind, "cannot look up user");
                return;
            }
        };

        let Some(user) = users.into_iter().next() else {
            debug!(login, "no such user");
            return;
        };

        match user.id.parse::<UserId>() {
            Ok(id) => {
                let display_name = unescape_spaces(&user.display_name);
                trace!(login, %id, %display_name, "caching user");
                self.entries
                    .insert(login.to_string(), CacheEntry::new(display_name, id));
            }
            Err(err) => error!(login, %err, "malformed user record"),
        }
    }

    fn record_failure(&self) {
        let now = self.clock.now();
        let Backoff { window, threshold } = self.backoff;

        let mut state = self.state();
        if state.last_fail_window > now {
            state.fail_count += 1;
        } else {
            state.fail_count = 1;
        }

        state.last_fail_window = now + window;

        if state.fail_count >= threshold {
            state.timeout_expire = now + window;
            warn!(
                failures = state.fail_count,
                cooldown = ?window,
                "too many lookup failures, pausing lookups"
            );
        }
    }

    fn display_name(&self, login: &str) -> Option<String> {
        self.entries
            .get(login)
            .map(|entry| entry.display_name.clone())
    }

    fn user_id(&self, login: &str) -> Option<UserId> {
        self.entries.get(login).map(|entry| entry.user_id)
    }

    fn state(&self) -> MutexGuard<'_, BackoffState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };

    use time::{macros::datetime, Duration};

    use super::*;
    use crate::lookup::{FailureKind, LookupUser};

    #[derive(Default)]
    struct Script {
        calls: AtomicUsize,
        results: Mutex<VecDeque<LookupResult>>,
    }

    impl Script {
        fn push(&self, result: LookupResult) {
            self.results.lock().unwrap().push_back(result);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl UserLookup for Script {
        async fn lookup(&self, _login: &str) -> LookupResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(LookupResult::Response {
                    status: 200,
                    users: vec![],
                })
        }
    }

    #[derive(Clone)]
    struct ManualClock(Arc<Mutex<OffsetDateTime>>);

    impl ManualClock {
        fn advance(&self, d: Duration) {
            *self.0.lock().unwrap() += d;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> OffsetDateTime {
            *self.0.lock().unwrap()
        }
    }

    fn setup() -> (UsernameCache, Arc<Script>, ManualClock) {
        let script = Arc::new(Script::default());
        let clock = ManualClock(Arc::new(Mutex::new(datetime!(2022-11-20 12:00 UTC))));
        let cache = UsernameCache::with_clock(script.clone(), Backoff::default(), clock.clone());
        (cache, script, clock)
    }

    fn user(display_name: &str, id: &str) -> LookupResult {
        LookupResult::ok([LookupUser {
            display_name: display_name.to_string(),
            id: id.to_string(),
        }])
    }

    #[tokio::test]
    async fn lookup_populates_cache() {
        let (cache, script, _) = setup();
        script.push(user(r"Some\sBody", "42"));

        assert_eq!(cache.resolve("SomeBody").await, "Some Body");
        assert_eq!(script.calls(), 1);
        assert!(cache.has_user("somebody"));
        assert_eq!(cache.get_id("somebody").await, "42");
        assert_eq!(script.calls(), 1);
    }

    #[tokio::test]
    async fn non_200_leaves_cache_alone() {
        let (cache, script, _) = setup();
        script.push(LookupResult::Response {
            status: 500,
            users: vec![LookupUser {
                display_name: "Foo".into(),
                id: "1".into(),
            }],
        });

        assert_eq!(cache.resolve("Foo").await, "foo");
        assert!(cache.is_empty());
        assert!(!cache.in_cooldown());
    }

    #[tokio::test]
    async fn malformed_id_is_ignored() {
        let (cache, script, _) = setup();
        script.push(user("Foo", "not-a-number"));
        assert_eq!(cache.get_id("foo").await, "0");
        assert!(!cache.has_user("foo"));
    }

    #[tokio::test]
    async fn other_failures_do_not_count() {
        let (cache, script, _) = setup();
        for _ in 0..10 {
            script.push(LookupResult::Failed(FailureKind::Other("bad json".into())));
        }
        for _ in 0..10 {
            assert_eq!(cache.resolve("foo").await, "foo");
        }
        assert!(!cache.in_cooldown());
        assert_eq!(script.calls(), 10);
    }

    #[tokio::test]
    async fn failures_outside_the_window_reset_the_count() {
        let (cache, script, clock) = setup();
        for _ in 0..4 {
            script.push(LookupResult::Failed(FailureKind::Timeout));
            cache.resolve("foo").await;
            clock.advance(Duration::seconds(10));
        }
        assert!(!cache.in_cooldown());

        // the chain is broken
        clock.advance(Duration::minutes(2));
        script.push(LookupResult::Failed(FailureKind::Io));
        cache.resolve("foo").await;
        assert!(!cache.in_cooldown());
        assert_eq!(cache.state().fail_count, 1);
    }

    #[tokio::test]
    async fn cooldown_is_extended_by_further_failures() {
        let (cache, script, clock) = setup();
        for _ in 0..5 {
            script.push(LookupResult::Failed(FailureKind::Io));
            cache.get_id("foo").await;
        }
        assert!(cache.in_cooldown());

        // exists ignores the cool-down and keeps counting
        clock.advance(Duration::seconds(30));
        script.push(LookupResult::Failed(FailureKind::Io));
        assert!(!cache.exists("foo").await);
        assert_eq!(cache.state().fail_count, 6);

        clock.advance(Duration::seconds(45));
        assert!(cache.in_cooldown());
        clock.advance(Duration::seconds(15));
        assert!(!cache.in_cooldown());
    }

    #[tokio::test]
    async fn custom_threshold() {
        let script = Arc::new(Script::default());
        let backoff = Backoff {
            window: Duration::seconds(5),
            threshold: 2,
        };
        let cache = UsernameCache::with_backoff(script.clone(), backoff);
        script.push(LookupResult::Failed(FailureKind::Timeout));
        script.push(LookupResult::Failed(FailureKind::Timeout));
        cache.resolve("a").await;
        assert!(!cache.in_cooldown());
        cache.resolve("a").await;
        assert!(cache.in_cooldown());
    }

    #[test]
    fn user_data_is_empty() {
        let (cache, _, _) = setup();
        assert_eq!(cache.get_user_data(""), serde_json::json!({}));
        assert_eq!(cache.get_user_data("@@not a user@@"), serde_json::json!({}));
    }
}
