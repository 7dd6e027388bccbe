//! Progress tracker: a viewer's current path per story
//!
//! Authenticated viewers are persisted through the [`StoryStore`] (one row per
//! user+story, upsert, last write wins). Anonymous viewers, and any viewer while
//! the store is unreachable, fall back to a session-scoped [`LocalProgressStore`]
//! keyed by story id. The fallback never raises: failures are logged and
//! traversal continues within the session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use branchtale_core::config::SessionConfig;
use branchtale_core::path::{decode, encode, normalize};
use branchtale_core::{Choice, Progress, ProgressSource, Story, StoryError, StoryStore};
use uuid::Uuid;

/// Key/value storage local to one viewer session.
pub trait LocalProgressStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
}

/// In-process session storage.
#[derive(Debug, Default)]
pub struct SessionProgressStore {
    entries: Mutex<HashMap<String, String>>,
}

impl SessionProgressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalProgressStore for SessionProgressStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
    }
}

/// Session-key → local store. Requests without a session key get a throwaway store.
///
/// Bounded: sessions idle longer than the TTL are swept on each lookup, and when
/// the registry is full the least recently touched session is dropped.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SessionEntry>>,
    max_sessions: usize,
    idle_ttl: Duration,
}

#[derive(Debug)]
struct SessionEntry {
    store: Arc<SessionProgressStore>,
    last_touched: Instant,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::with_limits(config.max_sessions, Duration::from_secs(config.idle_ttl_secs))
    }

    pub fn with_limits(max_sessions: usize, idle_ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_sessions: max_sessions.max(1),
            idle_ttl,
        }
    }

    pub fn store_for(&self, session: Option<&str>) -> Arc<SessionProgressStore> {
        self.store_for_at(session, Instant::now())
    }

    fn store_for_at(&self, session: Option<&str>, now: Instant) -> Arc<SessionProgressStore> {
        let key = match session.map(str::trim).filter(|s| !s.is_empty()) {
            Some(key) => key,
            None => return Arc::new(SessionProgressStore::new()),
        };

        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);

        let before = sessions.len();
        sessions.retain(|_, entry| now.saturating_duration_since(entry.last_touched) < self.idle_ttl);
        let expired = before - sessions.len();
        if expired > 0 {
            tracing::debug!(expired, remaining = sessions.len(), "expired idle sessions");
        }

        if let Some(entry) = sessions.get_mut(key) {
            entry.last_touched = now;
            return entry.store.clone();
        }

        while sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by(|a, b| a.1.last_touched.cmp(&b.1.last_touched).then_with(|| a.0.cmp(b.0)))
                .map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    sessions.remove(&k);
                    tracing::debug!(max = self.max_sessions, "session registry full, evicted oldest session");
                }
                None => break,
            }
        }

        let store = Arc::new(SessionProgressStore::new());
        sessions.insert(
            key.to_string(),
            SessionEntry {
                store: store.clone(),
                last_touched: now,
            },
        );
        store
    }

    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Longest prefix of `path` made of valid choices, capped at the story's max depth.
/// Symbols come back canonical (`"A"`/`"B"`).
pub fn clamp_to_story<S: AsRef<str>>(path: &[S], story: &Story) -> Vec<String> {
    let cap = story.max_depth.max(0) as usize;
    normalize(path)
        .iter()
        .map_while(|symbol| Choice::parse(symbol))
        .take(cap)
        .map(|choice| choice.as_str().to_string())
        .collect()
}

fn local_key(story_id: Uuid) -> String {
    format!("story-progress:{}", story_id)
}

pub struct ProgressTracker<'a> {
    store: &'a dyn StoryStore,
    local: &'a dyn LocalProgressStore,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(store: &'a dyn StoryStore, local: &'a dyn LocalProgressStore) -> Self {
        Self { store, local }
    }

    /// Current progress, or `None` for a first-time viewer.
    pub async fn get_progress(&self, user_id: Option<Uuid>, story_id: Uuid) -> Option<Progress> {
        if let Some(user_id) = user_id {
            match self.store.get_progress(user_id, story_id).await {
                Ok(Some(row)) => return Some(Progress::from(row)),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(%story_id, error = %e, "progress read failed, using session store");
                }
            }
        }
        self.read_local(story_id)
    }

    /// Replace the stored path with `new_path`. Depth is always `new_path.len()`.
    pub async fn advance(
        &self,
        user_id: Option<Uuid>,
        story_id: Uuid,
        new_path: &[String],
    ) -> Progress {
        let path = normalize(new_path);
        self.local.set(&local_key(story_id), encode(&path));

        let user_id = match user_id {
            Some(id) => id,
            None => return Progress::new(path, ProgressSource::Local),
        };

        match self.store.upsert_progress(user_id, story_id, &path).await {
            Ok(row) => Progress::from(row),
            Err(e) => {
                tracing::warn!(%story_id, error = %e, "progress write failed, kept in session store");
                Progress::new(path, ProgressSource::Local)
            }
        }
    }

    /// Arrival through a shared link: the link's path wins over anything stored.
    /// The link is cut back to its longest valid prefix within `story.max_depth`.
    pub async fn set_from_external(
        &self,
        user_id: Option<Uuid>,
        story: &Story,
        path: &[String],
    ) -> Progress {
        let clamped = clamp_to_story(path, story);
        if clamped.len() != normalize(path).len() {
            tracing::info!(
                story_id = %story.id,
                requested = %encode(path),
                kept = %encode(&clamped),
                "shared link path truncated"
            );
        } else {
            tracing::debug!(story_id = %story.id, path = %encode(&clamped), "progress set from shared link");
        }
        self.advance(user_id, story.id, &clamped).await
    }

    /// Append one choice to the viewer's current path in `story`.
    pub async fn choose(
        &self,
        user_id: Option<Uuid>,
        story: &Story,
        choice: Choice,
    ) -> Result<Progress, StoryError> {
        let mut path = self
            .get_progress(user_id, story.id)
            .await
            .map(|p| p.path)
            .unwrap_or_default();

        if path.len() as i64 >= story.max_depth as i64 {
            return Err(StoryError::invalid(format!(
                "path already at max depth {} for story {}",
                story.max_depth, story.id
            )));
        }

        path.push(choice.as_str().to_string());
        Ok(self.advance(user_id, story.id, &path).await)
    }

    fn read_local(&self, story_id: Uuid) -> Option<Progress> {
        let raw = self.local.get(&local_key(story_id))?;
        Some(Progress::new(decode(Some(raw.as_str())), ProgressSource::Local))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::fixtures::path;
    use branchtale_core::MemoryStore;

    fn setup() -> (MemoryStore, SessionProgressStore) {
        (MemoryStore::new(), SessionProgressStore::new())
    }

    // ========================================================================
    // TEST 1: first-time viewer has no progress
    // ========================================================================
    #[tokio::test]
    async fn test_first_time_viewer_has_none() {
        let (store, local) = setup();
        let tracker = ProgressTracker::new(&store, &local);
        assert!(tracker.get_progress(Some(Uuid::new_v4()), Uuid::new_v4()).await.is_none());
        assert!(tracker.get_progress(None, Uuid::new_v4()).await.is_none());
    }

    // ========================================================================
    // TEST 2: second advance overwrites, depth derived from path
    // ========================================================================
    #[tokio::test]
    async fn test_advance_overwrites_not_appends() {
        let (store, local) = setup();
        let tracker = ProgressTracker::new(&store, &local);
        let user = Uuid::new_v4();
        let story = Uuid::new_v4();

        tracker.advance(Some(user), story, &path("A")).await;
        let progress = tracker.advance(Some(user), story, &path("A,B")).await;
        assert_eq!(progress.source, ProgressSource::Durable);

        let row = store.get_progress(user, story).await.unwrap().unwrap();
        assert_eq!(row.path, vec!["A", "B"]);
        assert_eq!(row.current_depth, 2);

        let read = tracker.get_progress(Some(user), story).await.unwrap();
        assert_eq!(read.path, vec!["A", "B"]);
        assert_eq!(read.current_depth, 2);
    }

    // ========================================================================
    // TEST 3: anonymous viewer uses the session store only
    // ========================================================================
    #[tokio::test]
    async fn test_anonymous_progress_is_local() {
        let (store, local) = setup();
        let tracker = ProgressTracker::new(&store, &local);
        let story = Uuid::new_v4();

        let progress = tracker.advance(None, story, &path("B")).await;
        assert_eq!(progress.source, ProgressSource::Local);
        assert_eq!(local.get(&local_key(story)).as_deref(), Some("B"));

        let read = tracker.get_progress(None, story).await.unwrap();
        assert_eq!(read.path, vec!["B"]);
        assert_eq!(read.current_depth, 1);
    }

    // ========================================================================
    // TEST 4: store outage degrades silently to the session store
    // ========================================================================
    #[tokio::test]
    async fn test_store_outage_falls_back_to_local() {
        let (store, local) = setup();
        let tracker = ProgressTracker::new(&store, &local);
        let user = Uuid::new_v4();
        let story = Uuid::new_v4();

        store.set_online(false);
        let progress = tracker.advance(Some(user), story, &path("A,A")).await;
        assert_eq!(progress.source, ProgressSource::Local);
        assert_eq!(progress.current_depth, 2);

        let read = tracker.get_progress(Some(user), story).await.unwrap();
        assert_eq!(read.path, vec!["A", "A"]);
        assert_eq!(read.source, ProgressSource::Local);
    }

    // ========================================================================
    // TEST 5: shared link overrides existing progress
    // ========================================================================
    #[tokio::test]
    async fn test_set_from_external_last_link_wins() {
        let (store, local) = setup();
        let tracker = ProgressTracker::new(&store, &local);
        let user = Uuid::new_v4();
        let story = Story::new(Uuid::new_v4(), "linked");

        tracker.advance(Some(user), story.id, &path("A,A,A")).await;
        let progress = tracker.set_from_external(Some(user), &story, &path("B")).await;
        assert_eq!(progress.path, vec!["B"]);
        assert_eq!(progress.current_depth, 1);
    }

    // ========================================================================
    // TEST 6: choose appends one symbol and stops at max depth
    // ========================================================================
    #[tokio::test]
    async fn test_choose_appends_until_max_depth() {
        let (store, local) = setup();
        let tracker = ProgressTracker::new(&store, &local);
        let user = Uuid::new_v4();
        let mut story = Story::new(Uuid::new_v4(), "short");
        story.max_depth = 2;

        let p1 = tracker.choose(Some(user), &story, Choice::A).await.unwrap();
        assert_eq!(p1.path, vec!["A"]);
        let p2 = tracker.choose(Some(user), &story, Choice::B).await.unwrap();
        assert_eq!(p2.path, vec!["A", "B"]);
        assert_eq!(p2.current_depth, 2);

        let err = tracker.choose(Some(user), &story, Choice::A).await.unwrap_err();
        assert_eq!(err.kind(), branchtale_core::ErrorKind::InvalidInput);
    }

    // ========================================================================
    // TEST 7: shared link is cut to its valid prefix within max depth
    // ========================================================================
    #[tokio::test]
    async fn test_set_from_external_truncates_bad_links() {
        let (store, local) = setup();
        let tracker = ProgressTracker::new(&store, &local);
        let mut story = Story::new(Uuid::new_v4(), "short");
        story.max_depth = 2;

        let garbage = tracker.set_from_external(None, &story, &path("X,Y,Z,A,B,A,B,A")).await;
        assert!(garbage.path.is_empty());
        assert_eq!(garbage.current_depth, 0);

        let too_deep = tracker.set_from_external(None, &story, &path("a,B,A,B")).await;
        assert_eq!(too_deep.path, vec!["A", "B"]);
        assert_eq!(too_deep.current_depth, 2);

        let mixed = tracker.set_from_external(None, &story, &path("B,Q,A")).await;
        assert_eq!(mixed.path, vec!["B"]);

        // Still advanceable after a truncated link.
        let next = tracker.choose(None, &story, Choice::A).await.unwrap();
        assert_eq!(next.path, vec!["B", "A"]);
    }

    #[test]
    fn test_clamp_to_story_zero_depth() {
        let mut story = Story::new(Uuid::new_v4(), "flat");
        story.max_depth = 0;
        assert!(clamp_to_story(&["A"], &story).is_empty());
        story.max_depth = -3;
        assert!(clamp_to_story(&["A", "B"], &story).is_empty());
    }

    #[test]
    fn test_registry_shares_store_per_session() {
        let registry = SessionRegistry::new();
        let a = registry.store_for(Some("abc"));
        a.set("k", "A".to_string());
        let b = registry.store_for(Some("abc"));
        assert_eq!(b.get("k").as_deref(), Some("A"));
        assert!(registry.store_for(None).get("k").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_evicts_least_recently_touched_at_capacity() {
        let registry = SessionRegistry::with_limits(3, Duration::from_secs(3600));
        let base = Instant::now();

        let first = registry.store_for_at(Some("s1"), base);
        first.set("k", "A".to_string());
        registry.store_for_at(Some("s2"), base + Duration::from_secs(1));
        registry.store_for_at(Some("s3"), base + Duration::from_secs(2));
        // Touching s1 makes s2 the oldest.
        registry.store_for_at(Some("s1"), base + Duration::from_secs(3));
        registry.store_for_at(Some("s4"), base + Duration::from_secs(4));

        assert_eq!(registry.len(), 3);
        let s1 = registry.store_for_at(Some("s1"), base + Duration::from_secs(5));
        assert_eq!(s1.get("k").as_deref(), Some("A"));
        let sessions = registry.sessions.lock().unwrap();
        assert!(!sessions.contains_key("s2"));
        assert!(sessions.contains_key("s4"));
    }

    #[test]
    fn test_registry_stays_bounded_under_many_keys() {
        let registry = SessionRegistry::with_limits(100, Duration::from_secs(3600));
        for i in 0..10_000 {
            registry.store_for(Some(&format!("session-{}", i)));
        }
        assert_eq!(registry.len(), 100);
    }

    #[test]
    fn test_registry_expires_idle_sessions() {
        let registry = SessionRegistry::with_limits(10, Duration::from_secs(60));
        let base = Instant::now();

        let stale = registry.store_for_at(Some("stale"), base);
        stale.set("k", "B".to_string());
        registry.store_for_at(Some("active"), base + Duration::from_secs(30));

        registry.store_for_at(Some("active"), base + Duration::from_secs(61));
        assert_eq!(registry.len(), 1);

        let fresh = registry.store_for_at(Some("stale"), base + Duration::from_secs(62));
        assert!(fresh.get("k").is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_registry_limits_come_from_config() {
        let registry = SessionRegistry::from_config(&SessionConfig { max_sessions: 2, idle_ttl_secs: 3600 });
        for key in ["a", "b", "c"] {
            registry.store_for(Some(key));
        }
        assert_eq!(registry.len(), 2);
    }
}
