//! Trending ranker: time-decayed "hotness"
//!
//! score = E / (age_hours + age_offset_hours)^gravity
//!
//! Where:
//!   E       = w_v×views + w_l×likes + w_c×comments + w_s×shares
//!   age     = hours since the story was created (future timestamps count as 0)
//!
//! Equal engagement ranks newer stories higher; old stories need
//! disproportionately more engagement to stay near the top. Ties on score fall
//! back to `created_at` descending, then id, so ordering is deterministic.
//!
//! Scores are computed over a bounded window of the newest published stories,
//! not the whole corpus. Trending is best-effort over recent-enough content.

use std::cmp::Ordering;
use std::time::Instant;

use branchtale_core::config::TrendingConfig;
use branchtale_core::{EngagementSnapshot, Story, StoryError, StoryFilter, StoryStore};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TimeRange {
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[default]
    #[serde(rename = "all")]
    All,
}

impl TimeRange {
    /// `None` or blank means `all`; anything unrecognised is rejected.
    pub fn parse(raw: Option<&str>) -> Result<Self, StoryError> {
        match raw.map(str::trim) {
            None | Some("") | Some("all") => Ok(TimeRange::All),
            Some("24h") => Ok(TimeRange::Day),
            Some("7d") => Ok(TimeRange::Week),
            Some("30d") => Ok(TimeRange::Month),
            Some(other) => Err(StoryError::invalid(format!(
                "unknown time_range '{}' (expected 24h, 7d, 30d or all)",
                other
            ))),
        }
    }

    pub fn window(&self) -> Option<Duration> {
        match self {
            TimeRange::Day => Some(Duration::hours(24)),
            TimeRange::Week => Some(Duration::days(7)),
            TimeRange::Month => Some(Duration::days(30)),
            TimeRange::All => None,
        }
    }
}

/// Per-request score breakdown. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct TrendingScore {
    pub story_id: Uuid,
    pub engagement: EngagementSnapshot,
    pub weighted_engagement: f64,
    pub age_hours: f64,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedStory {
    pub story: Story,
    pub trending: TrendingScore,
}

#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
    pub count: usize,
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendingPage {
    pub stories: Vec<RankedStory>,
    pub pagination: Pagination,
    pub time_range: TimeRange,
    pub candidates_scored: usize,
}

pub fn weighted_engagement(snapshot: EngagementSnapshot, config: &TrendingConfig) -> f64 {
    let s = snapshot.clamped();
    let value = config.weight_views * s.views as f64
        + config.weight_likes * s.likes as f64
        + config.weight_comments * s.comments as f64
        + config.weight_shares * s.shares as f64;
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

pub fn age_hours(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    ((now - created_at).num_seconds() as f64 / 3600.0).max(0.0)
}

/// Hotness of `weighted` engagement at `age` hours.
pub fn hotness(weighted: f64, age: f64, config: &TrendingConfig) -> f64 {
    let decay = (age + config.age_offset_hours).powf(config.gravity);
    if !decay.is_finite() || decay <= 0.0 {
        return 0.0;
    }
    let score = weighted / decay;
    if score.is_finite() {
        score
    } else {
        0.0
    }
}

pub fn score_story(story: &Story, now: DateTime<Utc>, config: &TrendingConfig) -> TrendingScore {
    let engagement = story.engagement().clamped();
    let weighted = weighted_engagement(engagement, config);
    let age = age_hours(story.created_at, now);
    TrendingScore {
        story_id: story.id,
        engagement,
        weighted_engagement: weighted,
        age_hours: age,
        score: hotness(weighted, age, config),
    }
}

/// Score descending, then newest first, then id.
fn compare_ranked(a: &RankedStory, b: &RankedStory) -> Ordering {
    b.trending
        .score
        .total_cmp(&a.trending.score)
        .then_with(|| b.story.created_at.cmp(&a.story.created_at))
        .then_with(|| a.story.id.cmp(&b.story.id))
}

/// Score and sort. Does not touch the stories' counters.
pub fn rank_stories(stories: Vec<Story>, now: DateTime<Utc>, config: &TrendingConfig) -> Vec<RankedStory> {
    let mut ranked: Vec<RankedStory> = stories
        .into_iter()
        .map(|story| {
            let trending = score_story(&story, now, config);
            RankedStory { story, trending }
        })
        .collect();
    ranked.sort_by(compare_ranked);
    ranked
}

/// Clamp a requested page size into `[1, max]`.
pub fn clamp_limit(limit: Option<u32>, default: u32, max: u32) -> u32 {
    let max = max.max(1);
    limit.unwrap_or(default).clamp(1, max)
}

/// Ranked, paginated trending stories.
pub async fn get_trending(
    store: &dyn StoryStore,
    limit: Option<u32>,
    offset: Option<u32>,
    time_range: TimeRange,
    config: &TrendingConfig,
    now: DateTime<Utc>,
) -> Result<TrendingPage, StoryError> {
    let start = Instant::now();
    let limit = clamp_limit(limit, config.default_limit, config.max_limit);
    let offset = offset.unwrap_or(0);

    let filter = StoryFilter {
        created_after: time_range.window().map(|w| now - w),
        ..StoryFilter::default()
    };

    let candidates = store
        .list_published_stories(&filter, config.candidate_window as i64, 0)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "trending: failed to load candidates");
            e
        })?;

    let candidates_scored = candidates.len();
    let ranked = rank_stories(candidates, now, config);
    let has_more = ranked.len() > offset as usize + limit as usize;

    let stories: Vec<RankedStory> = ranked
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect();

    tracing::debug!(
        "Trending computed: {} candidates, {} returned in {}ms",
        candidates_scored,
        stories.len(),
        start.elapsed().as_millis()
    );

    Ok(TrendingPage {
        pagination: Pagination {
            limit,
            offset,
            count: stories.len(),
            has_more,
        },
        stories,
        time_range,
        candidates_scored,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::fixtures::{hours_ago, story_with};
    use branchtale_core::{MemoryStore, StoryStatus};

    // ========================================================================
    // TEST 1: equal engagement, newer scores strictly higher
    // ========================================================================
    #[test]
    fn test_newer_story_scores_higher() {
        let config = TrendingConfig::default();
        let now = Utc::now();
        let author = Uuid::new_v4();

        let fresh = story_with(author, hours_ago(now, 1), 100, 10, 5, 2);
        let stale = story_with(author, hours_ago(now, 100), 100, 10, 5, 2);

        let fresh_score = score_story(&fresh, now, &config).score;
        let stale_score = score_story(&stale, now, &config).score;
        assert!(
            fresh_score > stale_score,
            "1h-old story should outrank 100h-old: {} > {}",
            fresh_score,
            stale_score
        );
    }

    // ========================================================================
    // TEST 2: equal age, more weighted engagement scores strictly higher
    // ========================================================================
    #[test]
    fn test_more_engagement_scores_higher() {
        let config = TrendingConfig::default();
        let now = Utc::now();
        let created = hours_ago(now, 5);
        let author = Uuid::new_v4();

        let quiet = story_with(author, created, 100, 1, 0, 0);
        let busy = story_with(author, created, 100, 1, 1, 0);

        assert!(score_story(&busy, now, &config).score > score_story(&quiet, now, &config).score);
    }

    // ========================================================================
    // TEST 3: a share outweighs a view
    // ========================================================================
    #[test]
    fn test_share_outweighs_view() {
        let config = TrendingConfig::default();
        let with_share = EngagementSnapshot { views: 0, likes: 0, shares: 1, comments: 0 };
        let with_view = EngagementSnapshot { views: 1, likes: 0, shares: 0, comments: 0 };
        assert!(weighted_engagement(with_share, &config) > weighted_engagement(with_view, &config));
    }

    // ========================================================================
    // TEST 4: ties break by created_at desc, deterministically
    // ========================================================================
    #[test]
    fn test_ties_break_by_created_at_desc() {
        let config = TrendingConfig::default();
        let now = Utc::now();
        let author = Uuid::new_v4();

        // zero engagement → every score is 0.0
        let older = story_with(author, hours_ago(now, 10), 0, 0, 0, 0);
        let newer = story_with(author, hours_ago(now, 3), 0, 0, 0, 0);
        let newest = story_with(author, hours_ago(now, 1), 0, 0, 0, 0);
        let expected = vec![newest.id, newer.id, older.id];

        for _ in 0..5 {
            let ranked = rank_stories(vec![older.clone(), newest.clone(), newer.clone()], now, &config);
            let ids: Vec<Uuid> = ranked.iter().map(|r| r.story.id).collect();
            assert_eq!(ids, expected);
        }
    }

    // ========================================================================
    // TEST 5: negative counters and future timestamps stay finite
    // ========================================================================
    #[test]
    fn test_degenerate_inputs_stay_finite() {
        let config = TrendingConfig::default();
        let now = Utc::now();
        let future = now + Duration::hours(3);
        let story = story_with(Uuid::new_v4(), future, -50, -1, 0, 0);
        let score = score_story(&story, now, &config);
        assert_eq!(score.age_hours, 0.0);
        assert_eq!(score.score, 0.0);
        assert!(score.score.is_finite());
    }

    #[test]
    fn test_time_range_parse() {
        assert_eq!(TimeRange::parse(None).unwrap(), TimeRange::All);
        assert_eq!(TimeRange::parse(Some("24h")).unwrap(), TimeRange::Day);
        assert_eq!(TimeRange::parse(Some("7d")).unwrap(), TimeRange::Week);
        assert_eq!(TimeRange::parse(Some("30d")).unwrap(), TimeRange::Month);
        assert!(TimeRange::parse(Some("1y")).is_err());
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None, 20, 100), 20);
        assert_eq!(clamp_limit(Some(0), 20, 100), 1);
        assert_eq!(clamp_limit(Some(500), 20, 100), 100);
    }

    // ========================================================================
    // TEST 6: window filter, published only, pagination
    // ========================================================================
    #[tokio::test]
    async fn test_get_trending_filters_and_paginates() {
        let store = MemoryStore::new();
        let config = TrendingConfig::default();
        let now = Utc::now();
        let author = Uuid::new_v4();

        let hot = story_with(author, hours_ago(now, 2), 500, 50, 20, 10);
        let warm = story_with(author, hours_ago(now, 6), 100, 10, 2, 1);
        let old = story_with(author, hours_ago(now, 24 * 10), 10_000, 900, 300, 100);
        let mut draft = story_with(author, hours_ago(now, 1), 99_999, 0, 0, 0);
        draft.status = StoryStatus::Draft;

        for s in [hot.clone(), warm.clone(), old.clone(), draft.clone()] {
            store.insert_story(s).await;
        }

        let day = get_trending(&store, Some(10), None, TimeRange::Day, &config, now)
            .await
            .unwrap();
        let ids: Vec<Uuid> = day.stories.iter().map(|r| r.story.id).collect();
        assert_eq!(ids, vec![hot.id, warm.id]);
        assert!(!day.pagination.has_more);

        let all = get_trending(&store, Some(1), Some(1), TimeRange::All, &config, now)
            .await
            .unwrap();
        assert_eq!(all.candidates_scored, 3);
        assert_eq!(all.pagination.count, 1);
        assert!(all.pagination.has_more);
        assert!(all.stories.iter().all(|r| r.story.id != draft.id));
    }

    // ========================================================================
    // TEST 7: outage surfaces as error, never an empty page
    // ========================================================================
    #[tokio::test]
    async fn test_get_trending_surfaces_outage() {
        let store = MemoryStore::new();
        store.set_online(false);
        let result = get_trending(&store, None, None, TimeRange::All, &TrendingConfig::default(), Utc::now()).await;
        assert!(result.is_err());
    }
}
