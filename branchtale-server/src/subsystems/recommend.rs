//! Recommendation engine
//!
//! Anonymous viewers get globally popular published stories. Known viewers get
//! a personalized blend first:
//!
//!   blend = social_weight × social + content_weight × content
//!
//! Where:
//!   social  = 1.0 if the viewer follows the story's author, else 0.0
//!   content = share of the viewer's liked/viewed tag mass carried by the story's tags
//!
//! Personalized picks are scored over the newest `candidate_window` stories.
//! They are backfilled from the all-time popular listing, which ranks the whole
//! published corpus regardless of age, until `limit` is reached or stories run out. The viewer's own stories, stories they already
//! started, and `exclude_story_id` are never returned. No randomness: identical
//! inputs over the same data give identical output.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use branchtale_core::config::{RecommendationConfig, TrendingConfig};
use branchtale_core::{PopularityWeights, Story, StoryError, StoryFilter, StoryStore};
use serde::Serialize;
use uuid::Uuid;

use super::trending::{clamp_limit, weighted_engagement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationReason {
    FollowedCreator,
    SimilarTags,
    FollowedCreatorAndTags,
    Popular,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub story: Story,
    pub reason: RecommendationReason,
    pub score: f64,
}

/// What we know about a viewer.
#[derive(Debug, Clone, Default)]
pub struct UserSignals {
    pub user_id: Uuid,
    pub followed_authors: HashSet<Uuid>,
    /// Tag → number of liked/viewed stories carrying it.
    pub tag_weights: HashMap<String, f64>,
    pub seen: HashSet<Uuid>,
}

impl UserSignals {
    pub fn new(user_id: Uuid, followed: Vec<Uuid>, tags: Vec<String>, seen: Vec<Uuid>) -> Self {
        let mut tag_weights: HashMap<String, f64> = HashMap::new();
        for tag in tags {
            let tag = tag.trim().to_lowercase();
            if !tag.is_empty() {
                *tag_weights.entry(tag).or_insert(0.0) += 1.0;
            }
        }
        Self {
            user_id,
            followed_authors: followed.into_iter().collect(),
            tag_weights,
            seen: seen.into_iter().collect(),
        }
    }

    /// Fraction of this viewer's tag mass matched by `story`'s tags, in [0, 1].
    pub fn content_affinity(&self, story: &Story) -> f64 {
        let total: f64 = self.tag_weights.values().sum();
        if total <= 0.0 {
            return 0.0;
        }
        let tags: HashSet<String> = story.tags.iter().map(|t| t.trim().to_lowercase()).collect();
        let matched: f64 = tags.iter().filter_map(|t| self.tag_weights.get(t)).sum();
        (matched / total).clamp(0.0, 1.0)
    }
}

/// Popularity: weighted engagement with no time decay.
pub fn popularity(story: &Story, config: &TrendingConfig) -> f64 {
    weighted_engagement(story.engagement(), config)
}

fn compare_popular(a: &Story, b: &Story, config: &TrendingConfig) -> Ordering {
    popularity(b, config)
        .total_cmp(&popularity(a, config))
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Most popular first.
pub fn rank_popular(mut stories: Vec<Story>, config: &TrendingConfig) -> Vec<Story> {
    stories.sort_by(|a, b| compare_popular(a, b, config));
    stories
}

/// Score candidates against the viewer's signals. Only stories with some signal
/// are returned, best first.
pub fn personalize(
    candidates: &[Story],
    signals: &UserSignals,
    config: &RecommendationConfig,
    trending: &TrendingConfig,
) -> Vec<Recommendation> {
    let mut picks: Vec<Recommendation> = candidates
        .iter()
        .filter(|s| s.author_id != signals.user_id && !signals.seen.contains(&s.id))
        .filter_map(|story| {
            let social = if signals.followed_authors.contains(&story.author_id) { 1.0 } else { 0.0 };
            let content = signals.content_affinity(story);
            let score = config.social_weight * social + config.content_weight * content;
            if !score.is_finite() || score <= 0.0 {
                return None;
            }
            let reason = match (social > 0.0, content > 0.0) {
                (true, true) => RecommendationReason::FollowedCreatorAndTags,
                (true, false) => RecommendationReason::FollowedCreator,
                _ => RecommendationReason::SimilarTags,
            };
            Some(Recommendation { story: story.clone(), reason, score })
        })
        .collect();

    picks.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| compare_popular(&a.story, &b.story, trending))
    });
    picks
}

/// Append popular stories not yet picked until `limit` is reached.
pub fn backfill(
    mut picks: Vec<Recommendation>,
    popular: Vec<Story>,
    limit: usize,
    trending: &TrendingConfig,
) -> Vec<Recommendation> {
    picks.truncate(limit);
    let mut taken: HashSet<Uuid> = picks.iter().map(|r| r.story.id).collect();
    for story in popular {
        if picks.len() >= limit {
            break;
        }
        if taken.insert(story.id) {
            let score = popularity(&story, trending);
            picks.push(Recommendation {
                story,
                reason: RecommendationReason::Popular,
                score,
            });
        }
    }
    picks
}

pub async fn load_signals(store: &dyn StoryStore, user_id: Uuid) -> Result<UserSignals, StoryError> {
    let followed = store.list_followed_authors(user_id).await?;
    let tags = store.list_user_liked_story_tags(user_id).await?;
    let seen = store.list_seen_story_ids(user_id).await?;
    Ok(UserSignals::new(user_id, followed, tags, seen))
}

/// Recommendations for `user_id` (or an anonymous viewer), at most `limit` long.
pub async fn get_recommendations(
    store: &dyn StoryStore,
    user_id: Option<Uuid>,
    limit: Option<u32>,
    exclude_story_id: Option<Uuid>,
    config: &RecommendationConfig,
    trending: &TrendingConfig,
) -> Result<Vec<Recommendation>, StoryError> {
    let limit = clamp_limit(limit, config.default_limit, config.max_limit) as usize;

    let signals = match user_id {
        Some(id) => Some(load_signals(store, id).await.map_err(|e| {
            tracing::error!(user_id = %id, error = %e, "recommendations: failed to load signals");
            e
        })?),
        None => None,
    };

    let mut exclude_ids: Vec<Uuid> = exclude_story_id.into_iter().collect();
    if let Some(s) = &signals {
        exclude_ids.extend(s.seen.iter().copied());
    }
    exclude_ids.sort();
    exclude_ids.dedup();

    let filter = StoryFilter {
        created_after: None,
        exclude_ids,
        exclude_author_id: user_id,
    };
    let eligible = |s: &Story| {
        Some(s.id) != exclude_story_id
            && signals.as_ref().map_or(true, |sig| s.author_id != sig.user_id && !sig.seen.contains(&s.id))
    };

    let picks = match &signals {
        Some(sig) => {
            let candidates: Vec<Story> = store
                .list_published_stories(&filter, config.candidate_window as i64, 0)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "recommendations: failed to load candidates");
                    e
                })?
                .into_iter()
                .filter(|s| eligible(s))
                .collect();
            personalize(&candidates, sig, config, trending)
        }
        None => Vec::new(),
    };
    let personalized = picks.len().min(limit);

    // Every pick may also appear in the popular listing; over-fetch by that much.
    let pool_size = limit + personalized;
    let popular: Vec<Story> = store
        .list_popular_stories(&filter, &PopularityWeights::from(trending), pool_size as i64)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "recommendations: failed to load popular stories");
            e
        })?
        .into_iter()
        .filter(|s| eligible(s))
        .collect();

    let result = backfill(picks, rank_popular(popular, trending), limit, trending);

    tracing::debug!(
        user = ?user_id,
        personalized,
        returned = result.len(),
        "Recommendations computed"
    );

    Ok(result)
}
