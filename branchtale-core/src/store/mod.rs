//! Data-access boundary. Everything the story core reads or writes goes through
//! [`StoryStore`]; Postgres backs production, [`MemoryStore`] backs tests and demo mode.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::TrendingConfig;
use crate::error::StoryError;
use crate::models::{Story, StoryNode, UserProgress};

pub use memory::MemoryStore;
pub use postgres::PgStoryStore;

/// Filter for published-story listings.
#[derive(Debug, Clone, Default)]
pub struct StoryFilter {
    pub created_after: Option<DateTime<Utc>>,
    pub exclude_ids: Vec<Uuid>,
    /// Leave out everything written by this author.
    pub exclude_author_id: Option<Uuid>,
}

/// Per-signal weights for all-time popularity. Negative counters count as zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopularityWeights {
    pub views: f64,
    pub likes: f64,
    pub comments: f64,
    pub shares: f64,
}

impl PopularityWeights {
    pub fn score(&self, story: &Story) -> f64 {
        let s = story.engagement().clamped();
        let value = self.views * s.views as f64
            + self.likes * s.likes as f64
            + self.comments * s.comments as f64
            + self.shares * s.shares as f64;
        if value.is_finite() {
            value.max(0.0)
        } else {
            0.0
        }
    }
}

impl From<&TrendingConfig> for PopularityWeights {
    fn from(config: &TrendingConfig) -> Self {
        Self {
            views: config.weight_views,
            likes: config.weight_likes,
            comments: config.weight_comments,
            shares: config.weight_shares,
        }
    }
}

#[async_trait]
pub trait StoryStore: Send + Sync {
    /// Backend description, for health endpoints.
    async fn health_check(&self) -> Result<String, StoryError>;

    async fn get_story(&self, id: Uuid) -> Result<Option<Story>, StoryError>;

    /// The node reached from `parent_id` (or the root when `None`) by `choice_label`.
    /// If several rows match, the one with the lowest id wins.
    async fn get_node(
        &self,
        story_id: Uuid,
        parent_id: Option<Uuid>,
        choice_label: &str,
    ) -> Result<Option<StoryNode>, StoryError>;

    async fn list_nodes_by_story(&self, story_id: Uuid) -> Result<Vec<StoryNode>, StoryError>;

    async fn get_progress(
        &self,
        user_id: Uuid,
        story_id: Uuid,
    ) -> Result<Option<UserProgress>, StoryError>;

    /// Insert or overwrite the single progress row for (user, story).
    async fn upsert_progress(
        &self,
        user_id: Uuid,
        story_id: Uuid,
        path: &[String],
    ) -> Result<UserProgress, StoryError>;

    /// Newest first, then id.
    async fn list_published_stories(
        &self,
        filter: &StoryFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Story>, StoryError>;

    /// Whole published corpus ranked by weighted engagement, highest first,
    /// then newest, then id. No time decay and no recency window.
    async fn list_popular_stories(
        &self,
        filter: &StoryFilter,
        weights: &PopularityWeights,
        limit: i64,
    ) -> Result<Vec<Story>, StoryError>;

    /// All stories by an author regardless of status.
    async fn list_stories_by_author(&self, author_id: Uuid) -> Result<Vec<Story>, StoryError>;

    async fn list_followed_authors(&self, user_id: Uuid) -> Result<Vec<Uuid>, StoryError>;

    /// Tags of stories the user liked or has progress on, one entry per occurrence.
    async fn list_user_liked_story_tags(&self, user_id: Uuid) -> Result<Vec<String>, StoryError>;

    /// Stories the user has already started or liked.
    async fn list_seen_story_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, StoryError>;
}
