use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_MAX_DEPTH: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoryStatus {
    #[default]
    Draft,
    Published,
}

impl StoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoryStatus::Draft => "draft",
            StoryStatus::Published => "published",
        }
    }

    /// Unknown values read back as draft so they never leak into public feeds.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "published" => StoryStatus::Published,
            _ => StoryStatus::Draft,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "image" => Some(MediaKind::Image),
            "video" => Some(MediaKind::Video),
            _ => None,
        }
    }
}

/// Root content unit. The story itself is the depth-0 root of its decision tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub media_url: Option<String>,
    pub media_type: Option<MediaKind>,
    pub is_root: bool,
    pub max_depth: i32,
    pub tags: Vec<String>,
    pub paths_count: i64,
    pub views_count: i64,
    pub likes_count: i64,
    pub shares_count: i64,
    pub comments_count: i64,
    pub status: StoryStatus,
    pub scheduled_publish_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Story {
    /// A published story with zeroed counters, authored now.
    pub fn new(author_id: Uuid, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            author_id,
            title: title.into(),
            description: None,
            media_url: None,
            media_type: None,
            is_root: true,
            max_depth: DEFAULT_MAX_DEPTH,
            tags: Vec::new(),
            paths_count: 0,
            views_count: 0,
            likes_count: 0,
            shares_count: 0,
            comments_count: 0,
            status: StoryStatus::Published,
            scheduled_publish_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn engagement(&self) -> EngagementSnapshot {
        EngagementSnapshot {
            views: self.views_count,
            likes: self.likes_count,
            shares: self.shares_count,
            comments: self.comments_count,
        }
    }

    pub fn is_published(&self) -> bool {
        self.status == StoryStatus::Published
    }
}

/// Counters read at scoring time. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EngagementSnapshot {
    pub views: i64,
    pub likes: i64,
    pub shares: i64,
    pub comments: i64,
}

impl EngagementSnapshot {
    /// Negative counters (corrective deletes gone wrong) count as zero.
    pub fn clamped(self) -> Self {
        Self {
            views: self.views.max(0),
            likes: self.likes.max(0),
            shares: self.shares.max(0),
            comments: self.comments.max(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_unknown_is_draft() {
        assert_eq!(StoryStatus::parse("published"), StoryStatus::Published);
        assert_eq!(StoryStatus::parse("archived"), StoryStatus::Draft);
    }

    #[test]
    fn test_engagement_clamps_negatives() {
        let snap = EngagementSnapshot { views: -3, likes: 2, shares: -1, comments: 0 }.clamped();
        assert_eq!(snap, EngagementSnapshot { views: 0, likes: 2, shares: 0, comments: 0 });
    }
}
