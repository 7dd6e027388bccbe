//! Postgres-backed [`StoryStore`]. Schema lives in `migrations/0001_init.sql`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{PopularityWeights, StoryFilter, StoryStore};
use crate::error::StoryError;
use crate::models::{ChoiceOption, MediaKind, Story, StoryNode, StoryStatus, UserProgress};

const STORY_COLUMNS: &str = r#"
    id, author_id, title, description, media_url, media_type, is_root, max_depth, tags,
    paths_count, views_count, likes_count, shares_count, comments_count,
    status, scheduled_publish_at, created_at, updated_at
"#;

const NODE_COLUMNS: &str = r#"
    id, story_id, parent_id, choice_label, content, media_url, depth,
    choice_a_label, choice_a_content, choice_b_label, choice_b_content, created_at
"#;

#[derive(Debug, sqlx::FromRow)]
struct StoryRow {
    id: Uuid,
    author_id: Uuid,
    title: String,
    description: Option<String>,
    media_url: Option<String>,
    media_type: Option<String>,
    is_root: bool,
    max_depth: i32,
    tags: Vec<String>,
    paths_count: i64,
    views_count: i64,
    likes_count: i64,
    shares_count: i64,
    comments_count: i64,
    status: String,
    scheduled_publish_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<StoryRow> for Story {
    fn from(row: StoryRow) -> Self {
        Story {
            id: row.id,
            author_id: row.author_id,
            title: row.title,
            description: row.description,
            media_url: row.media_url,
            media_type: row.media_type.as_deref().and_then(MediaKind::parse),
            is_root: row.is_root,
            max_depth: row.max_depth,
            tags: row.tags,
            paths_count: row.paths_count,
            views_count: row.views_count,
            likes_count: row.likes_count,
            shares_count: row.shares_count,
            comments_count: row.comments_count,
            status: StoryStatus::parse(&row.status),
            scheduled_publish_at: row.scheduled_publish_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct NodeRow {
    id: Uuid,
    story_id: Uuid,
    parent_id: Option<Uuid>,
    choice_label: Option<String>,
    content: Option<String>,
    media_url: Option<String>,
    depth: i32,
    choice_a_label: Option<String>,
    choice_a_content: Option<String>,
    choice_b_label: Option<String>,
    choice_b_content: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<NodeRow> for StoryNode {
    fn from(row: NodeRow) -> Self {
        StoryNode {
            id: row.id,
            story_id: row.story_id,
            parent_id: row.parent_id,
            choice_label: row.choice_label,
            content: row.content,
            media_url: row.media_url,
            depth: row.depth,
            choice_a: ChoiceOption {
                label: row.choice_a_label,
                content: row.choice_a_content,
            },
            choice_b: ChoiceOption {
                label: row.choice_b_label,
                content: row.choice_b_content,
            },
            created_at: row.created_at,
        }
    }
}

#[derive(Clone)]
pub struct PgStoryStore {
    pool: PgPool,
}

impl PgStoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl StoryStore for PgStoryStore {
    async fn health_check(&self) -> Result<String, StoryError> {
        Ok(crate::db::health_check(&self.pool).await?)
    }

    async fn get_story(&self, id: Uuid) -> Result<Option<Story>, StoryError> {
        let row = sqlx::query_as::<_, StoryRow>(&format!(
            "SELECT {STORY_COLUMNS} FROM stories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Story::from))
    }

    async fn get_node(
        &self,
        story_id: Uuid,
        parent_id: Option<Uuid>,
        choice_label: &str,
    ) -> Result<Option<StoryNode>, StoryError> {
        let row = sqlx::query_as::<_, NodeRow>(&format!(
            r#"
            SELECT {NODE_COLUMNS}
            FROM story_nodes
            WHERE story_id = $1
              AND parent_id IS NOT DISTINCT FROM $2
              AND choice_label = $3
            ORDER BY id
            LIMIT 1
            "#
        ))
        .bind(story_id)
        .bind(parent_id)
        .bind(choice_label)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(StoryNode::from))
    }

    async fn list_nodes_by_story(&self, story_id: Uuid) -> Result<Vec<StoryNode>, StoryError> {
        let rows = sqlx::query_as::<_, NodeRow>(&format!(
            "SELECT {NODE_COLUMNS} FROM story_nodes WHERE story_id = $1 ORDER BY depth, id"
        ))
        .bind(story_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(StoryNode::from).collect())
    }

    async fn get_progress(
        &self,
        user_id: Uuid,
        story_id: Uuid,
    ) -> Result<Option<UserProgress>, StoryError> {
        let row = sqlx::query_as::<_, UserProgress>(
            r#"
            SELECT user_id, story_id, path, current_depth, updated_at
            FROM user_progress
            WHERE user_id = $1 AND story_id = $2
            "#,
        )
        .bind(user_id)
        .bind(story_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn upsert_progress(
        &self,
        user_id: Uuid,
        story_id: Uuid,
        path: &[String],
    ) -> Result<UserProgress, StoryError> {
        let row = sqlx::query_as::<_, UserProgress>(
            r#"
            INSERT INTO user_progress (user_id, story_id, path, current_depth, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (user_id, story_id) DO UPDATE
            SET path = EXCLUDED.path,
                current_depth = EXCLUDED.current_depth,
                updated_at = NOW()
            RETURNING user_id, story_id, path, current_depth, updated_at
            "#,
        )
        .bind(user_id)
        .bind(story_id)
        .bind(path)
        .bind(path.len() as i32)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_published_stories(
        &self,
        filter: &StoryFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Story>, StoryError> {
        let rows = sqlx::query_as::<_, StoryRow>(&format!(
            r#"
            SELECT {STORY_COLUMNS}
            FROM stories
            WHERE status = 'published'
              AND ($1::timestamptz IS NULL OR created_at >= $1)
              AND NOT (id = ANY($2))
              AND ($3::uuid IS NULL OR author_id <> $3)
            ORDER BY created_at DESC, id
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(filter.created_after)
        .bind(&filter.exclude_ids)
        .bind(filter.exclude_author_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Story::from).collect())
    }

    async fn list_popular_stories(
        &self,
        filter: &StoryFilter,
        weights: &PopularityWeights,
        limit: i64,
    ) -> Result<Vec<Story>, StoryError> {
        let rows = sqlx::query_as::<_, StoryRow>(&format!(
            r#"
            SELECT {STORY_COLUMNS}
            FROM stories
            WHERE status = 'published'
              AND ($1::timestamptz IS NULL OR created_at >= $1)
              AND NOT (id = ANY($2))
              AND ($3::uuid IS NULL OR author_id <> $3)
            ORDER BY (
                $4::float8 * GREATEST(views_count, 0)
              + $5::float8 * GREATEST(likes_count, 0)
              + $6::float8 * GREATEST(comments_count, 0)
              + $7::float8 * GREATEST(shares_count, 0)
            ) DESC, created_at DESC, id
            LIMIT $8
            "#
        ))
        .bind(filter.created_after)
        .bind(&filter.exclude_ids)
        .bind(filter.exclude_author_id)
        .bind(weights.views)
        .bind(weights.likes)
        .bind(weights.comments)
        .bind(weights.shares)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Story::from).collect())
    }

    async fn list_stories_by_author(&self, author_id: Uuid) -> Result<Vec<Story>, StoryError> {
        let rows = sqlx::query_as::<_, StoryRow>(&format!(
            "SELECT {STORY_COLUMNS} FROM stories WHERE author_id = $1 ORDER BY created_at DESC, id"
        ))
        .bind(author_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Story::from).collect())
    }

    async fn list_followed_authors(&self, user_id: Uuid) -> Result<Vec<Uuid>, StoryError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT following_id FROM follows WHERE follower_id = $1 ORDER BY following_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn list_user_liked_story_tags(&self, user_id: Uuid) -> Result<Vec<String>, StoryError> {
        let tags = sqlx::query_scalar::<_, String>(
            r#"
            SELECT tag FROM (
                SELECT unnest(s.tags) AS tag
                FROM story_likes l
                JOIN stories s ON s.id = l.story_id
                WHERE l.user_id = $1
                UNION ALL
                SELECT unnest(s.tags) AS tag
                FROM user_progress p
                JOIN stories s ON s.id = p.story_id
                WHERE p.user_id = $1
            ) t
            ORDER BY tag
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tags)
    }

    async fn list_seen_story_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, StoryError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT story_id FROM user_progress WHERE user_id = $1
            UNION
            SELECT story_id FROM story_likes WHERE user_id = $1
            ORDER BY story_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}
