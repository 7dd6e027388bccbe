//! In-process [`StoryStore`] for tests and `--in-memory` demo mode.
//!
//! Mirrors the Postgres ordering rules (newest first, lowest id on duplicate
//! nodes) and can be switched offline to simulate an unreachable database.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{PopularityWeights, StoryFilter, StoryStore};
use crate::error::StoryError;
use crate::models::{Story, StoryNode, UserProgress};

#[derive(Default)]
struct Tables {
    stories: HashMap<Uuid, Story>,
    nodes: Vec<StoryNode>,
    progress: HashMap<(Uuid, Uuid), UserProgress>,
    likes: HashSet<(Uuid, Uuid)>,
    follows: HashSet<(Uuid, Uuid)>,
}

pub struct MemoryStore {
    tables: RwLock<Tables>,
    online: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            online: AtomicBool::new(true),
        }
    }

    /// Toggle simulated reachability. Offline, every call fails as upstream-unavailable.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub async fn insert_story(&self, story: Story) {
        self.tables.write().await.stories.insert(story.id, story);
    }

    pub async fn insert_node(&self, node: StoryNode) {
        self.tables.write().await.nodes.push(node);
    }

    /// `user_id` likes `story_id`.
    pub async fn add_like(&self, user_id: Uuid, story_id: Uuid) {
        self.tables.write().await.likes.insert((user_id, story_id));
    }

    /// `follower_id` follows `author_id`.
    pub async fn add_follow(&self, follower_id: Uuid, author_id: Uuid) {
        self.tables.write().await.follows.insert((follower_id, author_id));
    }

    fn ensure_online(&self) -> Result<(), StoryError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoryError::UpstreamUnavailable(
                "in-memory store is offline".to_string(),
            ))
        }
    }
}

fn matches(story: &Story, filter: &StoryFilter) -> bool {
    story.is_published()
        && filter.created_after.map_or(true, |t| story.created_at >= t)
        && !filter.exclude_ids.contains(&story.id)
        && filter.exclude_author_id != Some(story.author_id)
}

fn newest_first(stories: &mut [Story]) {
    stories.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
}

#[async_trait]
impl StoryStore for MemoryStore {
    async fn health_check(&self) -> Result<String, StoryError> {
        self.ensure_online()?;
        Ok("in-memory".to_string())
    }

    async fn get_story(&self, id: Uuid) -> Result<Option<Story>, StoryError> {
        self.ensure_online()?;
        Ok(self.tables.read().await.stories.get(&id).cloned())
    }

    async fn get_node(
        &self,
        story_id: Uuid,
        parent_id: Option<Uuid>,
        choice_label: &str,
    ) -> Result<Option<StoryNode>, StoryError> {
        self.ensure_online()?;
        let tables = self.tables.read().await;
        Ok(tables
            .nodes
            .iter()
            .filter(|n| {
                n.story_id == story_id
                    && n.parent_id == parent_id
                    && n.choice_label.as_deref() == Some(choice_label)
            })
            .min_by_key(|n| n.id)
            .cloned())
    }

    async fn list_nodes_by_story(&self, story_id: Uuid) -> Result<Vec<StoryNode>, StoryError> {
        self.ensure_online()?;
        let tables = self.tables.read().await;
        let mut nodes: Vec<StoryNode> = tables
            .nodes
            .iter()
            .filter(|n| n.story_id == story_id)
            .cloned()
            .collect();
        nodes.sort_by(|a, b| a.depth.cmp(&b.depth).then(a.id.cmp(&b.id)));
        Ok(nodes)
    }

    async fn get_progress(
        &self,
        user_id: Uuid,
        story_id: Uuid,
    ) -> Result<Option<UserProgress>, StoryError> {
        self.ensure_online()?;
        Ok(self
            .tables
            .read()
            .await
            .progress
            .get(&(user_id, story_id))
            .cloned())
    }

    async fn upsert_progress(
        &self,
        user_id: Uuid,
        story_id: Uuid,
        path: &[String],
    ) -> Result<UserProgress, StoryError> {
        self.ensure_online()?;
        let row = UserProgress {
            user_id,
            story_id,
            path: path.to_vec(),
            current_depth: path.len() as i32,
            updated_at: Utc::now(),
        };
        self.tables
            .write()
            .await
            .progress
            .insert((user_id, story_id), row.clone());
        Ok(row)
    }

    async fn list_published_stories(
        &self,
        filter: &StoryFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Story>, StoryError> {
        self.ensure_online()?;
        let tables = self.tables.read().await;
        let mut stories: Vec<Story> = tables
            .stories
            .values()
            .filter(|s| matches(s, filter))
            .cloned()
            .collect();
        newest_first(&mut stories);
        Ok(stories
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn list_popular_stories(
        &self,
        filter: &StoryFilter,
        weights: &PopularityWeights,
        limit: i64,
    ) -> Result<Vec<Story>, StoryError> {
        self.ensure_online()?;
        let tables = self.tables.read().await;
        let mut stories: Vec<Story> = tables
            .stories
            .values()
            .filter(|s| matches(s, filter))
            .cloned()
            .collect();
        stories.sort_by(|a, b| {
            weights
                .score(b)
                .total_cmp(&weights.score(a))
                .then(b.created_at.cmp(&a.created_at))
                .then(a.id.cmp(&b.id))
        });
        stories.truncate(limit.max(0) as usize);
        Ok(stories)
    }

    async fn list_stories_by_author(&self, author_id: Uuid) -> Result<Vec<Story>, StoryError> {
        self.ensure_online()?;
        let tables = self.tables.read().await;
        let mut stories: Vec<Story> = tables
            .stories
            .values()
            .filter(|s| s.author_id == author_id)
            .cloned()
            .collect();
        newest_first(&mut stories);
        Ok(stories)
    }

    async fn list_followed_authors(&self, user_id: Uuid) -> Result<Vec<Uuid>, StoryError> {
        self.ensure_online()?;
        let tables = self.tables.read().await;
        let mut ids: Vec<Uuid> = tables
            .follows
            .iter()
            .filter(|(follower, _)| *follower == user_id)
            .map(|(_, author)| *author)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn list_user_liked_story_tags(&self, user_id: Uuid) -> Result<Vec<String>, StoryError> {
        self.ensure_online()?;
        let tables = self.tables.read().await;
        let liked = tables
            .likes
            .iter()
            .filter(|(user, _)| *user == user_id)
            .map(|(_, story)| *story);
        let viewed = tables
            .progress
            .keys()
            .filter(|(user, _)| *user == user_id)
            .map(|(_, story)| *story);

        let mut tags: Vec<String> = liked
            .chain(viewed)
            .filter_map(|id| tables.stories.get(&id))
            .flat_map(|s| s.tags.iter().cloned())
            .collect();
        tags.sort();
        Ok(tags)
    }

    async fn list_seen_story_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, StoryError> {
        self.ensure_online()?;
        let tables = self.tables.read().await;
        let mut ids: Vec<Uuid> = tables
            .progress
            .keys()
            .chain(tables.likes.iter())
            .filter(|(user, _)| *user == user_id)
            .map(|(_, story)| *story)
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}
