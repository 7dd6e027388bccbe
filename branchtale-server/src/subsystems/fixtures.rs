//! Shared test data builders.

use std::collections::HashMap;

use branchtale_core::path::decode;
use branchtale_core::{Choice, MemoryStore, Story, StoryNode};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

pub fn path(raw: &str) -> Vec<String> {
    decode(Some(raw))
}

pub struct SeededStory {
    pub story: Story,
    /// Keyed by path without separators: "A", "AB", ...
    pub nodes: HashMap<String, StoryNode>,
}

impl SeededStory {
    pub fn node(&self, key: &str) -> &StoryNode {
        &self.nodes[key]
    }
}

/// A published story with a complete binary tree `depth` levels deep.
pub async fn seed_binary_story(store: &MemoryStore, depth: usize, max_depth: i32) -> SeededStory {
    let mut story = Story::new(Uuid::new_v4(), "Branching test story");
    story.max_depth = max_depth;
    store.insert_story(story.clone()).await;

    let mut nodes: HashMap<String, StoryNode> = HashMap::new();
    let mut frontier: Vec<(String, Option<Uuid>)> = vec![(String::new(), None)];

    for level in 1..=depth {
        let mut next = Vec::new();
        for (prefix, parent) in &frontier {
            for choice in [Choice::A, Choice::B] {
                let key = format!("{}{}", prefix, choice);
                let node = StoryNode::new(story.id, *parent, choice, level as i32)
                    .with_content(format!("node {}", key));
                store.insert_node(node.clone()).await;
                next.push((key.clone(), Some(node.id)));
                nodes.insert(key, node);
            }
        }
        frontier = next;
    }

    SeededStory { story, nodes }
}

/// A published story with the given age and counters. Not inserted.
pub fn story_with(
    author_id: Uuid,
    created_at: DateTime<Utc>,
    views: i64,
    likes: i64,
    shares: i64,
    comments: i64,
) -> Story {
    let mut story = Story::new(author_id, "Engagement fixture");
    story.created_at = created_at;
    story.updated_at = created_at;
    story.views_count = views;
    story.likes_count = likes;
    story.shares_count = shares;
    story.comments_count = comments;
    story
}

pub fn hours_ago(now: DateTime<Utc>, hours: i64) -> DateTime<Utc> {
    now - Duration::hours(hours)
}
