//! Story tree resolver: path to node
//!
//! Walks a story's binary decision tree one symbol at a time. Each step looks up
//! the unique node for (story, parent, symbol). Any miss means the path is not
//! valid for this story and resolution yields `None`; callers fall back to the
//! story root. That covers stale shared links, deleted branches, and paths that
//! run deeper than the tree.
//!
//! Two strategies, same answers:
//! - stepwise: one `get_node` lookup per symbol
//! - preloaded: `list_nodes_by_story` once, walk an in-memory [`StoryTree`]
//!
//! Depth convention: the story is depth 0, the node reached by a path of length
//! n has `depth == n`. A node whose depth disagrees with its step, or a node id
//! seen twice during one walk, is treated like a missing node.

use std::collections::{HashMap, HashSet};

use branchtale_core::config::ResolverConfig;
use branchtale_core::{Story, StoryError, StoryNode, StoryStore};
use uuid::Uuid;

/// Resolve `path` within the story `story_id`.
///
/// Returns `Ok(None)` for the empty path (show the root), for unknown stories,
/// and for any path that does not address an existing node. Only data-access
/// failures are errors.
pub async fn resolve_node(
    store: &dyn StoryStore,
    story_id: Uuid,
    path: &[String],
    config: &ResolverConfig,
) -> Result<Option<StoryNode>, StoryError> {
    if path.is_empty() {
        return Ok(None);
    }

    let story = match store.get_story(story_id).await? {
        Some(s) => s,
        None => {
            tracing::debug!(%story_id, "resolve: story not found");
            return Ok(None);
        }
    };

    resolve_in_story(store, &story, path, config).await
}

/// Same as [`resolve_node`] for a story the caller already loaded.
pub async fn resolve_in_story(
    store: &dyn StoryStore,
    story: &Story,
    path: &[String],
    config: &ResolverConfig,
) -> Result<Option<StoryNode>, StoryError> {
    if path.is_empty() {
        return Ok(None);
    }

    if path.len() as i64 > story.max_depth as i64 {
        tracing::debug!(
            story_id = %story.id,
            depth = path.len(),
            max_depth = story.max_depth,
            "resolve: path deeper than story"
        );
        return Ok(None);
    }

    if !path.iter().all(|s| is_symbol(s)) {
        return Ok(None);
    }

    if config.preload_tree {
        let nodes = store.list_nodes_by_story(story.id).await?;
        return Ok(StoryTree::from_nodes(nodes).walk(path).cloned());
    }

    let mut parent: Option<Uuid> = None;
    let mut visited: HashSet<Uuid> = HashSet::new();
    let mut current: Option<StoryNode> = None;

    for (step, symbol) in path.iter().enumerate() {
        let node = match store.get_node(story.id, parent, symbol).await? {
            Some(n) => n,
            None => return Ok(None),
        };
        if !accept_step(&node, step, &mut visited) {
            return Ok(None);
        }
        parent = Some(node.id);
        current = Some(node);
    }

    Ok(current)
}

/// Strict symbol check: resolution only follows exact `A`/`B` edges.
fn is_symbol(symbol: &str) -> bool {
    symbol == "A" || symbol == "B"
}

fn accept_step(node: &StoryNode, step: usize, visited: &mut HashSet<Uuid>) -> bool {
    visited.insert(node.id) && node.depth as i64 == step as i64 + 1
}

/// A story's nodes indexed by incoming edge.
#[derive(Debug, Default)]
pub struct StoryTree {
    edges: HashMap<(Option<Uuid>, String), StoryNode>,
}

impl StoryTree {
    /// Index nodes by (parent, choice label). Duplicate edges keep the lowest id.
    pub fn from_nodes(nodes: Vec<StoryNode>) -> Self {
        let mut edges: HashMap<(Option<Uuid>, String), StoryNode> = HashMap::new();
        for node in nodes {
            let label = match &node.choice_label {
                Some(l) => l.clone(),
                None => continue,
            };
            let key = (node.parent_id, label);
            match edges.get(&key) {
                Some(existing) if existing.id <= node.id => {}
                _ => {
                    edges.insert(key, node);
                }
            }
        }
        Self { edges }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn child(&self, parent: Option<Uuid>, symbol: &str) -> Option<&StoryNode> {
        self.edges.get(&(parent, symbol.to_string()))
    }

    /// Follow `path` from the root. `None` on the first missing or inconsistent step.
    pub fn walk(&self, path: &[String]) -> Option<&StoryNode> {
        let mut parent: Option<Uuid> = None;
        let mut visited = HashSet::new();
        let mut current = None;
        for (step, symbol) in path.iter().enumerate() {
            let node = self.child(parent, symbol)?;
            if !accept_step(node, step, &mut visited) {
                return None;
            }
            parent = Some(node.id);
            current = Some(node);
        }
        current
    }
}
