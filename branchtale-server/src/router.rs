use std::sync::Arc;

use branchtale_core::ipc::{StoryRequest, StoryResponse};
use branchtale_core::path::{decode, encode, encode_optional};
use branchtale_core::{AppConfig, Choice, StoryError, StoryNode, StoryStore};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::subsystems::progress::{ProgressTracker, SessionRegistry};
use crate::subsystems::trending::TimeRange;
use crate::subsystems::{earnings, recommend, resolver, trending};

/// Everything a request needs. Cheap to clone.
#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<dyn StoryStore>,
    pub config: AppConfig,
    pub sessions: Arc<SessionRegistry>,
}

impl AppContext {
    pub fn new(store: Arc<dyn StoryStore>, config: AppConfig) -> Self {
        let sessions = Arc::new(SessionRegistry::from_config(&config.sessions));
        Self {
            store,
            config,
            sessions,
        }
    }
}

/// A resolved position in a story, as returned to clients.
#[derive(Debug, Serialize)]
pub struct NodeView {
    pub story_id: Uuid,
    pub path: String,
    pub depth: usize,
    pub node: Option<StoryNode>,
    /// No node for this path: show the story root.
    pub show_root: bool,
    /// The node sits at the story's max depth; offer no further choices.
    pub terminal: bool,
}

pub async fn handle_request(request: StoryRequest, ctx: &AppContext) -> StoryResponse {
    let result = match request {
        StoryRequest::Ping => return StoryResponse::pong(),
        StoryRequest::Health => handle_health(ctx).await,
        StoryRequest::ResolveNode { story_id, path } => {
            handle_resolve(ctx, story_id, path.as_deref()).await
        }
        StoryRequest::GetProgress { user_id, session, story_id } => {
            handle_get_progress(ctx, user_id, session.as_deref(), story_id).await
        }
        StoryRequest::SetProgress { user_id, session, story_id, path } => {
            handle_set_progress(ctx, user_id, session.as_deref(), story_id, &path).await
        }
        StoryRequest::Advance { user_id, session, story_id, choice } => {
            handle_advance(ctx, user_id, session.as_deref(), story_id, &choice).await
        }
        StoryRequest::Trending { limit, offset, time_range } => {
            handle_trending(ctx, limit, offset, time_range.as_deref()).await
        }
        StoryRequest::Recommendations { user_id, limit, exclude_story_id } => {
            handle_recommendations(ctx, user_id, limit, exclude_story_id).await
        }
        StoryRequest::Earnings { creator_id } => handle_earnings(ctx, creator_id).await,
    };

    match result {
        Ok(data) => StoryResponse::ok(data),
        Err(e) => {
            tracing::debug!(error = %e, kind = ?e.kind(), "request failed");
            StoryResponse::from(e)
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, StoryError> {
    serde_json::to_value(value).map_err(|e| StoryError::Ipc(format!("Serialization error: {}", e)))
}

async fn handle_health(ctx: &AppContext) -> Result<serde_json::Value, StoryError> {
    let backend = ctx.store.health_check().await?;
    Ok(serde_json::json!({
        "backend": backend,
        "status": "healthy"
    }))
}

async fn handle_resolve(
    ctx: &AppContext,
    story_id: Uuid,
    raw_path: Option<&str>,
) -> Result<serde_json::Value, StoryError> {
    let path = decode(raw_path);
    let story = ctx.store.get_story(story_id).await?;

    let (node, terminal) = match &story {
        Some(story) => {
            let node =
                resolver::resolve_in_story(ctx.store.as_ref(), story, &path, &ctx.config.resolver)
                    .await?;
            let terminal = node.as_ref().map_or(false, |n| n.is_terminal(story.max_depth));
            (node, terminal)
        }
        None => (None, false),
    };

    let view = NodeView {
        story_id,
        path: encode(&path),
        depth: path.len(),
        show_root: node.is_none(),
        terminal,
        node,
    };
    let mut data = to_json(&view)?;
    if let Some(obj) = data.as_object_mut() {
        obj.insert("story_found".to_string(), serde_json::json!(story.is_some()));
    }
    Ok(data)
}

async fn handle_get_progress(
    ctx: &AppContext,
    user_id: Option<Uuid>,
    session: Option<&str>,
    story_id: Uuid,
) -> Result<serde_json::Value, StoryError> {
    let local = ctx.sessions.store_for(session);
    let tracker = ProgressTracker::new(ctx.store.as_ref(), local.as_ref());
    let progress = tracker.get_progress(user_id, story_id).await;
    Ok(serde_json::json!({
        "story_id": story_id,
        "encoded_path": encode_optional(progress.as_ref().map(|p| p.path.as_slice())),
        "progress": progress,
    }))
}

async fn handle_set_progress(
    ctx: &AppContext,
    user_id: Option<Uuid>,
    session: Option<&str>,
    story_id: Uuid,
    raw_path: &str,
) -> Result<serde_json::Value, StoryError> {
    let story = ctx
        .store
        .get_story(story_id)
        .await?
        .ok_or_else(|| StoryError::not_found(format!("story {}", story_id)))?;

    let local = ctx.sessions.store_for(session);
    let tracker = ProgressTracker::new(ctx.store.as_ref(), local.as_ref());
    let progress = tracker
        .set_from_external(user_id, &story, &decode(Some(raw_path)))
        .await;
    Ok(serde_json::json!({
        "story_id": story_id,
        "encoded_path": encode(&progress.path),
        "progress": progress,
    }))
}

async fn handle_advance(
    ctx: &AppContext,
    user_id: Option<Uuid>,
    session: Option<&str>,
    story_id: Uuid,
    raw_choice: &str,
) -> Result<serde_json::Value, StoryError> {
    let choice = Choice::parse(raw_choice)
        .ok_or_else(|| StoryError::invalid(format!("choice must be A or B, got '{}'", raw_choice)))?;

    let story = ctx
        .store
        .get_story(story_id)
        .await?
        .ok_or_else(|| StoryError::not_found(format!("story {}", story_id)))?;

    let local = ctx.sessions.store_for(session);
    let tracker = ProgressTracker::new(ctx.store.as_ref(), local.as_ref());
    let progress = tracker.choose(user_id, &story, choice).await?;

    let node = resolver::resolve_in_story(
        ctx.store.as_ref(),
        &story,
        &progress.path,
        &ctx.config.resolver,
    )
    .await?;
    let terminal = node.as_ref().map_or(false, |n| n.is_terminal(story.max_depth));

    Ok(serde_json::json!({
        "story_id": story_id,
        "encoded_path": encode(&progress.path),
        "depth": progress.current_depth,
        "source": progress.source,
        "show_root": node.is_none(),
        "terminal": terminal,
        "node": node,
    }))
}

async fn handle_trending(
    ctx: &AppContext,
    limit: Option<u32>,
    offset: Option<u32>,
    time_range: Option<&str>,
) -> Result<serde_json::Value, StoryError> {
    let range = TimeRange::parse(time_range)?;
    let page = trending::get_trending(
        ctx.store.as_ref(),
        limit,
        offset,
        range,
        &ctx.config.trending,
        Utc::now(),
    )
    .await?;
    to_json(&page)
}

async fn handle_recommendations(
    ctx: &AppContext,
    user_id: Option<Uuid>,
    limit: Option<u32>,
    exclude_story_id: Option<Uuid>,
) -> Result<serde_json::Value, StoryError> {
    let recs = recommend::get_recommendations(
        ctx.store.as_ref(),
        user_id,
        limit,
        exclude_story_id,
        &ctx.config.recommendations,
        &ctx.config.trending,
    )
    .await?;
    Ok(serde_json::json!({
        "count": recs.len(),
        "recommendations": recs,
    }))
}

async fn handle_earnings(ctx: &AppContext, creator_id: Uuid) -> Result<serde_json::Value, StoryError> {
    let report = earnings::creator_earnings(ctx.store.as_ref(), creator_id, &ctx.config.earnings).await?;
    to_json(&report)
}
