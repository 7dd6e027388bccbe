//! Branchtale HTTP REST API
//!
//! Axum server exposing story traversal, progress, trending, recommendations
//! and creator earnings. Runs alongside the Unix socket IPC server on port 8766
//! (configurable).
//!
//! Each endpoint is a thin axum handler over an inner function that builds a
//! `StoryRequest`, runs it through the shared router and maps the outcome to a
//! status code. The inner functions are tested without axum dispatch.
//!
//! Endpoints:
//! - GET  /health
//! - GET  /version
//! - GET  /stories/:id/node?path=A,B
//! - GET  /stories/:id/progress
//! - PUT  /stories/:id/progress
//! - POST /stories/:id/advance
//! - GET  /trending?limit=&offset=&time_range=
//! - GET  /recommendations?user_id=&limit=&exclude_story_id=
//! - GET  /creators/:id/earnings

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use branchtale_core::ipc::{StoryRequest, StoryResponse};
use branchtale_core::ErrorKind;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::router::{handle_request, AppContext};

pub type HttpState = Arc<AppContext>;

/// Build the Axum router with all endpoints
pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/stories/:id/node", get(node_handler))
        .route(
            "/stories/:id/progress",
            get(get_progress_handler).put(set_progress_handler),
        )
        .route("/stories/:id/advance", post(advance_handler))
        .route("/trending", get(trending_handler))
        .route("/recommendations", get(recommendations_handler))
        .route("/creators/:id/earnings", get(earnings_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(ctx: AppContext, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
    let addr = format!("{}:{}", ctx.config.http.host, ctx.config.http.port);
    let app = build_router(Arc::new(ctx));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Branchtale HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct NodeQuery {
    pub path: Option<String>,
}

/// Who is reading. Anonymous viewers pass only a session key, or nothing.
#[derive(Debug, Deserialize, Default)]
pub struct ViewerQuery {
    pub user_id: Option<Uuid>,
    pub session: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetProgressBody {
    pub path: String,
    pub user_id: Option<Uuid>,
    pub session: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdvanceBody {
    pub choice: String,
    pub user_id: Option<Uuid>,
    pub session: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct TrendingQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub time_range: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct RecommendationQuery {
    pub user_id: Option<Uuid>,
    pub limit: Option<u32>,
    pub exclude_story_id: Option<Uuid>,
}

// ============================================================================
// Inner (directly testable) functions
// ============================================================================

/// Inner health check: asks the store and reports backend status.
pub async fn health_inner(ctx: &AppContext) -> (StatusCode, serde_json::Value) {
    match ctx.store.health_check().await {
        Ok(backend) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "backend": backend,
                "socket": ctx.config.service.socket_path,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "unhealthy",
                "error": e.to_string(),
            }),
        ),
    }
}

/// Inner version: pure, no IO.
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "branchtale/1",
    })
}

pub async fn node_inner(ctx: &AppContext, story_id: Uuid, query: NodeQuery) -> (StatusCode, serde_json::Value) {
    dispatch(ctx, StoryRequest::ResolveNode { story_id, path: query.path }).await
}

pub async fn get_progress_inner(
    ctx: &AppContext,
    story_id: Uuid,
    viewer: ViewerQuery,
) -> (StatusCode, serde_json::Value) {
    let request = StoryRequest::GetProgress {
        user_id: viewer.user_id,
        session: viewer.session,
        story_id,
    };
    dispatch(ctx, request).await
}

pub async fn set_progress_inner(
    ctx: &AppContext,
    story_id: Uuid,
    body: SetProgressBody,
) -> (StatusCode, serde_json::Value) {
    let request = StoryRequest::SetProgress {
        user_id: body.user_id,
        session: body.session,
        story_id,
        path: body.path,
    };
    dispatch(ctx, request).await
}

pub async fn advance_inner(ctx: &AppContext, story_id: Uuid, body: AdvanceBody) -> (StatusCode, serde_json::Value) {
    let request = StoryRequest::Advance {
        user_id: body.user_id,
        session: body.session,
        story_id,
        choice: body.choice,
    };
    dispatch(ctx, request).await
}

/// Inner trending: adds `took_ms` to the page.
pub async fn trending_inner(ctx: &AppContext, query: TrendingQuery) -> (StatusCode, serde_json::Value) {
    let start = Instant::now();
    let (status, mut body) = dispatch(
        ctx,
        StoryRequest::Trending {
            limit: query.limit,
            offset: query.offset,
            time_range: query.time_range,
        },
    )
    .await;

    if status == StatusCode::OK {
        if let Some(obj) = body.as_object_mut() {
            obj.insert("took_ms".to_string(), serde_json::json!(start.elapsed().as_millis() as u64));
        }
    }
    (status, body)
}

pub async fn recommendations_inner(
    ctx: &AppContext,
    query: RecommendationQuery,
) -> (StatusCode, serde_json::Value) {
    let request = StoryRequest::Recommendations {
        user_id: query.user_id,
        limit: query.limit,
        exclude_story_id: query.exclude_story_id,
    };
    dispatch(ctx, request).await
}

pub async fn earnings_inner(ctx: &AppContext, creator_id: Uuid) -> (StatusCode, serde_json::Value) {
    dispatch(ctx, StoryRequest::Earnings { creator_id }).await
}

// ============================================================================
// Axum handler wrappers (thin, delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<HttpState>) -> impl IntoResponse {
    let (status, body) = health_inner(&state).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn node_handler(
    State(state): State<HttpState>,
    Path(story_id): Path<Uuid>,
    Query(query): Query<NodeQuery>,
) -> impl IntoResponse {
    let (status, body) = node_inner(&state, story_id, query).await;
    (status, Json(body))
}

pub async fn get_progress_handler(
    State(state): State<HttpState>,
    Path(story_id): Path<Uuid>,
    Query(viewer): Query<ViewerQuery>,
) -> impl IntoResponse {
    let (status, body) = get_progress_inner(&state, story_id, viewer).await;
    (status, Json(body))
}

pub async fn set_progress_handler(
    State(state): State<HttpState>,
    Path(story_id): Path<Uuid>,
    Json(body): Json<SetProgressBody>,
) -> impl IntoResponse {
    let (status, body) = set_progress_inner(&state, story_id, body).await;
    (status, Json(body))
}

pub async fn advance_handler(
    State(state): State<HttpState>,
    Path(story_id): Path<Uuid>,
    Json(body): Json<AdvanceBody>,
) -> impl IntoResponse {
    let (status, body) = advance_inner(&state, story_id, body).await;
    (status, Json(body))
}

pub async fn trending_handler(
    State(state): State<HttpState>,
    Query(query): Query<TrendingQuery>,
) -> impl IntoResponse {
    let (status, body) = trending_inner(&state, query).await;
    (status, Json(body))
}

pub async fn recommendations_handler(
    State(state): State<HttpState>,
    Query(query): Query<RecommendationQuery>,
) -> impl IntoResponse {
    let (status, body) = recommendations_inner(&state, query).await;
    (status, Json(body))
}

pub async fn earnings_handler(
    State(state): State<HttpState>,
    Path(creator_id): Path<Uuid>,
) -> impl IntoResponse {
    let (status, body) = earnings_inner(&state, creator_id).await;
    (status, Json(body))
}

// ============================================================================
// Helpers
// ============================================================================

async fn dispatch(ctx: &AppContext, request: StoryRequest) -> (StatusCode, serde_json::Value) {
    let response = handle_request(request, ctx).await;
    match response_to_http(response) {
        Ok(data) => (StatusCode::OK, data),
        Err((status, kind, error)) => (
            status,
            serde_json::json!({
                "error": error,
                "error_kind": kind,
                "status": "error",
            }),
        ),
    }
}

pub fn status_for_kind(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Convert a router `StoryResponse` into an HTTP body, or the error status,
/// kind and message.
pub fn response_to_http(
    response: StoryResponse,
) -> std::result::Result<serde_json::Value, (StatusCode, ErrorKind, String)> {
    if response.is_ok() {
        return Ok(response.data.unwrap_or(serde_json::json!({})));
    }
    let kind = response.error_kind.unwrap_or(ErrorKind::Internal);
    let message = response.error.unwrap_or_else(|| "unknown error".to_string());
    Err((status_for_kind(kind), kind, message))
}

// ============================================================================
// Unit Tests: call inner functions directly
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::fixtures::{seed_binary_story, story_with};
    use branchtale_core::{AppConfig, MemoryStore};
    use chrono::Utc;

    fn make_ctx(store: Arc<MemoryStore>) -> AppContext {
        AppContext::new(store, AppConfig::in_memory())
    }

    // ========================================================================
    // TEST 1: version_inner is pure and returns correct fields
    // ========================================================================
    #[test]
    fn test_version_inner_pure() {
        let v = version_inner();
        assert!(v["version"].is_string());
        assert_eq!(v["protocol"], "branchtale/1");
    }

    // ========================================================================
    // TEST 2: response_to_http maps kinds to status codes
    // ========================================================================
    #[test]
    fn test_response_to_http_kinds() {
        let ok = response_to_http(StoryResponse::ok(serde_json::json!({"count": 0}))).unwrap();
        assert_eq!(ok["count"], 0);

        let cases = [
            (ErrorKind::InvalidInput, StatusCode::BAD_REQUEST),
            (ErrorKind::NotFound, StatusCode::NOT_FOUND),
            (ErrorKind::UpstreamUnavailable, StatusCode::SERVICE_UNAVAILABLE),
            (ErrorKind::Internal, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (kind, expected) in cases {
            let (status, got_kind, msg) =
                response_to_http(StoryResponse::err_kind(kind, "boom")).unwrap_err();
            assert_eq!(status, expected);
            assert_eq!(got_kind, kind);
            assert_eq!(msg, "boom");
        }
    }

    // ========================================================================
    // TEST 3: untyped error falls back to 500 and a default message
    // ========================================================================
    #[test]
    fn test_response_to_http_error_no_message() {
        let mut resp = StoryResponse::err("x");
        resp.error = None;
        resp.error_kind = None;
        let (status, kind, msg) = response_to_http(resp).unwrap_err();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(kind, ErrorKind::Internal);
        assert_eq!(msg, "unknown error");
    }

    // ========================================================================
    // TEST 4: health_inner reflects store availability
    // ========================================================================
    #[tokio::test]
    async fn test_health_inner() {
        let store = Arc::new(MemoryStore::new());
        let ctx = make_ctx(store.clone());

        let (status, body) = health_inner(&ctx).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));

        store.set_online(false);
        let (status, body) = health_inner(&ctx).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "unhealthy");
    }

    // ========================================================================
    // TEST 5: node_inner resolves a shared link path
    // ========================================================================
    #[tokio::test]
    async fn test_node_inner_resolves_path() {
        let store = Arc::new(MemoryStore::new());
        let seeded = seed_binary_story(&store, 3, 5).await;
        let ctx = make_ctx(store);

        let (status, body) = node_inner(
            &ctx,
            seeded.story.id,
            NodeQuery { path: Some("B,A,B".to_string()) },
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["node"]["id"], serde_json::json!(seeded.node("BAB").id));
        assert_eq!(body["path"], "B,A,B");
        assert_eq!(body["show_root"], false);
    }

    // ========================================================================
    // TEST 6: shared link then advance continues from the link's position
    // ========================================================================
    #[tokio::test]
    async fn test_set_progress_then_advance() {
        let store = Arc::new(MemoryStore::new());
        let seeded = seed_binary_story(&store, 3, 5).await;
        let ctx = make_ctx(store);
        let user = Uuid::new_v4();

        let (status, _) = set_progress_inner(
            &ctx,
            seeded.story.id,
            SetProgressBody { path: "A,B".to_string(), user_id: Some(user), session: None },
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = advance_inner(
            &ctx,
            seeded.story.id,
            AdvanceBody { choice: "B".to_string(), user_id: Some(user), session: None },
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["encoded_path"], "A,B,B");
        assert_eq!(body["source"], "durable");
        assert_eq!(body["node"]["id"], serde_json::json!(seeded.node("ABB").id));

        let (_, body) = get_progress_inner(
            &ctx,
            seeded.story.id,
            ViewerQuery { user_id: Some(user), session: None },
        )
        .await;
        assert_eq!(body["encoded_path"], "A,B,B");
        assert_eq!(body["progress"]["current_depth"], 3);
    }

    // ========================================================================
    // TEST 7: bad choice is 400, unknown story is 404
    // ========================================================================
    #[tokio::test]
    async fn test_advance_inner_error_statuses() {
        let store = Arc::new(MemoryStore::new());
        let seeded = seed_binary_story(&store, 1, 5).await;
        let ctx = make_ctx(store);

        let (status, body) = advance_inner(
            &ctx,
            seeded.story.id,
            AdvanceBody { choice: "left".to_string(), user_id: None, session: None },
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_kind"], "invalid_input");

        let (status, _) = advance_inner(
            &ctx,
            Uuid::new_v4(),
            AdvanceBody { choice: "A".to_string(), user_id: None, session: None },
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    // ========================================================================
    // TEST 8: trending_inner returns page with timing, 503 on outage
    // ========================================================================
    #[tokio::test]
    async fn test_trending_inner() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        store.insert_story(story_with(Uuid::new_v4(), now, 100, 10, 1, 1)).await;
        let ctx = make_ctx(store.clone());

        let (status, body) = trending_inner(&ctx, TrendingQuery::default()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stories"].as_array().map(Vec::len), Some(1));
        assert!(body["took_ms"].is_number());

        store.set_online(false);
        let (status, body) = trending_inner(&ctx, TrendingQuery::default()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error_kind"], "upstream_unavailable");
    }

    // ========================================================================
    // TEST 9: earnings_inner for a creator with no stories is all zeros
    // ========================================================================
    #[tokio::test]
    async fn test_earnings_inner_empty_creator() {
        let ctx = make_ctx(Arc::new(MemoryStore::new()));
        let (status, body) = earnings_inner(&ctx, Uuid::new_v4()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["story_count"], 0);
        assert_eq!(body["portfolio"]["total"], 0.0);
    }
}
