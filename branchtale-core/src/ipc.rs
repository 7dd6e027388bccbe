use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ErrorKind, StoryError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StoryRequest {
    Ping,
    Health,
    ResolveNode {
        story_id: Uuid,
        /// Encoded path, e.g. `"A,B"`. Absent or blank addresses the story root.
        path: Option<String>,
    },
    GetProgress {
        user_id: Option<Uuid>,
        session: Option<String>,
        story_id: Uuid,
    },
    SetProgress {
        user_id: Option<Uuid>,
        session: Option<String>,
        story_id: Uuid,
        path: String,
    },
    Advance {
        user_id: Option<Uuid>,
        session: Option<String>,
        story_id: Uuid,
        choice: String,
    },
    Trending {
        limit: Option<u32>,
        offset: Option<u32>,
        time_range: Option<String>,
    },
    Recommendations {
        user_id: Option<Uuid>,
        limit: Option<u32>,
        exclude_story_id: Option<Uuid>,
    },
    Earnings {
        creator_id: Uuid,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StoryResponse {
    pub status: String,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    #[serde(default)]
    pub error_kind: Option<ErrorKind>,
    pub version: String,
}

impl StoryResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            status: "ok".to_string(),
            data: Some(data),
            error: None,
            error_kind: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self::err_kind(ErrorKind::Internal, msg)
    }

    pub fn err_kind(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            error: Some(msg.into()),
            error_kind: Some(kind),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn pong() -> Self {
        Self::ok(serde_json::json!({"pong": true}))
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

impl From<StoryError> for StoryResponse {
    fn from(e: StoryError) -> Self {
        StoryResponse::err_kind(e.kind(), e.to_string())
    }
}

/// MessagePack frame payload for a request.
pub fn decode_request(bytes: &[u8]) -> Result<StoryRequest, StoryError> {
    rmp_serde::from_slice(bytes).map_err(|e| StoryError::Ipc(format!("Deserialization error: {}", e)))
}

/// MessagePack frame payload for a response, with named fields.
pub fn encode_response(response: &StoryResponse) -> Result<Vec<u8>, StoryError> {
    rmp_serde::to_vec_named(response).map_err(|e| StoryError::Ipc(format!("Serialization error: {}", e)))
}
