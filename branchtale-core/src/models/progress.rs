use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Durable progress row, unique per (user, story).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserProgress {
    pub user_id: Uuid,
    pub story_id: Uuid,
    pub path: Vec<String>,
    pub current_depth: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressSource {
    Durable,
    Local,
}

/// A viewer's position in a story as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub path: Vec<String>,
    pub current_depth: i32,
    pub source: ProgressSource,
}

impl Progress {
    /// `current_depth` is always derived from the path.
    pub fn new(path: Vec<String>, source: ProgressSource) -> Self {
        let current_depth = path.len() as i32;
        Self { path, current_depth, source }
    }
}

impl From<UserProgress> for Progress {
    fn from(row: UserProgress) -> Self {
        Progress::new(row.path, ProgressSource::Durable)
    }
}
