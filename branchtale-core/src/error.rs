use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IPC error: {0}")]
    Ipc(String),
}

/// Wire-level classification of a [`StoryError`], carried in IPC/HTTP error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    UpstreamUnavailable,
    Internal,
}

impl StoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoryError::NotFound(_) => ErrorKind::NotFound,
            StoryError::InvalidInput(_) => ErrorKind::InvalidInput,
            StoryError::UpstreamUnavailable(_) | StoryError::Io(_) => ErrorKind::UpstreamUnavailable,
            StoryError::Database(e) => match e {
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                    ErrorKind::UpstreamUnavailable
                }
                _ => ErrorKind::Internal,
            },
            StoryError::Config(_) | StoryError::Ipc(_) => ErrorKind::Internal,
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        StoryError::InvalidInput(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        StoryError::NotFound(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(StoryError::invalid("bad").kind(), ErrorKind::InvalidInput);
        assert_eq!(StoryError::not_found("x").kind(), ErrorKind::NotFound);
        assert_eq!(
            StoryError::Database(sqlx::Error::PoolTimedOut).kind(),
            ErrorKind::UpstreamUnavailable
        );
        assert_eq!(
            StoryError::Database(sqlx::Error::RowNotFound).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::UpstreamUnavailable).unwrap();
        assert_eq!(json, "\"upstream_unavailable\"");
    }
}
