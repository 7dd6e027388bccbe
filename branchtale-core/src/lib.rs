pub mod config;
pub mod db;
pub mod error;
pub mod ipc;
pub mod models;
pub mod path;
pub mod store;

pub use config::AppConfig;
pub use error::{ErrorKind, StoryError};
pub use models::{
    Choice, ChoiceOption, EngagementSnapshot, MediaKind, Progress, ProgressSource, Story,
    StoryNode, StoryStatus, UserProgress,
};
pub use store::{MemoryStore, PgStoryStore, PopularityWeights, StoryFilter, StoryStore};
