pub mod node;
pub mod progress;
pub mod story;

pub use node::{Choice, ChoiceOption, StoryNode};
pub use progress::{Progress, ProgressSource, UserProgress};
pub use story::{EngagementSnapshot, MediaKind, Story, StoryStatus};
