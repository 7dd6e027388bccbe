use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// One binary choice symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Choice {
    A,
    B,
}

impl Choice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Choice::A => "A",
            Choice::B => "B",
        }
    }

    /// Trimmed, case-insensitive.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "A" | "a" => Some(Choice::A),
            "B" | "b" => Some(Choice::B),
            _ => None,
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outgoing edge definition as authored on a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub label: Option<String>,
    pub content: Option<String>,
}

/// A decision point. `choice_label` is the symbol that led here from `parent_id`
/// (or from the story root when `parent_id` is `None`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryNode {
    pub id: Uuid,
    pub story_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub choice_label: Option<String>,
    pub content: Option<String>,
    pub media_url: Option<String>,
    pub depth: i32,
    pub choice_a: ChoiceOption,
    pub choice_b: ChoiceOption,
    pub created_at: DateTime<Utc>,
}

impl StoryNode {
    pub fn new(story_id: Uuid, parent_id: Option<Uuid>, choice: Choice, depth: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            story_id,
            parent_id,
            choice_label: Some(choice.as_str().to_string()),
            content: None,
            media_url: None,
            depth,
            choice_a: ChoiceOption::default(),
            choice_b: ChoiceOption::default(),
            created_at: Utc::now(),
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// True when this node sits at the story's depth limit.
    pub fn is_terminal(&self, max_depth: i32) -> bool {
        self.depth >= max_depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choice_parse() {
        assert_eq!(Choice::parse("A"), Some(Choice::A));
        assert_eq!(Choice::parse(" b "), Some(Choice::B));
        assert_eq!(Choice::parse("X"), None);
        assert_eq!(Choice::parse(""), None);
    }

    #[test]
    fn test_terminal_at_max_depth() {
        let node = StoryNode::new(Uuid::new_v4(), None, Choice::A, 5);
        assert!(node.is_terminal(5));
        assert!(!node.is_terminal(6));
    }
}
