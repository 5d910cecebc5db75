//! Session goal tracking.
//!
//! Goals are replaced wholesale on every update. The model restates
//! the complete current set each time, which keeps the list from
//! accreting stale entries that merging would preserve.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Progress state of a goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Pending,
    InProgress,
    Completed,
}

/// A single goal the agent is working toward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,
    pub description: String,
    pub status: GoalStatus,
}

impl Goal {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            status: GoalStatus::Pending,
        }
    }
}

/// The current goal set.
#[derive(Debug, Default)]
pub struct GoalSet {
    goals: Vec<Goal>,
}

impl GoalSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entire set. There is no partial update.
    pub fn replace(&mut self, goals: Vec<Goal>) {
        self.goals = goals;
    }

    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
    }

    /// Render for a prompt, one goal per line.
    pub fn render(&self) -> String {
        if self.goals.is_empty() {
            return "(no goals set)".to_string();
        }
        self.goals
            .iter()
            .enumerate()
            .map(|(i, g)| format!("{}. {}", i + 1, g.description))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_is_wholesale() {
        let mut goals = GoalSet::new();
        goals.replace(vec![Goal::new("a"), Goal::new("b")]);
        goals.replace(vec![Goal::new("c")]);

        assert_eq!(goals.goals().len(), 1);
        assert_eq!(goals.goals()[0].description, "c");
        assert_eq!(goals.goals()[0].status, GoalStatus::Pending);
    }

    #[test]
    fn render_numbers_goals() {
        let mut goals = GoalSet::new();
        goals.replace(vec![Goal::new("first"), Goal::new("second")]);
        let rendered = goals.render();
        assert!(rendered.contains("1. first"));
        assert!(rendered.contains("2. second"));
    }

    #[test]
    fn empty_set_renders_placeholder() {
        assert_eq!(GoalSet::new().render(), "(no goals set)");
    }
}
