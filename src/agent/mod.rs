//! The agent: a bounded decide/act loop over the tool lifecycle.

mod agent_loop;
mod deps;
mod goals;
mod history;

pub use agent_loop::{Agent, AgentOutcome};
pub use deps::AgentDeps;
pub use goals::{Goal, GoalSet, GoalStatus};
pub use history::{History, HistoryEntry, HistoryRecord};
