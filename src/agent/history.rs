//! Append-only session history.
//!
//! The history is the agent's working memory for a task: every
//! decision, execution, and goal change is appended and nothing is
//! ever rewritten. Prompts see a rendered transcript of the whole
//! thing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tools::ExecutionResult;

/// One recorded event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HistoryEntry {
    TaskReceived {
        task: String,
    },
    Thought {
        text: String,
    },
    ToolSelected {
        name: String,
        reason: String,
    },
    ToolCreated {
        name: String,
        repair_iterations: u32,
    },
    ToolExecuted {
        name: String,
        result: ExecutionResult,
    },
    GoalsReplaced {
        goals: Vec<String>,
    },
    Note {
        text: String,
    },
}

/// One entry with its position in the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Agent loop iteration this entry belongs to; 0 for pre-loop events.
    pub iteration: u32,
    pub at: DateTime<Utc>,
    pub entry: HistoryEntry,
}

/// Append-only event log.
#[derive(Debug, Default)]
pub struct History {
    records: Vec<HistoryRecord>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. There is deliberately no way to remove or edit.
    pub fn append(&mut self, iteration: u32, entry: HistoryEntry) {
        self.records.push(HistoryRecord {
            iteration,
            at: Utc::now(),
            entry,
        });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.records.iter().map(|r| &r.entry)
    }

    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    /// Render the transcript for a prompt.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for record in &self.records {
            let line = match &record.entry {
                HistoryEntry::TaskReceived { task } => format!("task received: {}", task),
                HistoryEntry::Thought { text } => format!("thought: {}", text),
                HistoryEntry::ToolSelected { name, reason } => {
                    format!("selected tool '{}': {}", name, reason)
                }
                HistoryEntry::ToolCreated {
                    name,
                    repair_iterations,
                } => format!(
                    "created tool '{}' ({} repair iterations)",
                    name, repair_iterations
                ),
                HistoryEntry::ToolExecuted { name, result } => {
                    if result.success {
                        format!(
                            "executed '{}' ok: {}",
                            name,
                            result
                                .output
                                .as_ref()
                                .map(|v| v.to_string())
                                .unwrap_or_default()
                        )
                    } else {
                        let failure = result
                            .failure
                            .as_ref()
                            .map(|f| format!("{}: {}", f.kind, f.message))
                            .unwrap_or_else(|| "unknown failure".to_string());
                        format!("executed '{}' failed ({})", name, failure)
                    }
                }
                HistoryEntry::GoalsReplaced { goals } => {
                    format!("goals replaced: [{}]", goals.join("; "))
                }
                HistoryEntry::Note { text } => format!("note: {}", text),
            };
            out.push_str(&format!(
                "[{} #{}] {}\n",
                record.at.format("%H:%M:%S"),
                record.iteration,
                line
            ));
        }
        out
    }
}
