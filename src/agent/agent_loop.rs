//! The decide/act loop.
//!
//! Each iteration the model sees the task, the goal set, and the full
//! history transcript, then picks one action: invoke a tool (existing
//! or newly created), replace the goals, or finish with an answer.
//! The loop is bounded; running out of iterations is an error, not a
//! silent stop.

use serde::Deserialize;

use crate::agent::deps::AgentDeps;
use crate::agent::goals::{Goal, GoalSet};
use crate::agent::history::{History, HistoryEntry};
use crate::config::AgentConfig;
use crate::error::{AgentError, Error};
use crate::llm::CompletionRequest;
use crate::select::SelectionOutcome;

/// Final result of a task run.
#[derive(Debug)]
pub struct AgentOutcome {
    pub answer: String,
    pub iterations: u32,
    pub history: History,
}

/// One decision from the model: an optional thought plus an action.
#[derive(Debug, Deserialize)]
struct Decision {
    #[serde(default)]
    thought: Option<String>,
    #[serde(flatten)]
    action: Action,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum Action {
    /// Run a tool for a subtask, creating one if nothing fits.
    Invoke {
        task: String,
        #[serde(default)]
        params: serde_json::Value,
    },
    /// Replace the goal set wholesale.
    UpdateGoals { goals: Vec<String> },
    /// Done; report the answer.
    Finish { answer: String },
}

fn decision_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "thought": {
                "type": "string",
                "description": "Brief reasoning behind this action"
            },
            "action": {
                "type": "string",
                "enum": ["invoke", "update_goals", "finish"]
            },
            "task": {
                "type": "string",
                "description": "For invoke: what the tool call should accomplish"
            },
            "params": {
                "type": "object",
                "description": "For invoke: arguments for the tool"
            },
            "goals": {
                "type": "array",
                "items": {"type": "string"},
                "description": "For update_goals: the complete new goal set"
            },
            "answer": {
                "type": "string",
                "description": "For finish: the final answer"
            }
        },
        "required": ["action"]
    })
}

/// Task-driven agent over the tool lifecycle.
pub struct Agent {
    deps: AgentDeps,
    config: AgentConfig,
}

impl Agent {
    pub fn new(deps: AgentDeps, config: AgentConfig) -> Self {
        Self { deps, config }
    }

    /// Run a task to completion or to the iteration bound.
    pub async fn run(&self, task: &str) -> Result<AgentOutcome, Error> {
        let mut history = History::new();
        let mut goals = GoalSet::new();
        history.append(
            0,
            HistoryEntry::TaskReceived {
                task: task.to_string(),
            },
        );

        for iteration in 1..=self.config.max_iterations {
            let decision = self.decide(task, &history, &goals).await?;
            if let Some(thought) = decision.thought {
                history.append(iteration, HistoryEntry::Thought { text: thought });
            }

            match decision.action {
                Action::Finish { answer } => {
                    tracing::info!(iterations = iteration, "task finished");
                    return Ok(AgentOutcome {
                        answer,
                        iterations: iteration,
                        history,
                    });
                }
                Action::UpdateGoals {
                    goals: descriptions,
                } => {
                    goals.replace(descriptions.iter().map(Goal::new).collect());
                    history.append(
                        iteration,
                        HistoryEntry::GoalsReplaced {
                            goals: descriptions,
                        },
                    );
                }
                Action::Invoke {
                    task: subtask,
                    params,
                } => {
                    self.invoke(iteration, &subtask, params, &mut history).await?;
                }
            }
        }

        Err(Error::Agent(AgentError::MaxIterations {
            max: self.config.max_iterations,
        }))
    }

    /// Run a subtask through selection, falling back to creation.
    async fn invoke(
        &self,
        iteration: u32,
        subtask: &str,
        params: serde_json::Value,
        history: &mut History,
    ) -> Result<(), Error> {
        let name = match self.deps.selector.select(subtask).await? {
            SelectionOutcome::Selected { name, reason } => {
                history.append(
                    iteration,
                    HistoryEntry::ToolSelected {
                        name: name.clone(),
                        reason,
                    },
                );
                name
            }
            SelectionOutcome::NoMatch { reason } => {
                tracing::info!(subtask = %subtask, reason = %reason, "no tool fits, creating one");
                let created = self.deps.pipeline.create(subtask).await?;
                self.deps.install_created(&created).await?;
                history.append(
                    iteration,
                    HistoryEntry::ToolCreated {
                        name: created.spec.name.clone(),
                        repair_iterations: created.repair_iterations,
                    },
                );
                created.spec.name
            }
        };

        // Dispatch is total: failures land in the envelope and the
        // history, and the next decision sees them. A failing trusted
        // tool is never rewritten here.
        let result = self.deps.registry.dispatch(&name, params).await;
        if !result.success {
            tracing::warn!(
                name = %name,
                failure = ?result.failure,
                "tool execution failed"
            );
        }
        history.append(iteration, HistoryEntry::ToolExecuted { name, result });
        Ok(())
    }

    async fn decide(
        &self,
        task: &str,
        history: &History,
        goals: &GoalSet,
    ) -> Result<Decision, Error> {
        let system = "You drive an agent that accomplishes tasks with callable \
                      tools. Each turn pick exactly one action: invoke (run a \
                      tool for a subtask, with params), update_goals (restate \
                      the complete goal set), or finish (report the final \
                      answer). Prefer finishing as soon as the history contains \
                      what the task needs.";

        let user = format!(
            "Task: {}\n\nGoals:\n{}\n\nHistory:\n{}",
            task,
            goals.render(),
            if history.is_empty() {
                "(empty)".to_string()
            } else {
                history.render()
            },
        );

        let response = self
            .deps
            .llm
            .complete_structured(
                CompletionRequest::new(Some(system), user),
                "agent_decision",
                &decision_schema(),
            )
            .await
            .map_err(Error::Llm)?;

        serde_json::from_value(response).map_err(|e| {
            Error::Agent(AgentError::DecisionFailed(format!(
                "malformed decision: {}",
                e
            )))
        })
    }
}
