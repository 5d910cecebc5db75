//! Two-phase tool selection.
//!
//! Phase one narrows the registry to a handful of candidates by
//! semantic similarity; phase two asks the model to pick one of them
//! (or none) with the full schemas in view. The model's answer is
//! checked against the candidate set, so a hallucinated name can never
//! select a tool.

use std::sync::Arc;

use crate::config::SelectorConfig;
use crate::error::{Error, LlmError};
use crate::index::SimilarityIndex;
use crate::llm::{CompletionRequest, LlmProvider};
use crate::tools::ToolRegistry;

const NO_MATCH: &str = "none";

/// Result of a selection round.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOutcome {
    /// An existing tool fits the task.
    Selected { name: String, reason: String },
    /// Nothing registered fits; the caller may create a new tool.
    NoMatch { reason: String },
}

impl SelectionOutcome {
    pub fn selected_name(&self) -> Option<&str> {
        match self {
            SelectionOutcome::Selected { name, .. } => Some(name),
            SelectionOutcome::NoMatch { .. } => None,
        }
    }
}

/// Selector over the registry and its similarity index.
pub struct TwoPhaseSelector {
    llm: Arc<dyn LlmProvider>,
    registry: Arc<ToolRegistry>,
    index: Arc<SimilarityIndex>,
    config: SelectorConfig,
}

impl TwoPhaseSelector {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        registry: Arc<ToolRegistry>,
        index: Arc<SimilarityIndex>,
        config: SelectorConfig,
    ) -> Self {
        Self {
            llm,
            registry,
            index,
            config,
        }
    }

    /// Select a tool for a task description.
    pub async fn select(&self, task: &str) -> Result<SelectionOutcome, Error> {
        // Phase 1: similarity retrieval. An empty candidate set is a
        // definitive no-match; the model is not consulted. An index that
        // cannot answer at all degrades the same way, so the agent can
        // still create a tool instead of dying on retrieval.
        let candidates = match self
            .index
            .query(task, self.config.top_k, self.config.score_cutoff)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(task = %task, "similarity index unavailable, treating as no match: {}", e);
                return Ok(SelectionOutcome::NoMatch {
                    reason: "similarity index unavailable".to_string(),
                });
            }
        };

        if candidates.is_empty() {
            tracing::debug!(task = %task, "no retrieval candidates within cutoff");
            return Ok(SelectionOutcome::NoMatch {
                reason: "no registered tool is similar to the task".to_string(),
            });
        }

        let candidate_names: Vec<String> = candidates.iter().map(|c| c.name.clone()).collect();

        // Phase 2: the model confirms against full schemas.
        let mut listing = String::new();
        for candidate in &candidates {
            if let Some(tool) = self.registry.get(&candidate.name).await {
                listing.push_str(&format!(
                    "- {} (distance {:.3})\n  schema: {}\n",
                    candidate.name,
                    candidate.distance,
                    serde_json::to_string(&tool.schema()).map_err(LlmError::Json)?,
                ));
            } else {
                // Index entry with no live tool; skip rather than offer
                // something undispatchable.
                tracing::warn!(name = %candidate.name, "index entry has no registered tool");
            }
        }

        if listing.is_empty() {
            return Ok(SelectionOutcome::NoMatch {
                reason: "candidates were stale index entries".to_string(),
            });
        }

        let system = "You match tasks to callable tools. Pick a tool only if it \
                      genuinely accomplishes the task with its declared parameters. \
                      If none fits, answer \"none\".";
        let user = format!(
            "Task: {}\n\nCandidate tools:\n{}\nWhich tool fits the task?",
            task, listing
        );

        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "selected_tool": {
                    "type": "string",
                    "description": "Name of the chosen tool, or \"none\""
                },
                "reason": {"type": "string"}
            },
            "required": ["selected_tool", "reason"]
        });

        let response = self
            .llm
            .complete_structured(
                CompletionRequest::new(Some(system), user),
                "tool_selection",
                &schema,
            )
            .await
            .map_err(Error::Llm)?;

        let selected = response
            .get("selected_tool")
            .and_then(|v| v.as_str())
            .unwrap_or(NO_MATCH)
            .to_string();
        let reason = response
            .get("reason")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        if selected == NO_MATCH || selected.is_empty() {
            return Ok(SelectionOutcome::NoMatch { reason });
        }

        // Hallucination guard: the answer must name a retrieved candidate.
        if !candidate_names.iter().any(|n| n == &selected) {
            tracing::warn!(
                selected = %selected,
                "model chose a tool outside the candidate set, treating as no match"
            );
            return Ok(SelectionOutcome::NoMatch {
                reason: format!("model named unknown tool '{}'", selected),
            });
        }

        Ok(SelectionOutcome::Selected {
            name: selected,
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestHarnessBuilder;
    use crate::tools::builtin::TimeTool;

    async fn selector_with_time_tool() -> (TwoPhaseSelector, crate::testing::TestHarness) {
        let harness = TestHarnessBuilder::new().build();
        let tool: Arc<dyn crate::tools::Tool> = Arc::new(TimeTool);
        harness.registry.register(tool.clone()).await.unwrap();
        harness
            .index
            .upsert(tool.name(), &tool.descriptor())
            .await
            .unwrap();

        let selector = TwoPhaseSelector::new(
            harness.llm.clone(),
            harness.registry.clone(),
            harness.index.clone(),
            SelectorConfig {
                top_k: 5,
                score_cutoff: 2.0,
            },
        );
        (selector, harness)
    }

    #[tokio::test]
    async fn empty_index_is_no_match_without_model_call() {
        let harness = TestHarnessBuilder::new().build();
        let selector = TwoPhaseSelector::new(
            harness.llm.clone(),
            harness.registry.clone(),
            harness.index.clone(),
            SelectorConfig::default(),
        );

        let outcome = selector.select("convert temperatures").await.unwrap();
        assert!(matches!(outcome, SelectionOutcome::NoMatch { .. }));
        assert_eq!(harness.llm.call_count(), 0);
    }

    #[tokio::test]
    async fn model_confirms_candidate() {
        let (selector, harness) = selector_with_time_tool().await;
        harness.llm.push_json(serde_json::json!({
            "selected_tool": "current_time",
            "reason": "task asks for the current time"
        }));

        let outcome = selector.select("what time is it").await.unwrap();
        assert_eq!(outcome.selected_name(), Some("current_time"));
    }

    #[tokio::test]
    async fn model_none_is_no_match() {
        let (selector, harness) = selector_with_time_tool().await;
        harness.llm.push_json(serde_json::json!({
            "selected_tool": "none",
            "reason": "nothing fits"
        }));

        let outcome = selector.select("translate french to german").await.unwrap();
        assert!(matches!(outcome, SelectionOutcome::NoMatch { .. }));
    }

    #[tokio::test]
    async fn hallucinated_name_is_rejected() {
        let (selector, harness) = selector_with_time_tool().await;
        harness.llm.push_json(serde_json::json!({
            "selected_tool": "imaginary_tool",
            "reason": "sounds right"
        }));

        let outcome = selector.select("what time is it").await.unwrap();
        assert!(matches!(outcome, SelectionOutcome::NoMatch { .. }));
    }

    #[tokio::test]
    async fn gateway_failure_propagates() {
        let (selector, harness) = selector_with_time_tool().await;
        harness.llm.push_error();

        let err = selector.select("what time is it").await.unwrap_err();
        assert!(matches!(err, Error::Llm(_)));
    }

    #[tokio::test]
    async fn unreachable_index_degrades_to_no_match() {
        struct UnreachableEmbeddings;

        #[async_trait::async_trait]
        impl crate::embeddings::EmbeddingProvider for UnreachableEmbeddings {
            fn dimension(&self) -> usize {
                64
            }
            fn model_name(&self) -> &str {
                "unreachable"
            }
            fn max_input_length(&self) -> usize {
                10_000
            }
            async fn embed(&self, _text: &str) -> Result<Vec<f32>, crate::error::EmbeddingError> {
                Err(crate::error::EmbeddingError::Http(
                    "connection refused".to_string(),
                ))
            }
        }

        let harness = TestHarnessBuilder::new().build();
        let index = Arc::new(SimilarityIndex::new(Arc::new(UnreachableEmbeddings)));
        let selector = TwoPhaseSelector::new(
            harness.llm.clone(),
            harness.registry.clone(),
            index,
            SelectorConfig::default(),
        );

        let outcome = selector.select("convert temperatures").await.unwrap();
        assert!(matches!(outcome, SelectionOutcome::NoMatch { .. }));
        // Retrieval never produced candidates, so the model is not asked.
        assert_eq!(harness.llm.call_count(), 0);
    }
}
