//! Dependency bundle for the agent loop.

use std::sync::Arc;

use crate::config::SandboxConfig;
use crate::create::{CreatedTool, ToolPipeline};
use crate::error::Error;
use crate::index::SimilarityIndex;
use crate::llm::LlmProvider;
use crate::sandbox::LuaSandbox;
use crate::select::TwoPhaseSelector;
use crate::storage::ToolStore;
use crate::tools::{LuaTool, ToolOrigin, ToolRegistry};

/// Everything the agent loop needs, wired once at startup.
#[derive(Clone)]
pub struct AgentDeps {
    pub llm: Arc<dyn LlmProvider>,
    pub registry: Arc<ToolRegistry>,
    pub index: Arc<SimilarityIndex>,
    pub selector: Arc<TwoPhaseSelector>,
    pub pipeline: Arc<ToolPipeline>,
    pub store: Arc<ToolStore>,
    pub sandbox: LuaSandbox,
    pub sandbox_config: SandboxConfig,
}

impl AgentDeps {
    /// Install a freshly created tool: register it, persist it, and
    /// bring the similarity index in sync.
    ///
    /// The tool keeps its `Generated` origin (and sandbox budget) for
    /// the rest of this session; it loads as trusted next session.
    pub async fn install_created(&self, created: &CreatedTool) -> Result<(), Error> {
        let tool = LuaTool::new(
            created.spec.clone(),
            created.code.clone(),
            ToolOrigin::Generated,
            self.sandbox.clone(),
            self.sandbox_config.max_execution_time,
        );
        let descriptor = created.spec.descriptor();

        self.registry
            .register(Arc::new(tool))
            .await
            .map_err(Error::Tool)?;
        self.store
            .store(&created.spec, &created.code, ToolOrigin::Generated)
            .map_err(Error::Storage)?;
        self.index
            .upsert(&created.spec.name, &descriptor)
            .await
            .map_err(Error::Embedding)?;

        tracing::info!(name = %created.spec.name, "tool installed");
        Ok(())
    }

    /// Remove a tool everywhere it lives: storage, index, registry.
    ///
    /// The index entry is removed for real; a deleted tool must not be
    /// retrievable in the next selection round.
    pub async fn remove_tool(&self, name: &str) -> Result<(), Error> {
        self.store.delete(name).map_err(Error::Storage)?;
        if let Err(e) = self.index.delete(name).await {
            // Storage was authoritative; an unindexed tool just means
            // less to clean up.
            tracing::warn!(name = %name, "index entry missing during delete: {}", e);
        }
        self.registry.unregister(name).await;
        tracing::info!(name = %name, "tool removed");
        Ok(())
    }

    /// Build deps over a test harness's stub components.
    #[cfg(test)]
    pub fn for_tests(harness: &crate::testing::TestHarness) -> Self {
        let selector = Arc::new(TwoPhaseSelector::new(
            harness.llm.clone(),
            harness.registry.clone(),
            harness.index.clone(),
            harness.selector_config.clone(),
        ));
        let pipeline = Arc::new(ToolPipeline::new(
            harness.llm.clone(),
            harness.registry.clone(),
            None,
            harness.sandbox.clone(),
            harness.pipeline_config.clone(),
        ));
        Self {
            llm: harness.llm.clone(),
            registry: harness.registry.clone(),
            index: harness.index.clone(),
            selector,
            pipeline,
            store: harness.store.clone(),
            sandbox: harness.sandbox.clone(),
            sandbox_config: SandboxConfig::default(),
        }
    }
}
