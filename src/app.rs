//! Application wiring.
//!
//! `App::bootstrap` assembles every component from configuration and
//! rebuilds session state: built-ins registered, stored tools loaded
//! as trusted, the similarity index rebuilt from durable storage, and
//! documentation passages indexed when configured.

use std::sync::Arc;

use crate::agent::{Agent, AgentDeps, AgentOutcome};
use crate::config::Config;
use crate::create::ToolPipeline;
use crate::embeddings::create_embedding_provider;
use crate::error::{Error, Result};
use crate::index::docs::DocsIndex;
use crate::index::SimilarityIndex;
use crate::llm::create_llm_provider;
use crate::sandbox::LuaSandbox;
use crate::select::TwoPhaseSelector;
use crate::storage::ToolStore;
use crate::tools::{builtin, LuaTool, ToolOrigin, ToolRegistry, ToolSchema};

/// The assembled engine.
pub struct App {
    pub deps: AgentDeps,
    pub config: Config,
}

impl App {
    /// Build every component and rebuild session state from storage.
    pub async fn bootstrap(config: Config) -> Result<Self> {
        let llm = create_llm_provider(&config.llm)?;
        let embeddings = create_embedding_provider(&config.embeddings)?;

        let registry = Arc::new(ToolRegistry::new());
        let index = Arc::new(SimilarityIndex::new(embeddings.clone()));
        let sandbox = LuaSandbox::new(config.sandbox.clone());
        let store = Arc::new(ToolStore::new(config.storage.storage_root.clone())?);

        builtin::register_builtin_tools(&registry).await?;

        // Stored tools load as trusted with the longer budget. Their
        // code already survived validation and a prior session. On a
        // name collision durable storage wins: re-registration
        // overwrites, it does not version.
        let stored = store.load_all()?;
        let mut indexed: Vec<(String, String)> = Vec::new();
        for tool in &stored {
            let lua_tool = LuaTool::new(
                tool.spec.clone(),
                tool.code.clone(),
                ToolOrigin::Stored,
                sandbox.clone(),
                config.sandbox.trusted_execution_time,
            );
            indexed.push((tool.spec.name.clone(), tool.spec.descriptor()));
            registry.register_overwrite(Arc::new(lua_tool)).await;
        }
        tracing::info!(count = stored.len(), "stored tools loaded");

        // Index built-ins and stored tools together.
        for name in registry.list().await {
            if let Some(tool) = registry.get(&name).await {
                if tool.origin() == ToolOrigin::Builtin {
                    indexed.push((name, tool.descriptor()));
                }
            }
        }
        index.upsert_batch(&indexed).await.map_err(Error::Embedding)?;

        let docs = match &config.storage.docs_dir {
            Some(dir) => load_docs(embeddings.clone(), dir).await,
            None => None,
        };

        let selector = Arc::new(TwoPhaseSelector::new(
            llm.clone(),
            registry.clone(),
            index.clone(),
            config.selector.clone(),
        ));
        let pipeline = Arc::new(ToolPipeline::new(
            llm.clone(),
            registry.clone(),
            docs,
            sandbox.clone(),
            config.pipeline.clone(),
        ));

        let deps = AgentDeps {
            llm,
            registry,
            index,
            selector,
            pipeline,
            store,
            sandbox,
            sandbox_config: config.sandbox.clone(),
        };

        Ok(Self { deps, config })
    }

    /// Run one task through the agent loop.
    pub async fn run_task(&self, task: &str) -> Result<AgentOutcome> {
        let agent = Agent::new(self.deps.clone(), self.config.agent.clone());
        agent.run(task).await
    }

    /// Names of every registered tool.
    pub async fn list_tools(&self) -> Vec<String> {
        self.deps.registry.list().await
    }

    /// Schema of one registered tool.
    pub async fn tool_schema(&self, name: &str) -> Option<ToolSchema> {
        self.deps.registry.get(name).await.map(|t| t.schema())
    }

    /// Delete a tool from storage, the index, and the registry.
    pub async fn delete_tool(&self, name: &str) -> Result<()> {
        self.deps.remove_tool(name).await
    }
}

/// Load the documentation index from a configured directory.
///
/// A directory that is missing or unreadable only costs codegen its
/// reference passages; the engine still starts, without docs.
async fn load_docs(
    embeddings: Arc<dyn crate::embeddings::EmbeddingProvider>,
    dir: &std::path::Path,
) -> Option<Arc<DocsIndex>> {
    let docs = DocsIndex::new(embeddings);
    match docs.load_dir(dir).await {
        Ok(_) => Some(Arc::new(docs)),
        Err(e) => {
            tracing::warn!(
                dir = %dir.display(),
                "documentation unavailable, continuing without it: {}",
                e
            );
            None
        }
    }
}
