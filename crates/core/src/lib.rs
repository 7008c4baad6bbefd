//! Top-level wiring for the agent memory subsystem: loads configuration,
//! opens the structured store, builds the vector/embed/LLM gateways, and
//! assembles the AutoCapture/AutoRecall hooks and tool registry a host
//! embeds.

pub mod events;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use memsys_config::AppConfig;
use memsys_embed::EmbedGateway;
use memsys_llm::{LlmClient, LlmExtractor};
use memsys_pipeline::{AutoCapture, AutoCaptureEvent, AutoRecall, ContextWindowConfig, KNOWN_NAMESPACES};
use memsys_store::{GraphStore, SlotStore, StoreHandle};
use memsys_tools::{MemoryComponents, ToolRegistry};
use memsys_vector::{RetryPolicy, VectorGateway};

pub use events::{AgentEnd, BeforeAgentStart};

pub struct MemorySystem {
    pub slots: Arc<SlotStore>,
    pub graph: Arc<GraphStore>,
    pub vector: Arc<VectorGateway>,
    pub embed: Arc<EmbedGateway>,
    auto_capture: Arc<AutoCapture>,
    auto_capture_enabled: bool,
    auto_recall: AutoRecall,
    pub tools: ToolRegistry,
}

impl MemorySystem {
    /// Open the on-disk store at `state_dir/memory.redb` and wire every
    /// component per `config` (§5, §6 "Configuration").
    pub fn new(config: &AppConfig, state_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let handle = StoreHandle::open(state_dir.as_ref().join("memory.redb"))?;
        let slots = Arc::new(SlotStore::new(handle.clone())?);
        let graph = Arc::new(GraphStore::new(handle)?);

        let vector_url = format!("http://{}:{}", config.vector.host, config.vector.port);
        let retry = RetryPolicy {
            max_retries: config.vector.max_retries,
            base_delay: Duration::from_millis(config.vector.base_backoff_ms),
            max_delay: Duration::from_millis(config.vector.max_backoff_ms),
        };
        let vector = Arc::new(VectorGateway::new(
            &vector_url,
            config.vector.collection.clone(),
            config.vector.vector_size as u64,
            retry,
        )?);

        let embed = Arc::new(EmbedGateway::new(
            config.embedder.base_url.clone(),
            config.embedder.model.clone(),
            config.embedder.dimensions,
        ));

        let llm_client = LlmClient::new(config.llm.base_url.clone(), config.llm.api_key.clone(), config.llm.model.clone());
        let extractor = Arc::new(LlmExtractor::new(
            llm_client,
            config.llm.min_confidence,
            config.slots.categories.clone(),
            KNOWN_NAMESPACES.iter().map(|s| s.to_string()).collect(),
        ));

        let context_config = ContextWindowConfig {
            max_conversation_tokens: config.context_window.max_conversation_tokens,
            absolute_max_messages: config.context_window.absolute_max_messages,
            token_estimate_divisor: config.context_window.token_estimate_divisor,
        };
        let auto_capture = Arc::new(AutoCapture::new(slots.clone(), vector.clone(), embed.clone(), extractor, context_config));
        let auto_recall = AutoRecall::new(slots.clone(), graph.clone(), vector.clone(), embed.clone());

        let tools = memsys_tools::build_registry(&MemoryComponents {
            slots: slots.clone(),
            graph: graph.clone(),
            vector: vector.clone(),
            embed: embed.clone(),
            auto_capture: auto_capture.clone(),
        });

        Ok(Self {
            slots,
            graph,
            vector,
            embed,
            auto_capture,
            auto_capture_enabled: config.auto_capture.enabled,
            auto_recall,
            tools,
        })
    }

    /// Handle `before_agent_start`: inject the recall context block into the
    /// system prompt, returning the overridden prompt for the host to use.
    pub async fn before_agent_start(&self, event: &BeforeAgentStart) -> String {
        self.auto_recall.inject(&event.user, &event.agent, &event.system_prompt, &event.messages).await
    }

    /// Handle `agent_end`: run extraction on the turn's messages. Never
    /// raises into the host (§4.9, §7).
    pub async fn agent_end(&self, event: AgentEnd) {
        if !self.auto_capture_enabled {
            return;
        }
        let capture_event = AutoCaptureEvent {
            session_id: event.session_id,
            agent: event.agent,
            messages: event.messages,
        };
        if let Some(outcome) = self.auto_capture.run(capture_event).await {
            tracing::info!(
                slots_updated = outcome.slots_updated,
                slots_removed = outcome.slots_removed,
                memories_stored = outcome.memories_stored,
                "auto-capture completed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memsys_pipeline::{Content, Role};
    use tempfile::TempDir;

    fn test_system() -> (TempDir, MemorySystem) {
        let dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.vector.host = "127.0.0.1".into();
        config.vector.port = 1;
        config.llm.base_url = "http://127.0.0.1:1".into();
        config.embedder.base_url = "http://127.0.0.1:1".into();
        let system = MemorySystem::new(&config, dir.path()).unwrap();
        (dir, system)
    }

    #[test]
    fn wires_all_twelve_tools() {
        let (_dir, system) = test_system();
        assert_eq!(system.tools.list_specs().len(), 12);
    }

    #[tokio::test]
    async fn before_agent_start_returns_prompt_unchanged_when_no_memory() {
        let (_dir, system) = test_system();
        let event = BeforeAgentStart {
            user: "default".into(),
            agent: "assistant".into(),
            system_prompt: "<system>base</system>".into(),
            messages: vec![memsys_pipeline::Message { role: Role::User, content: Content::Text("hi".into()) }],
        };
        let prompt = system.before_agent_start(&event).await;
        assert_eq!(prompt, "<system>base</system>");
    }

    #[tokio::test]
    async fn agent_end_does_not_panic_when_llm_unreachable() {
        let (_dir, system) = test_system();
        let event = AgentEnd {
            session_id: "default".into(),
            agent: "assistant".into(),
            messages: vec![memsys_pipeline::Message { role: Role::User, content: Content::Text("remember I like tea".into()) }],
        };
        system.agent_end(event).await;
    }
}
