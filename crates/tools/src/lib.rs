use std::sync::Arc;

use memsys_embed::EmbedGateway;
use memsys_pipeline::AutoCapture;
use memsys_store::{GraphStore, SlotStore};
use memsys_vector::VectorGateway;

pub mod capture;
pub mod error;
pub mod graph;
pub mod memory;
pub mod registry;
pub mod slots;

pub use capture::MemoryAutoCaptureTool;
pub use error::MemoryError;
pub use graph::{
    MemoryGraphEntityGetTool, MemoryGraphEntitySetTool, MemoryGraphRelAddTool, MemoryGraphRelRemoveTool, MemoryGraphSearchTool,
};
pub use memory::{MemorySearchTool, MemoryStoreTool};
pub use registry::{Tool, ToolContext, ToolDetails, ToolOutput, ToolParam, ToolRegistry, ToolSpec};
pub use slots::{MemorySlotDeleteTool, MemorySlotGetTool, MemorySlotListTool, MemorySlotSetTool};

/// Shared handles every built-in tool is wired against.
pub struct MemoryComponents {
    pub slots: Arc<SlotStore>,
    pub graph: Arc<GraphStore>,
    pub vector: Arc<VectorGateway>,
    pub embed: Arc<EmbedGateway>,
    pub auto_capture: Arc<AutoCapture>,
}

/// Build the full registry of the 12 tools in §6's External Interfaces table.
pub fn build_registry(components: &MemoryComponents) -> ToolRegistry {
    let mut registry = ToolRegistry::default();

    registry.register(Box::new(MemorySlotGetTool { store: components.slots.clone() }));
    registry.register(Box::new(MemorySlotSetTool { store: components.slots.clone() }));
    registry.register(Box::new(MemorySlotListTool { store: components.slots.clone() }));
    registry.register(Box::new(MemorySlotDeleteTool { store: components.slots.clone() }));

    registry.register(Box::new(MemoryGraphEntityGetTool { graph: components.graph.clone() }));
    registry.register(Box::new(MemoryGraphEntitySetTool { graph: components.graph.clone() }));
    registry.register(Box::new(MemoryGraphRelAddTool { graph: components.graph.clone() }));
    registry.register(Box::new(MemoryGraphRelRemoveTool { graph: components.graph.clone() }));
    registry.register(Box::new(MemoryGraphSearchTool { graph: components.graph.clone() }));

    registry.register(Box::new(MemorySearchTool { vector: components.vector.clone(), embed: components.embed.clone() }));
    registry.register(Box::new(MemoryStoreTool { vector: components.vector.clone(), embed: components.embed.clone() }));

    registry.register(Box::new(MemoryAutoCaptureTool { auto_capture: components.auto_capture.clone() }));

    registry
}

#[cfg(test)]
mod lib_tests {
    use super::*;
    use memsys_embed::EmbedGateway;
    use memsys_llm::{LlmClient, LlmExtractor};
    use memsys_pipeline::ContextWindowConfig;
    use memsys_store::StoreHandle;
    use memsys_vector::RetryPolicy;
    use tempfile::TempDir;

    #[test]
    fn registry_builder_registers_all_twelve_tools() {
        let dir = TempDir::new().unwrap();
        let handle = StoreHandle::open(dir.path().join("mem.redb")).unwrap();
        let slots = Arc::new(SlotStore::new(handle.clone()).unwrap());
        let graph = Arc::new(GraphStore::new(handle).unwrap());
        let vector = Arc::new(VectorGateway::new("http://127.0.0.1:6334", "memories", 384, RetryPolicy::default()).unwrap());
        let embed = Arc::new(EmbedGateway::new("http://127.0.0.1:11434", "nomic-embed-text", 384));
        let extractor = Arc::new(LlmExtractor::new(
            LlmClient::new("http://127.0.0.1:1", "", "local"),
            0.7,
            vec!["profile".into()],
            vec!["agent_decisions".into()],
        ));
        let auto_capture = Arc::new(AutoCapture::new(
            slots.clone(),
            vector.clone(),
            embed.clone(),
            extractor,
            ContextWindowConfig::default(),
        ));

        let components = MemoryComponents { slots, graph, vector, embed, auto_capture };
        let registry = build_registry(&components);
        assert_eq!(registry.list_specs().len(), 12);
    }
}
