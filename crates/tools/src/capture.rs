//! `memory_auto_capture`: explicit, tool-triggered invocation of the same
//! extraction pipeline AutoCapture runs automatically on `agent_end` (§6).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use memsys_pipeline::{AutoCapture, AutoCaptureEvent, Content, Message, Role};

use crate::error::MemoryError;
use crate::registry::{Tool, ToolContext, ToolDetails, ToolOutput, ToolParam, ToolSpec};

pub struct MemoryAutoCaptureTool {
    pub auto_capture: Arc<AutoCapture>,
}

#[async_trait]
impl Tool for MemoryAutoCaptureTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "memory_auto_capture".into(),
            description: "Mine a block of text for slot updates and memories using the extraction pipeline.".into(),
            params: vec![
                ToolParam { name: "text".into(), description: "text to mine".into(), required: true },
                ToolParam {
                    name: "use_llm".into(),
                    description: "reserved; extraction always uses the configured extractor".into(),
                    required: false,
                },
            ],
        }
    }

    async fn run(&self, ctx: &ToolContext, args: &Value) -> ToolOutput {
        let Some(text) = args.get("text").and_then(Value::as_str) else {
            return ToolOutput::error(&MemoryError::Validation("text is required".into()));
        };

        let event = AutoCaptureEvent {
            session_id: ctx.user.clone(),
            agent: ctx.agent.clone(),
            messages: vec![Message { role: Role::User, content: Content::Text(text.to_string()) }],
        };

        match self.auto_capture.run(event).await {
            Some(outcome) => ToolOutput::ok(
                format!(
                    "extracted {} slot update(s), {} removal(s), {} memory(ies)",
                    outcome.slots_updated, outcome.slots_removed, outcome.memories_stored
                ),
                ToolDetails::Capture(serde_json::json!({
                    "slots_updated": outcome.slots_updated,
                    "slots_removed": outcome.slots_removed,
                    "memories_stored": outcome.memories_stored,
                })),
            ),
            None => ToolOutput::ok("auto-capture skipped (noise, blocked agent, or already running)", ToolDetails::Capture(Value::Null)),
        }
    }
}
