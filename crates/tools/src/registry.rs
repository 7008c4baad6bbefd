//! Tool trait and registry (§6 External interfaces).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::MemoryError;

/// Describes a single parameter that a tool accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParam {
    pub name: String,
    pub description: String,
    pub required: bool,
}

/// Static metadata about a tool, used by the host to decide which tool to
/// call and how to validate its arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub params: Vec<ToolParam>,
}

/// Structured `details` payload alongside a tool's one-line summary (§6).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ToolDetails {
    Slot(Value),
    Graph(Value),
    Search(Value),
    Store(Value),
    Capture(Value),
    Error(Value),
}

/// The result returned after a tool runs.
#[derive(Debug, Clone, Serialize)]
pub struct ToolOutput {
    pub summary: String,
    pub details: ToolDetails,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(summary: impl Into<String>, details: ToolDetails) -> Self {
        Self {
            summary: summary.into(),
            details,
            is_error: false,
        }
    }

    pub fn error(err: &MemoryError) -> Self {
        Self {
            summary: err.to_string(),
            details: ToolDetails::Error(serde_json::json!({ "kind": err.kind() })),
            is_error: true,
        }
    }
}

/// Ambient session identity a tool call runs under. Supplied by the host,
/// never by the caller's own arguments (§5).
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub user: String,
    pub agent: String,
}

/// Trait implemented by every memory tool.
#[async_trait]
pub trait Tool: Send + Sync {
    fn spec(&self) -> ToolSpec;
    async fn run(&self, ctx: &ToolContext, args: &Value) -> ToolOutput;
}

/// Central registry for all available tools.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn list_specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.iter().find(|t| t.spec().name == name).map(|t| t.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DummyTool {
        name: String,
    }

    #[async_trait]
    impl Tool for DummyTool {
        fn spec(&self) -> ToolSpec {
            ToolSpec {
                name: self.name.clone(),
                description: format!("Dummy tool: {}", self.name),
                params: vec![ToolParam {
                    name: "input".to_string(),
                    description: "test param".to_string(),
                    required: true,
                }],
            }
        }

        async fn run(&self, _ctx: &ToolContext, _args: &Value) -> ToolOutput {
            ToolOutput::ok(format!("ran {}", self.name), ToolDetails::Slot(Value::Null))
        }
    }

    fn ctx() -> ToolContext {
        ToolContext {
            user: "default".into(),
            agent: "assistant".into(),
        }
    }

    #[test]
    fn empty_registry() {
        let reg = ToolRegistry::default();
        assert!(reg.list_specs().is_empty());
        assert!(reg.get("anything").is_none());
    }

    #[test]
    fn register_and_get() {
        let mut reg = ToolRegistry::default();
        reg.register(Box::new(DummyTool { name: "alpha".into() }));
        reg.register(Box::new(DummyTool { name: "beta".into() }));

        assert!(reg.get("alpha").is_some());
        assert!(reg.get("beta").is_some());
        assert!(reg.get("gamma").is_none());
    }

    #[tokio::test]
    async fn run_registered_tool() {
        let mut reg = ToolRegistry::default();
        reg.register(Box::new(DummyTool { name: "runner".into() }));

        let tool = reg.get("runner").unwrap();
        let result = tool.run(&ctx(), &Value::Null).await;
        assert!(!result.is_error);
        assert_eq!(result.summary, "ran runner");
    }

    /// Duplicate registration: the first tool wins on `get` (Vec + find).
    #[test]
    fn duplicate_name_get_returns_first_registered() {
        let mut reg = ToolRegistry::default();
        reg.register(Box::new(DummyTool { name: "dup".into() }));
        reg.register(Box::new(DummyTool { name: "dup".into() }));

        let specs = reg.list_specs();
        assert_eq!(specs.iter().filter(|s| s.name == "dup").count(), 2);
        assert!(reg.get("dup").is_some());
    }
}
