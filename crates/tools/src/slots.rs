//! `memory_slot_get`, `memory_slot_set`, `memory_slot_list`, `memory_slot_delete`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use memsys_scope::{ScopeKey, ScopeTier};
use memsys_store::{ListFilter, SetSlot, SlotSource, SlotStore};

use crate::error::MemoryError;
use crate::registry::{Tool, ToolContext, ToolDetails, ToolOutput, ToolParam, ToolSpec};

/// `scope?` accepts `private|team|public|all`; `all` merges every tier.
fn parse_scopes(ctx: &ToolContext, raw: Option<&str>) -> Vec<ScopeKey> {
    match raw {
        Some("all") | None => ScopeTier::merge_order()
            .into_iter()
            .map(|tier| ScopeKey::resolve(&ctx.user, &ctx.agent, tier))
            .collect(),
        Some(other) => match other.parse::<ScopeTier>() {
            Ok(tier) => vec![ScopeKey::resolve(&ctx.user, &ctx.agent, tier)],
            Err(_) => vec![ScopeKey::resolve(&ctx.user, &ctx.agent, ScopeTier::Private)],
        },
    }
}

pub struct MemorySlotGetTool {
    pub store: Arc<SlotStore>,
}

#[async_trait]
impl Tool for MemorySlotGetTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "memory_slot_get".into(),
            description: "Read a single slot by key, or list slots in a category/scope.".into(),
            params: vec![
                ToolParam { name: "key".into(), description: "exact slot key".into(), required: false },
                ToolParam { name: "category".into(), description: "slot category filter".into(), required: false },
                ToolParam {
                    name: "scope".into(),
                    description: "private|team|public|all".into(),
                    required: false,
                },
            ],
        }
    }

    async fn run(&self, ctx: &ToolContext, args: &Value) -> ToolOutput {
        let key = args.get("key").and_then(Value::as_str);
        let category = args.get("category").and_then(Value::as_str);
        let scope_arg = args.get("scope").and_then(Value::as_str);
        let scopes = parse_scopes(ctx, scope_arg);

        let mut results = Vec::new();
        for scope in &scopes {
            let slots = if let Some(key) = key {
                match self.store.get(scope, key) {
                    Ok(Some(slot)) => vec![slot],
                    Ok(None) => continue,
                    Err(err) => return ToolOutput::error(&err.into()),
                }
            } else if let Some(category) = category {
                match self.store.get_by_category(scope, category) {
                    Ok(slots) => slots,
                    Err(err) => return ToolOutput::error(&err.into()),
                }
            } else {
                match self.store.all(scope) {
                    Ok(slots) => slots,
                    Err(err) => return ToolOutput::error(&err.into()),
                }
            };
            for slot in slots {
                results.push(serde_json::json!({
                    "scope": scope.tier().label(),
                    "key": slot.key,
                    "category": slot.category,
                    "value": slot.value,
                    "version": slot.version,
                }));
            }
        }

        let summary = if results.is_empty() {
            "no matching slots".to_string()
        } else {
            format!("{} slot(s) found", results.len())
        };
        ToolOutput::ok(summary, ToolDetails::Slot(Value::Array(results)))
    }
}

pub struct MemorySlotSetTool {
    pub store: Arc<SlotStore>,
}

#[async_trait]
impl Tool for MemorySlotSetTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "memory_slot_set".into(),
            description: "Create or update a slot value.".into(),
            params: vec![
                ToolParam { name: "key".into(), description: "slot key".into(), required: true },
                ToolParam { name: "value".into(), description: "slot value (any JSON)".into(), required: true },
                ToolParam { name: "category".into(), description: "slot category".into(), required: false },
                ToolParam { name: "source".into(), description: "auto_capture|manual|tool".into(), required: false },
                ToolParam {
                    name: "scope".into(),
                    description: "private|team|public (default private)".into(),
                    required: false,
                },
            ],
        }
    }

    async fn run(&self, ctx: &ToolContext, args: &Value) -> ToolOutput {
        let Some(key) = args.get("key").and_then(Value::as_str) else {
            return ToolOutput::error(&MemoryError::Validation("key is required".into()));
        };
        let Some(value) = args.get("value").cloned() else {
            return ToolOutput::error(&MemoryError::Validation("value is required".into()));
        };
        let category = args.get("category").and_then(Value::as_str).map(str::to_string);
        let source = match args.get("source").and_then(Value::as_str) {
            Some("auto_capture") => SlotSource::AutoCapture,
            Some("tool") => SlotSource::Tool,
            _ => SlotSource::Manual,
        };
        let tier = args
            .get("scope")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<ScopeTier>().ok())
            .unwrap_or(ScopeTier::Private);
        let scope = ScopeKey::resolve(&ctx.user, &ctx.agent, tier);

        let result = self.store.set(
            &scope,
            SetSlot {
                key: key.to_string(),
                value,
                category,
                source: Some(source),
                confidence: None,
                expires_at: None,
            },
        );
        match result {
            Ok(slot) => ToolOutput::ok(
                format!("slot '{}' set to version {}", slot.key, slot.version),
                ToolDetails::Slot(serde_json::json!({
                    "key": slot.key,
                    "category": slot.category,
                    "version": slot.version,
                    "scope": scope.tier().label(),
                })),
            ),
            Err(err) => ToolOutput::error(&err.into()),
        }
    }
}

pub struct MemorySlotListTool {
    pub store: Arc<SlotStore>,
}

#[async_trait]
impl Tool for MemorySlotListTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "memory_slot_list".into(),
            description: "List slots grouped by scope, optionally filtered by category/prefix.".into(),
            params: vec![
                ToolParam { name: "category".into(), description: "category filter".into(), required: false },
                ToolParam { name: "prefix".into(), description: "key prefix filter".into(), required: false },
                ToolParam {
                    name: "scope".into(),
                    description: "private|team|public|all".into(),
                    required: false,
                },
            ],
        }
    }

    async fn run(&self, ctx: &ToolContext, args: &Value) -> ToolOutput {
        let filter = ListFilter {
            category: args.get("category").and_then(Value::as_str).map(str::to_string),
            prefix: args.get("prefix").and_then(Value::as_str).map(str::to_string),
        };
        let scope_arg = args.get("scope").and_then(Value::as_str);
        let scopes = parse_scopes(ctx, scope_arg);

        let mut grouped = serde_json::Map::new();
        for scope in &scopes {
            let slots = match self.store.list(scope, filter.clone()) {
                Ok(slots) => slots,
                Err(err) => return ToolOutput::error(&err.into()),
            };
            let entries: Vec<Value> = slots
                .into_iter()
                .map(|s| serde_json::json!({ "key": s.key, "category": s.category, "value": s.value }))
                .collect();
            grouped.insert(scope.tier().label().to_string(), Value::Array(entries));
        }

        let total: usize = grouped.values().filter_map(|v| v.as_array()).map(|a| a.len()).sum();
        ToolOutput::ok(format!("{total} slot(s) across {} scope(s)", grouped.len()), ToolDetails::Slot(Value::Object(grouped)))
    }
}

pub struct MemorySlotDeleteTool {
    pub store: Arc<SlotStore>,
}

#[async_trait]
impl Tool for MemorySlotDeleteTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "memory_slot_delete".into(),
            description: "Delete a slot by key.".into(),
            params: vec![
                ToolParam { name: "key".into(), description: "slot key".into(), required: true },
                ToolParam {
                    name: "scope".into(),
                    description: "private|team|public (default private)".into(),
                    required: false,
                },
            ],
        }
    }

    async fn run(&self, ctx: &ToolContext, args: &Value) -> ToolOutput {
        let Some(key) = args.get("key").and_then(Value::as_str) else {
            return ToolOutput::error(&MemoryError::Validation("key is required".into()));
        };
        let tier = args
            .get("scope")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<ScopeTier>().ok())
            .unwrap_or(ScopeTier::Private);
        let scope = ScopeKey::resolve(&ctx.user, &ctx.agent, tier);

        match self.store.delete(&scope, key) {
            Ok(removed) => ToolOutput::ok(
                if removed { "slot deleted" } else { "slot not found" },
                ToolDetails::Slot(Value::Bool(removed)),
            ),
            Err(err) => ToolOutput::error(&err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memsys_store::{SetSlot, StoreHandle};
    use tempfile::TempDir;

    fn ctx() -> ToolContext {
        ToolContext { user: "default".into(), agent: "assistant".into() }
    }

    fn store() -> (TempDir, Arc<SlotStore>) {
        let dir = TempDir::new().unwrap();
        let handle = StoreHandle::open(dir.path().join("mem.redb")).unwrap();
        (dir, Arc::new(SlotStore::new(handle).unwrap()))
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let (_dir, store) = store();
        let set_tool = MemorySlotSetTool { store: store.clone() };
        let get_tool = MemorySlotGetTool { store: store.clone() };

        let set_result = set_tool
            .run(&ctx(), &serde_json::json!({ "key": "name", "value": "Ada" }))
            .await;
        assert!(!set_result.is_error);

        let get_result = get_tool.run(&ctx(), &serde_json::json!({ "key": "name" })).await;
        assert!(!get_result.is_error);
        assert!(get_result.summary.contains('1'));
    }

    #[tokio::test]
    async fn set_requires_key_and_value() {
        let (_dir, store) = store();
        let tool = MemorySlotSetTool { store };
        let result = tool.run(&ctx(), &serde_json::json!({ "value": "x" })).await;
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn delete_reports_false_when_missing() {
        let (_dir, store) = store();
        let tool = MemorySlotDeleteTool { store };
        let result = tool.run(&ctx(), &serde_json::json!({ "key": "ghost" })).await;
        assert!(!result.is_error);
        assert_eq!(result.summary, "slot not found");
    }

    #[tokio::test]
    async fn list_groups_by_scope() {
        let (_dir, store) = store();
        store
            .set(
                &ScopeKey::resolve("default", "assistant", ScopeTier::Private),
                SetSlot {
                    key: "k".into(),
                    value: serde_json::json!("v"),
                    category: None,
                    source: None,
                    confidence: None,
                    expires_at: None,
                },
            )
            .unwrap();
        let tool = MemorySlotListTool { store };
        let result = tool.run(&ctx(), &serde_json::json!({ "scope": "private" })).await;
        assert!(!result.is_error);
        assert!(result.summary.starts_with('1'));
    }
}
