//! `memory_graph_entity_get`, `memory_graph_entity_set`, `memory_graph_rel_add`,
//! `memory_graph_rel_remove`, `memory_graph_search`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use memsys_scope::{ScopeKey, ScopeTier};
use memsys_store::{Entity, EntityFilter, GraphStore, Relationship};

use crate::error::MemoryError;
use crate::registry::{Tool, ToolContext, ToolDetails, ToolOutput, ToolParam, ToolSpec};

const MAX_SEARCH_DEPTH: usize = 3;
const DEFAULT_SEARCH_DEPTH: usize = 2;

fn entity_json(e: &Entity) -> Value {
    serde_json::json!({
        "id": e.id,
        "name": e.name,
        "type": e.entity_type,
        "properties": e.properties,
    })
}

fn relationship_json(r: &Relationship) -> Value {
    serde_json::json!({
        "id": r.id,
        "source_id": r.source_id,
        "target_id": r.target_id,
        "relation_type": r.relation_type,
        "weight": r.weight,
        "properties": r.properties,
    })
}

fn parse_uuid(args: &Value, field: &str) -> Option<Uuid> {
    args.get(field).and_then(Value::as_str).and_then(|s| Uuid::parse_str(s).ok())
}

pub struct MemoryGraphEntityGetTool {
    pub graph: Arc<GraphStore>,
}

#[async_trait]
impl Tool for MemoryGraphEntityGetTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "memory_graph_entity_get".into(),
            description: "Fetch an entity by id, or filter entities by type/name.".into(),
            params: vec![
                ToolParam { name: "id".into(), description: "entity id".into(), required: false },
                ToolParam { name: "type".into(), description: "entity type filter".into(), required: false },
                ToolParam { name: "name".into(), description: "name substring filter".into(), required: false },
            ],
        }
    }

    async fn run(&self, ctx: &ToolContext, args: &Value) -> ToolOutput {
        let scope = ScopeKey::resolve(&ctx.user, &ctx.agent, ScopeTier::Private);

        if let Some(id) = parse_uuid(args, "id") {
            return match self.graph.get_entity(&scope, id) {
                Ok(Some(entity)) => ToolOutput::ok("entity found", ToolDetails::Graph(entity_json(&entity))),
                Ok(None) => ToolOutput::ok("entity not found", ToolDetails::Graph(Value::Null)),
                Err(err) => ToolOutput::error(&err.into()),
            };
        }

        let filter = EntityFilter {
            entity_type: args.get("type").and_then(Value::as_str).map(str::to_string),
            name_substring: args.get("name").and_then(Value::as_str).map(str::to_string),
        };
        match self.graph.list_entities(&scope, filter) {
            Ok(entities) => {
                let summary = format!("{} entities found", entities.len());
                let list = entities.iter().map(entity_json).collect::<Vec<_>>();
                ToolOutput::ok(summary, ToolDetails::Graph(Value::Array(list)))
            }
            Err(err) => ToolOutput::error(&err.into()),
        }
    }
}

pub struct MemoryGraphEntitySetTool {
    pub graph: Arc<GraphStore>,
}

#[async_trait]
impl Tool for MemoryGraphEntitySetTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "memory_graph_entity_set".into(),
            description: "Create an entity, or update one by id.".into(),
            params: vec![
                ToolParam { name: "id".into(), description: "existing entity id to update".into(), required: false },
                ToolParam { name: "name".into(), description: "entity name".into(), required: true },
                ToolParam { name: "type".into(), description: "entity type".into(), required: true },
                ToolParam { name: "properties".into(), description: "arbitrary JSON properties".into(), required: false },
            ],
        }
    }

    async fn run(&self, ctx: &ToolContext, args: &Value) -> ToolOutput {
        let Some(name) = args.get("name").and_then(Value::as_str) else {
            return ToolOutput::error(&MemoryError::Validation("name is required".into()));
        };
        let Some(entity_type) = args.get("type").and_then(Value::as_str) else {
            return ToolOutput::error(&MemoryError::Validation("type is required".into()));
        };
        let properties = args.get("properties").cloned().unwrap_or(Value::Null);
        let scope = ScopeKey::resolve(&ctx.user, &ctx.agent, ScopeTier::Private);

        let result = if let Some(id) = parse_uuid(args, "id") {
            self.graph
                .update_entity(&scope, id, Some(name.to_string()), Some(entity_type.to_string()), Some(properties))
                .and_then(|updated| updated.ok_or(memsys_store::StoreError::NotFound))
        } else {
            self.graph.create_entity(&scope, name.to_string(), entity_type.to_string(), properties)
        };

        match result {
            Ok(entity) => ToolOutput::ok("entity saved", ToolDetails::Graph(entity_json(&entity))),
            Err(err) => ToolOutput::error(&err.into()),
        }
    }
}

pub struct MemoryGraphRelAddTool {
    pub graph: Arc<GraphStore>,
}

#[async_trait]
impl Tool for MemoryGraphRelAddTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "memory_graph_rel_add".into(),
            description: "Create or update a weighted relationship between two entities.".into(),
            params: vec![
                ToolParam { name: "source_id".into(), description: "source entity id".into(), required: true },
                ToolParam { name: "target_id".into(), description: "target entity id".into(), required: true },
                ToolParam { name: "relation_type".into(), description: "relationship label".into(), required: true },
                ToolParam { name: "weight".into(), description: "edge weight (default 1.0)".into(), required: false },
                ToolParam { name: "properties".into(), description: "arbitrary JSON properties".into(), required: false },
            ],
        }
    }

    async fn run(&self, ctx: &ToolContext, args: &Value) -> ToolOutput {
        let (Some(source_id), Some(target_id)) = (parse_uuid(args, "source_id"), parse_uuid(args, "target_id")) else {
            return ToolOutput::error(&MemoryError::Validation("source_id and target_id are required".into()));
        };
        let Some(relation_type) = args.get("relation_type").and_then(Value::as_str) else {
            return ToolOutput::error(&MemoryError::Validation("relation_type is required".into()));
        };
        let weight = args.get("weight").and_then(Value::as_f64).map(|w| w as f32);
        let properties = args.get("properties").cloned().unwrap_or(Value::Null);
        let scope = ScopeKey::resolve(&ctx.user, &ctx.agent, ScopeTier::Private);

        match self.graph.create_relationship(&scope, source_id, target_id, relation_type.to_string(), weight, properties) {
            Ok(edge) => ToolOutput::ok("relationship saved", ToolDetails::Graph(relationship_json(&edge))),
            Err(err) => ToolOutput::error(&err.into()),
        }
    }
}

pub struct MemoryGraphRelRemoveTool {
    pub graph: Arc<GraphStore>,
}

#[async_trait]
impl Tool for MemoryGraphRelRemoveTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "memory_graph_rel_remove".into(),
            description: "Remove a relationship by id, or by its (source, target, relation_type) triple.".into(),
            params: vec![
                ToolParam { name: "id".into(), description: "relationship id".into(), required: false },
                ToolParam { name: "source_id".into(), description: "source entity id".into(), required: false },
                ToolParam { name: "target_id".into(), description: "target entity id".into(), required: false },
                ToolParam { name: "relation_type".into(), description: "relationship label".into(), required: false },
            ],
        }
    }

    async fn run(&self, ctx: &ToolContext, args: &Value) -> ToolOutput {
        let scope = ScopeKey::resolve(&ctx.user, &ctx.agent, ScopeTier::Private);

        let removed = if let Some(id) = parse_uuid(args, "id") {
            self.graph.delete_relationship_by_id(&scope, id)
        } else {
            let (Some(source_id), Some(target_id), Some(relation_type)) = (
                parse_uuid(args, "source_id"),
                parse_uuid(args, "target_id"),
                args.get("relation_type").and_then(Value::as_str),
            ) else {
                return ToolOutput::error(&MemoryError::Validation(
                    "either id, or source_id+target_id+relation_type, is required".into(),
                ));
            };
            self.graph.delete_relationship_by_triple(&scope, source_id, target_id, relation_type)
        };

        match removed {
            Ok(removed) => ToolOutput::ok(
                if removed { "relationship removed" } else { "relationship not found" },
                ToolDetails::Graph(Value::Bool(removed)),
            ),
            Err(err) => ToolOutput::error(&err.into()),
        }
    }
}

pub struct MemoryGraphSearchTool {
    pub graph: Arc<GraphStore>,
}

#[async_trait]
impl Tool for MemoryGraphSearchTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "memory_graph_search".into(),
            description: "Bounded breadth-first traversal from an entity, returning reached entities and edges.".into(),
            params: vec![
                ToolParam { name: "entity_id".into(), description: "starting entity id".into(), required: true },
                ToolParam { name: "depth".into(), description: "1-3, default 2".into(), required: false },
                ToolParam { name: "relation_type".into(), description: "filter traversed edges by type".into(), required: false },
            ],
        }
    }

    async fn run(&self, ctx: &ToolContext, args: &Value) -> ToolOutput {
        let Some(entity_id) = parse_uuid(args, "entity_id") else {
            return ToolOutput::error(&MemoryError::Validation("entity_id is required".into()));
        };
        let depth = args
            .get("depth")
            .and_then(Value::as_u64)
            .map(|d| (d as usize).clamp(1, MAX_SEARCH_DEPTH))
            .unwrap_or(DEFAULT_SEARCH_DEPTH);
        let relation_type = args.get("relation_type").and_then(Value::as_str);
        let scope = ScopeKey::resolve(&ctx.user, &ctx.agent, ScopeTier::Private);

        match self.graph.traverse_graph(&scope, entity_id, depth) {
            Ok(mut result) => {
                if let Some(relation_type) = relation_type {
                    result.relationships.retain(|r| r.relation_type == relation_type);
                }
                let summary = format!("{} entities, {} relationships reached", result.entities.len(), result.relationships.len());
                let details = serde_json::json!({
                    "entities": result.entities.iter().map(entity_json).collect::<Vec<_>>(),
                    "relationships": result.relationships.iter().map(relationship_json).collect::<Vec<_>>(),
                });
                ToolOutput::ok(summary, ToolDetails::Graph(details))
            }
            Err(err) => ToolOutput::error(&err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memsys_store::StoreHandle;
    use tempfile::TempDir;

    fn ctx() -> ToolContext {
        ToolContext { user: "default".into(), agent: "assistant".into() }
    }

    fn graph() -> (TempDir, Arc<GraphStore>) {
        let dir = TempDir::new().unwrap();
        let handle = StoreHandle::open(dir.path().join("mem.redb")).unwrap();
        (dir, Arc::new(GraphStore::new(handle).unwrap()))
    }

    #[tokio::test]
    async fn create_entity_then_fetch_by_id() {
        let (_dir, graph) = graph();
        let set_tool = MemoryGraphEntitySetTool { graph: graph.clone() };
        let created = set_tool
            .run(&ctx(), &serde_json::json!({ "name": "Alice", "type": "person" }))
            .await;
        assert!(!created.is_error);

        let ToolDetails::Graph(value) = &created.details else { panic!("expected graph details") };
        let id = value["id"].as_str().unwrap();

        let get_tool = MemoryGraphEntityGetTool { graph };
        let fetched = get_tool.run(&ctx(), &serde_json::json!({ "id": id })).await;
        assert!(!fetched.is_error);
    }

    #[tokio::test]
    async fn rel_add_requires_existing_endpoints() {
        let (_dir, graph) = graph();
        let tool = MemoryGraphRelAddTool { graph };
        let result = tool
            .run(
                &ctx(),
                &serde_json::json!({
                    "source_id": Uuid::new_v4().to_string(),
                    "target_id": Uuid::new_v4().to_string(),
                    "relation_type": "knows",
                }),
            )
            .await;
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn search_clamps_depth() {
        let (_dir, graph) = graph();
        let entity = graph.create_entity(&ScopeKey::resolve("default", "assistant", ScopeTier::Private), "root".into(), "node".into(), Value::Null).unwrap();
        let tool = MemoryGraphSearchTool { graph };
        let result = tool
            .run(&ctx(), &serde_json::json!({ "entity_id": entity.id.to_string(), "depth": 99 }))
            .await;
        assert!(!result.is_error);
    }
}
