//! Entity-relationship graph store (C3 GraphStore).

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use redb::{ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use memsys_scope::ScopeKey;

use crate::db::StoreHandle;
use crate::error::{StoreError, StoreResult};

const ENTITIES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("entities");
const EDGES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("edges");
/// Edge id → composite edge key, so `deleteRelationship(id)` doesn't need a
/// full scan.
const EDGE_ID_INDEX: TableDefinition<&str, &str> = TableDefinition::new("edge_id_index");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: Uuid,
    pub user: String,
    pub agent: String,
    pub name: String,
    pub entity_type: String,
    pub properties: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub id: Uuid,
    pub user: String,
    pub agent: String,
    pub source_id: Uuid,
    pub target_id: Uuid,
    pub relation_type: String,
    pub weight: f32,
    pub properties: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct EntityFilter {
    pub entity_type: Option<String>,
    pub name_substring: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TraverseResult {
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
}

fn entity_key(scope: &ScopeKey, id: &Uuid) -> String {
    format!("{}\u{0}{}\u{0}{}", scope.user, scope.agent, id)
}

fn edge_key(scope: &ScopeKey, source: &Uuid, target: &Uuid, relation_type: &str) -> String {
    format!(
        "{}\u{0}{}\u{0}{}\u{0}{}\u{0}{}",
        scope.user, scope.agent, source, target, relation_type
    )
}

fn parse_scope_prefix(raw: &str) -> Option<(&str, &str)> {
    let mut parts = raw.splitn(3, '\u{0}');
    let user = parts.next()?;
    let agent = parts.next()?;
    Some((user, agent))
}

pub struct GraphStore {
    handle: StoreHandle,
}

impl GraphStore {
    pub fn new(handle: StoreHandle) -> StoreResult<Self> {
        {
            let tx = handle.db().begin_write()?;
            tx.open_table(ENTITIES_TABLE)?;
            tx.open_table(EDGES_TABLE)?;
            tx.open_table(EDGE_ID_INDEX)?;
            tx.commit()?;
        }
        Ok(Self { handle })
    }

    pub fn create_entity(
        &self,
        scope: &ScopeKey,
        name: String,
        entity_type: String,
        properties: Value,
    ) -> StoreResult<Entity> {
        if name.is_empty() {
            return Err(StoreError::Validation("entity name must not be empty".into()));
        }
        let now = Utc::now();
        let entity = Entity {
            id: Uuid::new_v4(),
            user: scope.user.clone(),
            agent: scope.agent.clone(),
            name,
            entity_type,
            properties,
            created_at: now,
            updated_at: now,
        };
        let tx = self.handle.db().begin_write()?;
        {
            let mut table = tx.open_table(ENTITIES_TABLE)?;
            let bytes = serde_json::to_vec(&entity)?;
            table.insert(entity_key(scope, &entity.id).as_str(), bytes.as_slice())?;
        }
        tx.commit()?;
        tracing::debug!(id = %entity.id, "entity created");
        Ok(entity)
    }

    pub fn get_entity(&self, scope: &ScopeKey, id: Uuid) -> StoreResult<Option<Entity>> {
        let tx = self.handle.db().begin_read()?;
        let table = tx.open_table(ENTITIES_TABLE)?;
        match table.get(entity_key(scope, &id).as_str())? {
            Some(raw) => Ok(Some(serde_json::from_slice(raw.value())?)),
            None => Ok(None),
        }
    }

    pub fn list_entities(&self, scope: &ScopeKey, filter: EntityFilter) -> StoreResult<Vec<Entity>> {
        let mut entities = self.scan_entities(scope)?;
        if let Some(entity_type) = &filter.entity_type {
            entities.retain(|e| &e.entity_type == entity_type);
        }
        if let Some(substr) = &filter.name_substring {
            let needle = substr.to_lowercase();
            entities.retain(|e| e.name.to_lowercase().contains(&needle));
        }
        entities.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(entities)
    }

    pub fn update_entity(
        &self,
        scope: &ScopeKey,
        id: Uuid,
        name: Option<String>,
        entity_type: Option<String>,
        properties: Option<Value>,
    ) -> StoreResult<Option<Entity>> {
        let tx = self.handle.db().begin_write()?;
        let updated = {
            let mut table = tx.open_table(ENTITIES_TABLE)?;
            let key = entity_key(scope, &id);
            let Some(raw) = table.get(key.as_str())? else {
                return Ok(None);
            };
            let mut entity: Entity = serde_json::from_slice(raw.value())?;
            drop(raw);
            if let Some(name) = name {
                entity.name = name;
            }
            if let Some(entity_type) = entity_type {
                entity.entity_type = entity_type;
            }
            if let Some(properties) = properties {
                entity.properties = properties;
            }
            entity.updated_at = Utc::now();
            let bytes = serde_json::to_vec(&entity)?;
            table.insert(key.as_str(), bytes.as_slice())?;
            entity
        };
        tx.commit()?;
        Ok(Some(updated))
    }

    /// Delete an entity and cascade to every edge incident on it within the
    /// same scope (§3, §4.2). Returns true iff the entity row was removed.
    pub fn delete_entity(&self, scope: &ScopeKey, id: Uuid) -> StoreResult<bool> {
        let tx = self.handle.db().begin_write()?;
        let removed = {
            let mut entities = tx.open_table(ENTITIES_TABLE)?;
            let mut edges = tx.open_table(EDGES_TABLE)?;
            let mut edge_ids = tx.open_table(EDGE_ID_INDEX)?;

            let incident_keys: Vec<(String, String)> = edges
                .iter()?
                .filter_map(|r| r.ok())
                .filter_map(|(k, v)| {
                    let raw_key = k.value().to_string();
                    let (user, agent) = parse_scope_prefix(&raw_key)?;
                    if user != scope.user || agent != scope.agent {
                        return None;
                    }
                    let edge: Relationship = serde_json::from_slice(v.value()).ok()?;
                    if edge.source_id == id || edge.target_id == id {
                        Some((raw_key, edge.id.to_string()))
                    } else {
                        None
                    }
                })
                .collect();

            for (raw_key, edge_id) in &incident_keys {
                edges.remove(raw_key.as_str())?;
                edge_ids.remove(edge_id.as_str())?;
            }

            entities.remove(entity_key(scope, &id).as_str())?.is_some()
        };
        tx.commit()?;
        if removed {
            tracing::debug!(id = %id, "entity deleted with cascade");
        }
        Ok(removed)
    }

    /// Upsert on the unique triple `(source_id, target_id, relation_type)`
    /// (§3). Both endpoints must already exist in `scope`.
    pub fn create_relationship(
        &self,
        scope: &ScopeKey,
        source_id: Uuid,
        target_id: Uuid,
        relation_type: String,
        weight: Option<f32>,
        properties: Value,
    ) -> StoreResult<Relationship> {
        if self.get_entity(scope, source_id)?.is_none() || self.get_entity(scope, target_id)?.is_none() {
            return Err(StoreError::Validation(
                "both endpoints must exist in scope to create a relationship".into(),
            ));
        }
        let now = Utc::now();
        let key = edge_key(scope, &source_id, &target_id, &relation_type);

        let tx = self.handle.db().begin_write()?;
        let edge = {
            let mut edges = tx.open_table(EDGES_TABLE)?;
            let mut edge_ids = tx.open_table(EDGE_ID_INDEX)?;
            let previous = match edges.get(key.as_str())? {
                Some(raw) => Some(serde_json::from_slice::<Relationship>(raw.value())?),
                None => None,
            };
            let edge = Relationship {
                id: previous.as_ref().map(|p| p.id).unwrap_or_else(Uuid::new_v4),
                user: scope.user.clone(),
                agent: scope.agent.clone(),
                source_id,
                target_id,
                relation_type: relation_type.clone(),
                weight: weight.unwrap_or(1.0),
                properties,
                created_at: previous.map(|p| p.created_at).unwrap_or(now),
            };
            let bytes = serde_json::to_vec(&edge)?;
            edges.insert(key.as_str(), bytes.as_slice())?;
            edge_ids.insert(edge.id.to_string().as_str(), key.as_str())?;
            edge
        };
        tx.commit()?;
        Ok(edge)
    }

    pub fn get_relationship(&self, scope: &ScopeKey, id: Uuid) -> StoreResult<Option<Relationship>> {
        let tx = self.handle.db().begin_read()?;
        let edge_ids = tx.open_table(EDGE_ID_INDEX)?;
        let Some(key) = edge_ids.get(id.to_string().as_str())?.map(|v| v.value().to_string()) else {
            return Ok(None);
        };
        let edges = tx.open_table(EDGES_TABLE)?;
        match edges.get(key.as_str())? {
            Some(raw) => Ok(Some(serde_json::from_slice(raw.value())?)),
            None => Ok(None),
        }
    }

    /// Edges incident on `entity_id`, ordered by `weight` descending (§4.2).
    pub fn get_relationships(
        &self,
        scope: &ScopeKey,
        entity_id: Uuid,
        direction: Direction,
    ) -> StoreResult<Vec<Relationship>> {
        let mut edges = self.scan_edges(scope)?;
        edges.retain(|e| match direction {
            Direction::Outgoing => e.source_id == entity_id,
            Direction::Incoming => e.target_id == entity_id,
            Direction::Both => e.source_id == entity_id || e.target_id == entity_id,
        });
        edges.sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap_or(std::cmp::Ordering::Equal));
        Ok(edges)
    }

    pub fn delete_relationship_by_id(&self, scope: &ScopeKey, id: Uuid) -> StoreResult<bool> {
        let tx = self.handle.db().begin_write()?;
        let removed = {
            let mut edges = tx.open_table(EDGES_TABLE)?;
            let mut edge_ids = tx.open_table(EDGE_ID_INDEX)?;
            let Some(key) = edge_ids.get(id.to_string().as_str())?.map(|v| v.value().to_string()) else {
                return Ok(false);
            };
            let removed = edges.remove(key.as_str())?.is_some();
            edge_ids.remove(id.to_string().as_str())?;
            let _ = scope;
            removed
        };
        tx.commit()?;
        Ok(removed)
    }

    pub fn delete_relationship_by_triple(
        &self,
        scope: &ScopeKey,
        source_id: Uuid,
        target_id: Uuid,
        relation_type: &str,
    ) -> StoreResult<bool> {
        let key = edge_key(scope, &source_id, &target_id, relation_type);
        let tx = self.handle.db().begin_write()?;
        let removed = {
            let mut edges = tx.open_table(EDGES_TABLE)?;
            let mut edge_ids = tx.open_table(EDGE_ID_INDEX)?;
            match edges.remove(key.as_str())? {
                Some(raw) => {
                    let edge: Relationship = serde_json::from_slice(raw.value())?;
                    edge_ids.remove(edge.id.to_string().as_str())?;
                    true
                }
                None => false,
            }
        };
        tx.commit()?;
        Ok(removed)
    }

    /// Bounded BFS from `start` (§4.2). Returns the unique set of entities
    /// and edges visited, in insertion (visit) order. A missing `start`
    /// yields empty sets rather than an error.
    pub fn traverse_graph(&self, scope: &ScopeKey, start: Uuid, max_depth: usize) -> StoreResult<TraverseResult> {
        let mut result = TraverseResult::default();
        if self.get_entity(scope, start)?.is_none() {
            return Ok(result);
        }

        let mut visited: HashSet<Uuid> = HashSet::new();
        let mut visited_edges: HashSet<Uuid> = HashSet::new();
        let mut frontier: VecDeque<(Uuid, usize)> = VecDeque::new();
        frontier.push_back((start, 0));
        visited.insert(start);

        while let Some((current, depth)) = frontier.pop_front() {
            if let Some(entity) = self.get_entity(scope, current)? {
                result.entities.push(entity);
            }
            if depth >= max_depth {
                continue;
            }
            let incident = self.get_relationships(scope, current, Direction::Both)?;
            for edge in incident {
                if visited_edges.insert(edge.id) {
                    result.relationships.push(edge.clone());
                }
                let other = if edge.source_id == current { edge.target_id } else { edge.source_id };
                if visited.insert(other) {
                    frontier.push_back((other, depth + 1));
                }
            }
        }

        Ok(result)
    }

    fn scan_entities(&self, scope: &ScopeKey) -> StoreResult<Vec<Entity>> {
        let tx = self.handle.db().begin_read()?;
        let table = tx.open_table(ENTITIES_TABLE)?;
        let mut out = Vec::new();
        for row in table.iter()? {
            let (k, v) = row?;
            let raw_key = k.value().to_string();
            let Some((user, agent)) = parse_scope_prefix(&raw_key) else {
                continue;
            };
            if user != scope.user || agent != scope.agent {
                continue;
            }
            out.push(serde_json::from_slice::<Entity>(v.value())?);
        }
        Ok(out)
    }

    fn scan_edges(&self, scope: &ScopeKey) -> StoreResult<Vec<Relationship>> {
        let tx = self.handle.db().begin_read()?;
        let table = tx.open_table(EDGES_TABLE)?;
        let mut out = Vec::new();
        for row in table.iter()? {
            let (k, v) = row?;
            let raw_key = k.value().to_string();
            let Some((user, agent)) = parse_scope_prefix(&raw_key) else {
                continue;
            };
            if user != scope.user || agent != scope.agent {
                continue;
            }
            out.push(serde_json::from_slice::<Relationship>(v.value())?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memsys_scope::ScopeTier;

    fn scope() -> ScopeKey {
        ScopeKey::resolve("session", "assistant", ScopeTier::Private)
    }

    fn store() -> (tempfile::TempDir, GraphStore) {
        let dir = tempfile::tempdir().unwrap();
        let handle = StoreHandle::open(dir.path().join("graph.redb")).unwrap();
        (dir, GraphStore::new(handle).unwrap())
    }

    #[test]
    fn relationship_upsert_keeps_single_edge() {
        let (_dir, store) = store();
        let scope = scope();
        let a = store
            .create_entity(&scope, "Alice".into(), "person".into(), Value::Null)
            .unwrap();
        let b = store
            .create_entity(&scope, "Bob".into(), "person".into(), Value::Null)
            .unwrap();

        let first = store
            .create_relationship(&scope, a.id, b.id, "knows".into(), Some(0.5), Value::Null)
            .unwrap();
        let second = store
            .create_relationship(&scope, a.id, b.id, "knows".into(), Some(0.9), Value::Null)
            .unwrap();

        assert_eq!(first.id, second.id);
        let edges = store.get_relationships(&scope, a.id, Direction::Outgoing).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].weight, 0.9);
    }

    #[test]
    fn cascade_delete_removes_incident_edges_only() {
        let (_dir, store) = store();
        let scope = scope();
        let a = store
            .create_entity(&scope, "Alice".into(), "person".into(), Value::Null)
            .unwrap();
        let b = store
            .create_entity(&scope, "Bob".into(), "person".into(), Value::Null)
            .unwrap();
        store
            .create_relationship(&scope, a.id, b.id, "knows".into(), None, Value::Null)
            .unwrap();

        assert!(store.delete_entity(&scope, a.id).unwrap());
        assert!(store.get_entity(&scope, a.id).unwrap().is_none());
        assert!(store.get_entity(&scope, b.id).unwrap().is_some());
        assert!(store.get_relationships(&scope, b.id, Direction::Both).unwrap().is_empty());
    }

    #[test]
    fn traverse_missing_start_returns_empty() {
        let (_dir, store) = store();
        let scope = scope();
        let result = store.traverse_graph(&scope, Uuid::new_v4(), 2).unwrap();
        assert!(result.entities.is_empty());
        assert!(result.relationships.is_empty());
    }

    #[test]
    fn traverse_respects_max_depth() {
        let (_dir, store) = store();
        let scope = scope();
        let a = store.create_entity(&scope, "A".into(), "concept".into(), Value::Null).unwrap();
        let b = store.create_entity(&scope, "B".into(), "concept".into(), Value::Null).unwrap();
        let c = store.create_entity(&scope, "C".into(), "concept".into(), Value::Null).unwrap();
        store.create_relationship(&scope, a.id, b.id, "links".into(), None, Value::Null).unwrap();
        store.create_relationship(&scope, b.id, c.id, "links".into(), None, Value::Null).unwrap();

        let result = store.traverse_graph(&scope, a.id, 1).unwrap();
        let ids: HashSet<Uuid> = result.entities.iter().map(|e| e.id).collect();
        assert!(ids.contains(&a.id));
        assert!(ids.contains(&b.id));
        assert!(!ids.contains(&c.id));
    }
}
