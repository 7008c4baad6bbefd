//! Pre-turn context injection (C11 AutoRecall): merge slots across scope
//! tiers, summarise the private knowledge graph, surface recent updates,
//! and pull in semantically related memories (§4.10).

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use memsys_embed::EmbedGateway;
use memsys_scope::{ScopeKey, ScopeTier};
use memsys_store::{Direction, EntityFilter, GraphStore, SlotStore};
use memsys_vector::{VectorFilter, VectorGateway};

use crate::message::Message;
use crate::noise_filter::NoiseFilter;

const MAX_GRAPH_ENTITIES: usize = 10;
const MAX_SUMMARISED_ENTITIES: usize = 5;
const MAX_EDGES_PER_ENTITY: usize = 2;
const MAX_RECENT_UPDATES: usize = 5;
const SEMANTIC_SEARCH_LIMIT: u64 = 5;
const SEMANTIC_MIN_SCORE: f32 = 0.7;
const TRUNCATE_VALUE_AT: usize = 100;

pub struct AutoRecall {
    slots: Arc<SlotStore>,
    graph: Arc<GraphStore>,
    vector: Arc<VectorGateway>,
    embed: Arc<EmbedGateway>,
}

impl AutoRecall {
    pub fn new(slots: Arc<SlotStore>, graph: Arc<GraphStore>, vector: Arc<VectorGateway>, embed: Arc<EmbedGateway>) -> Self {
        Self { slots, graph, vector, embed }
    }

    /// Build the injected context block and splice it into `system_prompt`
    /// (after an existing `</system>` marker if present, else prepended).
    pub async fn inject(&self, user: &str, agent: &str, system_prompt: &str, recent_messages: &[Message]) -> String {
        let block = self.build_block(user, agent, recent_messages).await;
        if block.is_empty() {
            return system_prompt.to_string();
        }
        match system_prompt.find("</system>") {
            Some(idx) => {
                let split_at = idx + "</system>".len();
                format!("{}\n{}{}", &system_prompt[..split_at], block, &system_prompt[split_at..])
            }
            None => format!("{block}\n{system_prompt}"),
        }
    }

    async fn build_block(&self, user: &str, agent: &str, recent_messages: &[Message]) -> String {
        let mut sections = Vec::new();

        if let Some(section) = self.current_state_section(user, agent) {
            sections.push(section);
        }
        if let Some(section) = self.graph_section(user, agent) {
            sections.push(section);
        }
        if let Some(section) = self.recent_updates_section(user, agent) {
            sections.push(section);
        }
        if let Some(section) = self.semantic_section(agent, recent_messages).await {
            sections.push(section);
        }

        sections.join("\n")
    }

    /// Merge slot state across scope tiers by freshness (§4.10: freshness
    /// wins, not scope priority) — per `(category, key)`, the slot with the
    /// greatest `updated_at` across all tiers is the one surfaced.
    fn current_state_section(&self, user: &str, agent: &str) -> Option<String> {
        let mut winners: BTreeMap<(String, String), &memsys_store::Slot> = BTreeMap::new();
        let mut all_slots = Vec::new();
        for tier in ScopeTier::merge_order() {
            let scope = ScopeKey::resolve(user, agent, tier);
            let Ok(slots) = self.slots.all(&scope) else { continue };
            all_slots.extend(slots.into_iter().filter(|s| !s.key.starts_with('_')));
        }
        for slot in &all_slots {
            let id = (slot.category.clone(), slot.key.clone());
            match winners.get(&id) {
                Some(current) if current.updated_at >= slot.updated_at => {}
                _ => {
                    winners.insert(id, slot);
                }
            }
        }
        if winners.is_empty() {
            return None;
        }

        let mut merged: BTreeMap<String, BTreeMap<String, &Value>> = BTreeMap::new();
        for ((category, key), slot) in &winners {
            merged.entry(category.clone()).or_default().insert(key.clone(), &slot.value);
        }

        let mut lines = Vec::new();
        for (category, keys) in &merged {
            lines.push(format!("  {category}:"));
            for (key, value) in keys {
                lines.push(format!("    {key}: {}", truncate_value(value)));
            }
        }
        Some(format!("<current-state>\n{}\n</current-state>", lines.join("\n")))
    }

    fn graph_section(&self, user: &str, agent: &str) -> Option<String> {
        let scope = ScopeKey::resolve(user, agent, ScopeTier::Private);
        let mut entities = self.graph.list_entities(&scope, EntityFilter::default()).ok()?;
        if entities.is_empty() {
            return None;
        }
        entities.truncate(MAX_GRAPH_ENTITIES);

        let mut lines = Vec::new();
        for entity in entities.iter().take(MAX_SUMMARISED_ENTITIES) {
            lines.push(format!("  {} ({})", entity.name, entity.entity_type));
            if let Ok(edges) = self.graph.get_relationships(&scope, entity.id, Direction::Outgoing) {
                for edge in edges.iter().take(MAX_EDGES_PER_ENTITY) {
                    let target_name = self
                        .graph
                        .get_entity(&scope, edge.target_id)
                        .ok()
                        .flatten()
                        .map(|e| e.name)
                        .unwrap_or_else(|| edge.target_id.to_string());
                    lines.push(format!("    --{}--> {target_name}", edge.relation_type));
                }
            }
        }
        Some(format!("<knowledge-graph>\n{}\n</knowledge-graph>", lines.join("\n")))
    }

    fn recent_updates_section(&self, user: &str, agent: &str) -> Option<String> {
        let mut all_slots = Vec::new();
        for tier in ScopeTier::merge_order() {
            let scope = ScopeKey::resolve(user, agent, tier);
            if let Ok(slots) = self.slots.all(&scope) {
                all_slots.extend(slots);
            }
        }
        if all_slots.is_empty() {
            return None;
        }
        all_slots.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        all_slots.truncate(MAX_RECENT_UPDATES);

        let lines: Vec<String> = all_slots
            .iter()
            .map(|s| format!("  {}.{} = {}", s.category, s.key, truncate_value(&s.value)))
            .collect();
        Some(format!("<recent-updates>\n{}\n</recent-updates>", lines.join("\n")))
    }

    async fn semantic_section(&self, agent: &str, recent_messages: &[Message]) -> Option<String> {
        let last_user_text = recent_messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, crate::message::Role::User))
            .map(|m| crate::message::extract_message_text(&m.content))
            .filter(|t| !t.trim().is_empty())?;

        let noise_filter = NoiseFilter::new(agent);
        let namespaces = noise_filter.search_namespaces();
        let mut term_iter = namespaces.iter().map(|ns| Value::String(ns.to_string()));
        let Some(first) = term_iter.next() else { return None };
        let namespace_filter = VectorFilter::new().with_term(VectorFilter::any_of("namespace", [first].into_iter().chain(term_iter)));

        let vector = self.embed.embed(&last_user_text).await;
        let hits = self
            .vector
            .search(vector, SEMANTIC_SEARCH_LIMIT, Some(namespace_filter))
            .await
            .ok()?;

        let relevant: Vec<_> = hits.into_iter().filter(|h| h.score >= SEMANTIC_MIN_SCORE).collect();
        if relevant.is_empty() {
            return None;
        }

        let lines: Vec<String> = relevant
            .iter()
            .map(|hit| {
                let text = hit.payload.get("text").and_then(Value::as_str).unwrap_or_default();
                format!("  ({:.2}) {}", hit.score, truncate_str(text))
            })
            .collect();
        Some(format!("<semantic-memories>\n{}\n</semantic-memories>", lines.join("\n")))
    }
}

fn truncate_value(value: &Value) -> String {
    match value {
        Value::String(s) => truncate_str(s),
        other => truncate_str(&other.to_string()),
    }
}

fn truncate_str(s: &str) -> String {
    if s.chars().count() <= TRUNCATE_VALUE_AT {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(TRUNCATE_VALUE_AT).collect();
        format!("{truncated}...")
    }
}
