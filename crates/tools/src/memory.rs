//! `memory_search`, `memory_store`: direct vector-memory access (§6), distinct
//! from the LLM-driven `memory_auto_capture` path.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use memsys_embed::EmbedGateway;
use memsys_vector::{VectorFilter, VectorGateway, VectorPoint};

use crate::error::MemoryError;
use crate::registry::{Tool, ToolContext, ToolDetails, ToolOutput, ToolParam, ToolSpec};
use memsys_pipeline::{DEFAULT_DEDUPE_THRESHOLD, MemoryPayload, SourceType, find_duplicate};

const DEFAULT_SEARCH_LIMIT: u64 = 5;
const MAX_SEARCH_LIMIT: u64 = 20;
const DEFAULT_MIN_SCORE: f32 = 0.7;
const MAX_TEXT_LEN: usize = 10_000;
const NEIGHBOUR_SEARCH_LIMIT: u64 = 5;

pub struct MemorySearchTool {
    pub vector: Arc<VectorGateway>,
    pub embed: Arc<EmbedGateway>,
}

#[async_trait]
impl Tool for MemorySearchTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "memory_search".into(),
            description: "Semantic search over stored memories.".into(),
            params: vec![
                ToolParam { name: "query".into(), description: "search text".into(), required: true },
                ToolParam { name: "limit".into(), description: "1-20, default 5".into(), required: false },
                ToolParam { name: "namespace".into(), description: "namespace filter".into(), required: false },
                ToolParam { name: "sessionId".into(), description: "session filter".into(), required: false },
                ToolParam { name: "userId".into(), description: "user filter".into(), required: false },
                ToolParam { name: "minScore".into(), description: "minimum similarity, default 0.7".into(), required: false },
                ToolParam { name: "sourceAgent".into(), description: "source agent filter".into(), required: false },
            ],
        }
    }

    async fn run(&self, _ctx: &ToolContext, args: &Value) -> ToolOutput {
        let Some(query) = args.get("query").and_then(Value::as_str) else {
            return ToolOutput::error(&MemoryError::Validation("query is required".into()));
        };
        let limit = args
            .get("limit")
            .and_then(Value::as_u64)
            .map(|l| l.clamp(1, MAX_SEARCH_LIMIT))
            .unwrap_or(DEFAULT_SEARCH_LIMIT);
        let min_score = args.get("minScore").and_then(Value::as_f64).map(|s| s as f32).unwrap_or(DEFAULT_MIN_SCORE);

        let mut filter = VectorFilter::new();
        for (field, key) in [("namespace", "namespace"), ("sessionId", "sessionId"), ("userId", "userId"), ("sourceAgent", "source_agent")] {
            if let Some(value) = args.get(field).and_then(Value::as_str) {
                filter = filter.eq(key, value.to_string());
            }
        }

        let vector = self.embed.embed(query).await;
        let hits = match self.vector.search(vector, limit, Some(filter)).await {
            Ok(hits) => hits,
            Err(err) => return ToolOutput::error(&err.into()),
        };
        let relevant: Vec<_> = hits.into_iter().filter(|h| h.score >= min_score).collect();

        let details = relevant
            .iter()
            .map(|h| serde_json::json!({ "id": h.id, "score": h.score, "text": h.payload.get("text"), "namespace": h.payload.get("namespace") }))
            .collect::<Vec<_>>();
        ToolOutput::ok(format!("{} memory(ies) found", details.len()), ToolDetails::Search(Value::Array(details)))
    }
}

pub struct MemoryStoreTool {
    pub vector: Arc<VectorGateway>,
    pub embed: Arc<EmbedGateway>,
}

#[async_trait]
impl Tool for MemoryStoreTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "memory_store".into(),
            description: "Store a memory (or update an existing one), embedding it for later search.".into(),
            params: vec![
                ToolParam { name: "text".into(), description: "memory text, up to 10000 chars".into(), required: true },
                ToolParam { name: "namespace".into(), description: "destination namespace".into(), required: false },
                ToolParam { name: "sessionId".into(), description: "originating session id".into(), required: false },
                ToolParam { name: "userId".into(), description: "owning user id".into(), required: false },
                ToolParam { name: "metadata".into(), description: "arbitrary JSON metadata".into(), required: false },
            ],
        }
    }

    async fn run(&self, ctx: &ToolContext, args: &Value) -> ToolOutput {
        let Some(text) = args.get("text").and_then(Value::as_str) else {
            return ToolOutput::error(&MemoryError::Validation("text is required".into()));
        };
        if text.chars().count() > MAX_TEXT_LEN {
            return ToolOutput::error(&MemoryError::Validation(format!("text exceeds {MAX_TEXT_LEN} characters")));
        }
        let namespace = args.get("namespace").and_then(Value::as_str).unwrap_or("agent_decisions").to_string();
        let user_id = args.get("userId").and_then(Value::as_str).unwrap_or(&ctx.user).to_string();
        let session_id = args.get("sessionId").and_then(Value::as_str).map(str::to_string);
        let metadata = args.get("metadata").cloned().unwrap_or(Value::Null);

        let vector = self.embed.embed(text).await;

        let filter = VectorFilter::new().eq("namespace", namespace.clone());
        let neighbours = match self.vector.search(vector.clone(), NEIGHBOUR_SEARCH_LIMIT, Some(filter)).await {
            Ok(hits) => hits,
            Err(err) => return ToolOutput::error(&err.into()),
        };
        let duplicate_id = find_duplicate(&neighbours, DEFAULT_DEDUPE_THRESHOLD);

        let now = Utc::now();
        let payload = MemoryPayload {
            text: text.to_string(),
            namespace,
            source_agent: ctx.agent.clone(),
            source_type: SourceType::Manual,
            user_id,
            timestamp: now,
            updated_at: now,
            session_id,
            confidence: None,
            tags: Vec::new(),
            metadata,
        };
        let was_duplicate = duplicate_id.is_some();
        let id = duplicate_id.unwrap_or_else(MemoryPayload::new_id);
        let payload_json = match serde_json::to_value(&payload) {
            Ok(value) => value,
            Err(err) => return ToolOutput::error(&MemoryError::Validation(err.to_string())),
        };

        match self
            .vector
            .upsert(vec![VectorPoint { id: id.clone(), vector, payload: payload_json }])
            .await
        {
            Ok(()) => {
                let summary = if was_duplicate { "memory updated" } else { "memory stored" };
                ToolOutput::ok(summary, ToolDetails::Store(serde_json::json!({ "id": id })))
            }
            Err(err) => ToolOutput::error(&err.into()),
        }
    }
}
