//! LLM-driven fact extraction (C6 LLMExtractor).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{ChatMessage, LlmClient};
use crate::extract::extract_json_output;

/// Volatile status keys the extractor must actively detect staleness for
/// (§4.5, GLOSSARY).
pub const VOLATILE_STATUS_KEYS: [&str; 5] = [
    "project.current",
    "project.current_task",
    "project.current_epic",
    "project.phase",
    "project.status",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotUpdate {
    pub key: String,
    pub value: Value,
    pub confidence: f32,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotRemoval {
    pub key: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryCandidate {
    pub text: String,
    pub namespace: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawExtraction {
    #[serde(default)]
    pub slot_updates: Vec<SlotUpdate>,
    #[serde(default)]
    pub slot_removals: Vec<SlotRemoval>,
    #[serde(default)]
    pub memories: Vec<MemoryCandidate>,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    pub slot_updates: Vec<SlotUpdate>,
    pub slot_removals: Vec<SlotRemoval>,
    pub memories: Vec<MemoryCandidate>,
}

pub struct LlmExtractor {
    client: LlmClient,
    min_confidence: f32,
    allowed_categories: Vec<String>,
    allowed_namespaces: Vec<String>,
}

impl LlmExtractor {
    pub fn new(
        client: LlmClient,
        min_confidence: f32,
        allowed_categories: Vec<String>,
        allowed_namespaces: Vec<String>,
    ) -> Self {
        Self {
            client,
            min_confidence,
            allowed_categories,
            allowed_namespaces,
        }
    }

    /// Call the LLM with the conversation plus current slot snapshot and
    /// return a confidence-filtered extraction. Any HTTP or parse failure
    /// yields an empty result rather than propagating — the caller
    /// (AutoCapture) must never abort on an extraction failure (§4.5, §7).
    pub async fn extract(&self, conversation: &str, current_slots: &Value) -> ExtractionResult {
        let messages = [
            ChatMessage::system(self.system_prompt()),
            ChatMessage::user(self.user_prompt(conversation, current_slots)),
        ];

        let reply = match self.client.chat(&messages).await {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(error = %err, "LLM extraction call failed");
                return ExtractionResult::default();
            }
        };

        let Some(raw) = extract_json_output::<RawExtraction>(&reply) else {
            tracing::warn!("LLM extraction reply did not contain a parseable JSON object");
            return ExtractionResult::default();
        };

        ExtractionResult {
            slot_updates: raw
                .slot_updates
                .into_iter()
                .filter(|u| u.confidence >= self.min_confidence)
                .collect(),
            // Not confidence-filtered: the contract defines no confidence
            // semantics on removals (SPEC_FULL §D.a).
            slot_removals: raw.slot_removals,
            memories: raw
                .memories
                .into_iter()
                .filter(|m| m.confidence >= self.min_confidence)
                .collect(),
        }
    }

    fn system_prompt(&self) -> String {
        format!(
            "You maintain durable memory for a conversational agent. Given a \
             conversation and the agent's current structured state, perform \
             three jobs: (1) propose slot_updates — new or changed structured \
             facts; (2) propose slot_removals for any slot that is now stale, \
             paying special attention to these volatile status keys which must \
             be actively invalidated when the conversation implies they changed: \
             {volatile}; (3) propose memories — durable free-text facts worth \
             storing in semantic memory. Allowed slot categories: {categories}. \
             Allowed memory namespaces: {namespaces}. Reply with a single JSON \
             object of the shape {{\"slot_updates\":[{{\"key\",\"value\",\"confidence\",\"category\"}}],\
             \"slot_removals\":[{{\"key\",\"reason\"}}],\"memories\":[{{\"text\",\"namespace\",\"confidence\"}}]}} \
             and nothing else.",
            volatile = VOLATILE_STATUS_KEYS.join(", "),
            categories = self.allowed_categories.join(", "),
            namespaces = self.allowed_namespaces.join(", "),
        )
    }

    fn user_prompt(&self, conversation: &str, current_slots: &Value) -> String {
        format!(
            "Current slots:\n{slots}\n\n<conversation>\n{conversation}\n</conversation>",
            slots = current_slots,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_slot_updates_and_memories_by_confidence() {
        let raw = RawExtraction {
            slot_updates: vec![
                SlotUpdate {
                    key: "profile.name".into(),
                    value: Value::String("MrC".into()),
                    confidence: 0.9,
                    category: None,
                },
                SlotUpdate {
                    key: "profile.mood".into(),
                    value: Value::String("curious".into()),
                    confidence: 0.3,
                    category: None,
                },
            ],
            slot_removals: vec![SlotRemoval {
                key: "project.current_epic".into(),
                reason: "superseded".into(),
            }],
            memories: vec![
                MemoryCandidate {
                    text: "likes chess".into(),
                    namespace: "user_profile".into(),
                    confidence: 0.95,
                },
                MemoryCandidate {
                    text: "maybe likes tea".into(),
                    namespace: "user_profile".into(),
                    confidence: 0.2,
                },
            ],
        };

        let filtered = ExtractionResult {
            slot_updates: raw.slot_updates.into_iter().filter(|u| u.confidence >= 0.7).collect(),
            slot_removals: raw.slot_removals,
            memories: raw.memories.into_iter().filter(|m| m.confidence >= 0.7).collect(),
        };

        assert_eq!(filtered.slot_updates.len(), 1);
        assert_eq!(filtered.memories.len(), 1);
        assert_eq!(filtered.slot_removals.len(), 1);
    }

    #[tokio::test]
    async fn extract_returns_empty_result_when_llm_unreachable() {
        let client = LlmClient::new("http://127.0.0.1:1", "", "test-model");
        let extractor = LlmExtractor::new(client, 0.7, vec!["profile".into()], vec!["user_profile".into()]);
        let result = extractor.extract("hello", &serde_json::json!({})).await;
        assert!(result.slot_updates.is_empty());
        assert!(result.slot_removals.is_empty());
        assert!(result.memories.is_empty());
    }
}
