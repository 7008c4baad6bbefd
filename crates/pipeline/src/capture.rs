//! AutoCapture orchestration (C10): C8 → C6 → (C2, C4) with a re-entrancy
//! guard and atomic slot add/remove (§4.9).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use serde_json::Value;

use memsys_embed::EmbedGateway;
use memsys_llm::LlmExtractor;
use memsys_scope::{ScopeKey, ScopeTier};
use memsys_store::{SetSlot, SlotSource, SlotStore};
use memsys_vector::{VectorFilter, VectorGateway, VectorPoint};

use crate::context_window::{ContextWindowConfig, select_messages_within_budget};
use crate::dedupe::{DEFAULT_DEDUPE_THRESHOLD, find_duplicate};
use crate::memory_point::{MemoryPayload, SourceType};
use crate::message::{Message, extract_message_text};
use crate::noise_filter::{NoiseFilter, contains_internal_markers};

const NEIGHBOUR_SEARCH_LIMIT: u64 = 5;

pub struct AutoCaptureEvent {
    pub session_id: String,
    pub agent: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Default)]
pub struct CaptureOutcome {
    pub slots_updated: usize,
    pub slots_removed: usize,
    pub memories_stored: usize,
}

pub struct AutoCapture {
    slots: Arc<SlotStore>,
    vector: Arc<VectorGateway>,
    embed: Arc<EmbedGateway>,
    extractor: Arc<LlmExtractor>,
    context_config: ContextWindowConfig,
    dedupe_threshold: f32,
    /// Process-wide re-entrancy flag (§5, §9 "Global mutable state"). A
    /// second concurrent `agent_end` while this is held is dropped, not
    /// queued (SPEC_FULL §D.b).
    capturing: Arc<AtomicBool>,
}

impl AutoCapture {
    pub fn new(
        slots: Arc<SlotStore>,
        vector: Arc<VectorGateway>,
        embed: Arc<EmbedGateway>,
        extractor: Arc<LlmExtractor>,
        context_config: ContextWindowConfig,
    ) -> Self {
        Self {
            slots,
            vector,
            embed,
            extractor,
            context_config,
            dedupe_threshold: DEFAULT_DEDUPE_THRESHOLD,
            capturing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run the capture state machine. Never raises — any unexpected error
    /// is logged and swallowed, returning `None` (§4.9, §7).
    pub async fn run(&self, event: AutoCaptureEvent) -> Option<CaptureOutcome> {
        if self.capturing.swap(true, Ordering::SeqCst) {
            tracing::debug!("auto-capture already running, dropping concurrent invocation");
            return None;
        }
        let _guard = CaptureGuard { flag: &self.capturing };

        let outcome = self.run_inner(event).await;
        match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(error = %err, "auto-capture failed, swallowing");
                None
            }
        }
    }

    async fn run_inner(&self, event: AutoCaptureEvent) -> anyhow::Result<Option<CaptureOutcome>> {
        let scope = ScopeKey::resolve(&event.session_id, &event.agent, ScopeTier::Private);
        let noise_filter = NoiseFilter::new(&event.agent);
        if noise_filter.is_blocked() {
            return Ok(None);
        }

        if event
            .messages
            .iter()
            .any(|m| contains_internal_markers(&extract_message_text(&m.content)))
        {
            return Ok(None);
        }

        let flattened: String = event
            .messages
            .iter()
            .map(|m| extract_message_text(&m.content))
            .collect::<Vec<_>>()
            .join("\n");
        if noise_filter.should_skip(&flattened) {
            return Ok(None);
        }

        let selection = select_messages_within_budget(&event.messages, self.context_config);
        let conversation = selection
            .selected
            .iter()
            .map(|m| extract_message_text(&m.content))
            .collect::<Vec<_>>()
            .join("\n");

        let current_slots = self.slots.current_state(&scope)?;
        let current_slots_json = serde_json::to_value(&current_slots)?;
        let extraction = self.extractor.extract(&conversation, &current_slots_json).await;

        let mut outcome = CaptureOutcome::default();

        for removal in &extraction.slot_removals {
            if self.slots.delete(&scope, &removal.key)? {
                outcome.slots_removed += 1;
            }
        }

        for update in &extraction.slot_updates {
            let result = self.slots.set(
                &scope,
                SetSlot {
                    key: update.key.clone(),
                    value: update.value.clone(),
                    category: update.category.clone(),
                    source: Some(SlotSource::AutoCapture),
                    confidence: Some(update.confidence),
                    expires_at: None,
                },
            );
            match result {
                Ok(_) => outcome.slots_updated += 1,
                Err(err) => tracing::warn!(key = %update.key, error = %err, "slot update failed, continuing"),
            }
        }

        for memory in &extraction.memories {
            if let Err(err) = self.store_memory(&scope, &event, &noise_filter, memory).await {
                tracing::warn!(error = %err, "memory persistence failed, continuing");
                continue;
            }
            outcome.memories_stored += 1;
        }

        Ok(Some(outcome))
    }

    async fn store_memory(
        &self,
        scope: &ScopeKey,
        event: &AutoCaptureEvent,
        noise_filter: &NoiseFilter,
        memory: &memsys_llm::MemoryCandidate,
    ) -> anyhow::Result<()> {
        let namespace = if memory.namespace.is_empty() {
            noise_filter.target_namespace().to_string()
        } else {
            memory.namespace.clone()
        };
        let vector = self.embed.embed(&memory.text).await;

        let filter = VectorFilter::new().eq("namespace", namespace.clone());
        let neighbours = self
            .vector
            .search(vector.clone(), NEIGHBOUR_SEARCH_LIMIT, Some(filter))
            .await?;
        let duplicate_id = find_duplicate(&neighbours, self.dedupe_threshold);

        let now = Utc::now();
        let id = duplicate_id.unwrap_or_else(MemoryPayload::new_id);
        let payload = MemoryPayload {
            text: memory.text.clone(),
            namespace,
            source_agent: event.agent.clone(),
            source_type: SourceType::AutoCapture,
            user_id: scope.user.clone(),
            timestamp: now,
            updated_at: now,
            session_id: Some(event.session_id.clone()),
            confidence: Some(memory.confidence),
            tags: Vec::new(),
            metadata: Value::Null,
        };

        self.vector
            .upsert(vec![VectorPoint {
                id,
                vector,
                payload: serde_json::to_value(&payload)?,
            }])
            .await?;
        Ok(())
    }
}

struct CaptureGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for CaptureGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
