pub mod client;
pub mod extract;
pub mod extractor;

pub use client::{ChatMessage, ChatRole, LlmClient};
pub use extract::extract_json_output;
pub use extractor::{
    ExtractionResult, LlmExtractor, MemoryCandidate, RawExtraction, SlotRemoval, SlotUpdate, VOLATILE_STATUS_KEYS,
};
