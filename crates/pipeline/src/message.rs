//! Conversation messages and the content-polymorphism flattener (§4.7, §9).

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Content,
}

/// Message content as it may arrive from the host: a plain string, an
/// ordered list of typed blocks, or a nested object. This is a sum type on
/// purpose — an exhaustive flattener is the only thing that keeps
/// [`extract_message_text`] from emitting `[object Object]` (§9).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Blocks(Vec<ContentBlock>),
    Nested(Value),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ToolUse { name: String, #[serde(default)] input: Value },
    ToolResult { #[serde(default)] content: Value },
    Image { #[serde(default)] source: Value },
    ImageUrl { #[serde(default)] url: Option<String> },
}

/// Flatten arbitrary message content into a short display string. Must
/// never return the substring `[object Object]` for any JSON-serialisable
/// input (§4.7, §8 testable property).
pub fn extract_message_text(content: &Content) -> String {
    match content {
        Content::Text(text) => text.clone(),
        Content::Blocks(blocks) => blocks.iter().map(block_to_text).collect::<Vec<_>>().join(" "),
        Content::Nested(value) => nested_to_text(value),
    }
}

fn block_to_text(block: &ContentBlock) -> String {
    match block {
        ContentBlock::Text { text } => text.clone(),
        ContentBlock::ToolUse { name, .. } => format!("[Tool: {name}]"),
        ContentBlock::ToolResult { .. } => "[Tool Result]".to_string(),
        ContentBlock::Image { .. } => "[Image]".to_string(),
        ContentBlock::ImageUrl { .. } => "[Image]".to_string(),
    }
}

fn nested_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => {
            if let Some(Value::String(text)) = map.get("text") {
                return text.clone();
            }
            if let Some(nested) = map.get("content") {
                return nested_to_text(nested);
            }
            serde_json::to_string(value).unwrap_or_default()
        }
        Value::Array(items) => items.iter().map(nested_to_text).collect::<Vec<_>>().join(" "),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}
