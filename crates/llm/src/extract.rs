//! JSON-block extraction from free-text LLM replies.

/// Extract the first valid JSON object from `response` and deserialise it as
/// `T`. Tries a fenced ` ```json ` block first, then falls back to scanning
/// for the first `{` through the last `}`. Returns `None` if neither
/// strategy yields valid JSON — callers must not crash on this (§4.5).
pub fn extract_json_output<T: serde::de::DeserializeOwned>(response: &str) -> Option<T> {
    if let Some(fence_start) = response.find("```json") {
        let after_fence = &response[fence_start + "```json".len()..];
        if let Some(json_start) = after_fence.find(|c: char| !c.is_whitespace()) {
            let json_body = &after_fence[json_start..];
            if let Some(fence_end) = json_body.find("```") {
                let json_str = json_body[..fence_end].trim();
                if let Ok(val) = serde_json::from_str(json_str) {
                    return Some(val);
                }
            }
        }
    }

    let trimmed = response.trim();
    if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed.rfind('}') {
            if end > start {
                let candidate = &trimmed[start..=end];
                if let Ok(val) = serde_json::from_str(candidate) {
                    return Some(val);
                }
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        action: String,
    }

    #[test]
    fn extracts_fenced_json() {
        let raw = "Sure!\n```json\n{\"action\":\"go\"}\n```";
        let out: Sample = extract_json_output(raw).unwrap();
        assert_eq!(out.action, "go");
    }

    #[test]
    fn extracts_bare_json() {
        let raw = "here you go: {\"action\":\"go\"} thanks";
        let out: Sample = extract_json_output(raw).unwrap();
        assert_eq!(out.action, "go");
    }

    #[test]
    fn returns_none_on_garbage() {
        let out: Option<Sample> = extract_json_output("no json here at all");
        assert!(out.is_none());
    }
}
