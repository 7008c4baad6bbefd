//! Agent blocklist, noise patterns, and namespace routing (C9 NoiseFilter).

use regex::Regex;
use std::sync::LazyLock;

const BLOCKED_AGENTS: [&str; 1] = ["system"];

/// AutoCapture's own synthetic-message markers (§4.9 step 3, §9). Kept
/// separate from the blank-line pattern below: an empty message is noise
/// (skip it), but it is not evidence of a self-triggering loop.
const INTERNAL_MARKER_PATTERNS: [&str; 2] = [r"(?i)\[autocapture\]", r"(?i)memory (stored|updated)"];

const GENERAL_NOISE_PATTERNS: [&str; 1] = [r"(?i)^\s*$"];

const TRADING_SIGNAL_PATTERNS: [&str; 2] = [r"(?i)\b(buy|sell)\s+signal\b", r"(?i)\bentry\s+price\b"];

static INTERNAL_MARKERS: LazyLock<Vec<Regex>> =
    LazyLock::new(|| INTERNAL_MARKER_PATTERNS.iter().map(|p| Regex::new(p).unwrap()).collect());
static GENERAL_NOISE: LazyLock<Vec<Regex>> =
    LazyLock::new(|| GENERAL_NOISE_PATTERNS.iter().map(|p| Regex::new(p).unwrap()).collect());
static TRADING_NOISE: LazyLock<Vec<Regex>> =
    LazyLock::new(|| TRADING_SIGNAL_PATTERNS.iter().map(|p| Regex::new(p).unwrap()).collect());

/// The full closed set of memory namespaces any agent routes into (§4.5,
/// §4.8) — used to tell the extractor's LLM prompt which namespaces exist.
pub const KNOWN_NAMESPACES: [&str; 4] = ["agent_decisions", "user_profile", "project_context", "trading_signals"];

/// Per-agent namespace routing table (§4.8). First entry is the
/// auto-capture default destination.
fn namespace_routes(agent: &str) -> &'static [&'static str] {
    match agent {
        "assistant" => &["agent_decisions", "user_profile"],
        "scrum" => &["agent_decisions", "project_context"],
        "fullstack" => &["agent_decisions", "project_context"],
        "creator" => &["agent_decisions", "project_context"],
        // Trading content is captured only via explicit tool calls; the
        // auto-capture default is the general decisions namespace.
        "trader" => &["agent_decisions"],
        _ => &["agent_decisions"],
    }
}

/// The full search list for semantic recall, trader's own namespace first.
fn search_routes(agent: &str) -> &'static [&'static str] {
    match agent {
        "trader" => &["trading_signals", "agent_decisions"],
        other => namespace_routes(other),
    }
}

pub struct NoiseFilter {
    agent: String,
}

impl NoiseFilter {
    pub fn new(agent: impl Into<String>) -> Self {
        Self { agent: agent.into() }
    }

    pub fn is_blocked(&self) -> bool {
        BLOCKED_AGENTS.contains(&self.agent.as_str())
    }

    /// True if `text` matches a general noise pattern, or — for the trader
    /// agent specifically — a trading-signal pattern (§4.8).
    pub fn should_skip(&self, text: &str) -> bool {
        if GENERAL_NOISE.iter().any(|re| re.is_match(text)) {
            return true;
        }
        if self.agent == "trader" && TRADING_NOISE.iter().any(|re| re.is_match(text)) {
            return true;
        }
        false
    }

    /// The auto-capture default destination namespace.
    pub fn target_namespace(&self) -> &'static str {
        namespace_routes(&self.agent)[0]
    }

    /// The agent's full namespace search order, used for semantic recall.
    pub fn search_namespaces(&self) -> &'static [&'static str] {
        search_routes(&self.agent)
    }
}

/// True if `text` matches one of AutoCapture's own internal markers (e.g.
/// `[AutoCapture]`, `Memory stored`). Used to prevent AutoCapture from
/// re-triggering on its own synthetic messages (§4.9 step 3, §9).
pub fn contains_internal_markers(text: &str) -> bool {
    INTERNAL_MARKERS.iter().any(|re| re.is_match(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_agent_is_blocked() {
        assert!(NoiseFilter::new("system").is_blocked());
        assert!(!NoiseFilter::new("assistant").is_blocked());
    }

    #[test]
    fn trading_pattern_skips_for_trader_only() {
        let text = "New buy signal detected on BTC";
        assert!(NoiseFilter::new("trader").should_skip(text));
        assert!(!NoiseFilter::new("assistant").should_skip(text));
    }

    #[test]
    fn general_noise_pattern_skips_for_any_agent() {
        assert!(NoiseFilter::new("assistant").should_skip("[AutoCapture] done"));
        assert!(NoiseFilter::new("trader").should_skip("Memory updated successfully"));
    }

    #[test]
    fn trader_auto_capture_routes_to_general_decisions() {
        assert_eq!(NoiseFilter::new("trader").target_namespace(), "agent_decisions");
        assert_eq!(NoiseFilter::new("trader").search_namespaces(), ["trading_signals", "agent_decisions"]);
    }

    #[test]
    fn unknown_agent_falls_back_to_agent_decisions() {
        assert_eq!(NoiseFilter::new("mystery").target_namespace(), "agent_decisions");
    }

    #[test]
    fn blank_text_is_noise_but_not_an_internal_marker() {
        assert!(NoiseFilter::new("assistant").should_skip("   "));
        assert!(!contains_internal_markers("   "));
        assert!(!contains_internal_markers(""));
    }

    #[test]
    fn internal_marker_patterns_are_still_detected() {
        assert!(contains_internal_markers("[AutoCapture] stored 2 memories"));
        assert!(contains_internal_markers("Memory stored successfully"));
        assert!(contains_internal_markers("Memory updated successfully"));
        assert!(!contains_internal_markers("the buyer signed the deal"));
    }
}
