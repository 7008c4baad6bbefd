//! Host lifecycle events consumed by the memory subsystem (§6), shaped after
//! the teacher's `BackendEvent` notification enum.

use memsys_pipeline::Message;

/// Fired before the agent runtime starts a turn. Carries the current
/// message list and system prompt; `AutoRecall::inject` may hand back an
/// overridden prompt.
#[derive(Debug, Clone)]
pub struct BeforeAgentStart {
    pub user: String,
    pub agent: String,
    pub system_prompt: String,
    pub messages: Vec<Message>,
}

/// Fired once the agent runtime has produced its final response. Carries
/// the full message list for the turn, consumed by AutoCapture.
#[derive(Debug, Clone)]
pub struct AgentEnd {
    pub session_id: String,
    pub agent: String,
    pub messages: Vec<Message>,
}
