//! Token-budgeted message selection (C8 ContextWindow).

use crate::message::{Message, Role, extract_message_text};

#[derive(Debug, Clone, Copy)]
pub struct ContextWindowConfig {
    pub max_conversation_tokens: usize,
    pub absolute_max_messages: usize,
    pub token_estimate_divisor: usize,
}

impl Default for ContextWindowConfig {
    fn default() -> Self {
        Self {
            max_conversation_tokens: 12_000,
            absolute_max_messages: 200,
            token_estimate_divisor: 4,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SelectionStats {
    pub total_messages: usize,
    pub filtered_messages: usize,
    pub selected_messages: usize,
    pub estimated_tokens: usize,
    pub budget_used_percent: f32,
}

#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub selected: Vec<Message>,
    pub stats: SelectionStats,
}

/// Estimate a message's token cost as `ceil(len("role: text") / divisor)`.
fn estimate_tokens(message: &Message, divisor: usize) -> usize {
    let role = match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };
    let text = extract_message_text(&message.content);
    let rendered = format!("{role}: {text}");
    rendered.len().div_ceil(divisor.max(1))
}

/// Produce the subset of messages to feed to the extractor (§4.7).
///
/// (1) drop everything but user/assistant messages; (2) cap at
/// `absolute_max_messages`, keeping the most recent; (3) walk newest to
/// oldest accumulating until the next message would exceed
/// `max_conversation_tokens`; (4) return the kept messages in original
/// chronological order.
pub fn select_messages_within_budget(messages: &[Message], config: ContextWindowConfig) -> Selection {
    let total_messages = messages.len();

    let mut filtered: Vec<&Message> = messages
        .iter()
        .filter(|m| matches!(m.role, Role::User | Role::Assistant))
        .collect();
    let filtered_messages = filtered.len();

    if filtered.len() > config.absolute_max_messages {
        let drop = filtered.len() - config.absolute_max_messages;
        filtered.drain(0..drop);
    }

    let mut budget_used = 0usize;
    let mut kept_from_newest: Vec<&Message> = Vec::new();
    for message in filtered.iter().rev() {
        let cost = estimate_tokens(message, config.token_estimate_divisor);
        if budget_used + cost > config.max_conversation_tokens {
            break;
        }
        budget_used += cost;
        kept_from_newest.push(message);
    }
    kept_from_newest.reverse();

    let selected: Vec<Message> = kept_from_newest.into_iter().cloned().collect();
    let selected_messages = selected.len();
    let budget_used_percent = if config.max_conversation_tokens == 0 {
        0.0
    } else {
        (budget_used as f32 / config.max_conversation_tokens as f32) * 100.0
    };

    Selection {
        selected,
        stats: SelectionStats {
            total_messages,
            filtered_messages,
            selected_messages,
            estimated_tokens: budget_used,
            budget_used_percent,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Content;

    fn msg(role: Role, text: &str) -> Message {
        Message {
            role,
            content: Content::Text(text.to_string()),
        }
    }

    #[test]
    fn drops_non_user_assistant_messages() {
        let messages = vec![
            msg(Role::System, "you are a bot"),
            msg(Role::User, "hi"),
            msg(Role::Tool, "tool output"),
            msg(Role::Assistant, "hello"),
        ];
        let selection = select_messages_within_budget(&messages, ContextWindowConfig::default());
        assert_eq!(selection.stats.filtered_messages, 2);
        assert!(selection.selected.iter().all(|m| matches!(m.role, Role::User | Role::Assistant)));
    }

    #[test]
    fn preserves_chronological_order() {
        let messages = vec![
            msg(Role::User, "first"),
            msg(Role::Assistant, "second"),
            msg(Role::User, "third"),
        ];
        let selection = select_messages_within_budget(&messages, ContextWindowConfig::default());
        let texts: Vec<String> = selection.selected.iter().map(|m| extract_message_text(&m.content)).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn caps_at_absolute_max_messages() {
        let messages: Vec<Message> = (0..10).map(|i| msg(Role::User, &format!("m{i}"))).collect();
        let config = ContextWindowConfig {
            absolute_max_messages: 3,
            max_conversation_tokens: 1_000_000,
            token_estimate_divisor: 4,
        };
        let selection = select_messages_within_budget(&messages, config);
        assert_eq!(selection.selected.len(), 3);
        let texts: Vec<String> = selection.selected.iter().map(|m| extract_message_text(&m.content)).collect();
        assert_eq!(texts, vec!["m7", "m8", "m9"]);
    }

    #[test]
    fn respects_token_budget() {
        let messages = vec![
            msg(Role::User, &"a".repeat(100)),
            msg(Role::Assistant, &"b".repeat(100)),
            msg(Role::User, &"c".repeat(100)),
        ];
        let config = ContextWindowConfig {
            absolute_max_messages: 200,
            max_conversation_tokens: 30,
            token_estimate_divisor: 4,
        };
        let selection = select_messages_within_budget(&messages, config);
        assert!(selection.stats.estimated_tokens <= config.max_conversation_tokens);
    }

    #[test]
    fn drops_sole_message_that_alone_exceeds_budget() {
        let messages = vec![msg(Role::User, &"a".repeat(1000))];
        let config = ContextWindowConfig {
            absolute_max_messages: 200,
            max_conversation_tokens: 30,
            token_estimate_divisor: 4,
        };
        let selection = select_messages_within_budget(&messages, config);
        assert!(selection.selected.is_empty());
        assert_eq!(selection.stats.estimated_tokens, 0);
    }
}
