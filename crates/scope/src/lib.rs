//! Session-to-storage-coordinate resolution (C1 ScopeKey).
//!
//! Pure parsing and resolution — no I/O, no persistence. Every other
//! component treats a [`ScopeKey`] as the canonical address under which a
//! slot, entity, or edge is stored.

use serde::{Deserialize, Serialize};

/// Reserved user-component marker for the team tier.
pub const TEAM_MARKER: &str = "__team__";
/// Reserved user/agent-component marker for the public tier.
pub const PUBLIC_MARKER: &str = "__public__";
/// Canonical user value session-derived ids normalise to.
pub const DEFAULT_USER: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeTier {
    Private,
    Team,
    Public,
}

impl ScopeTier {
    pub fn label(self) -> &'static str {
        match self {
            ScopeTier::Private => "private",
            ScopeTier::Team => "team",
            ScopeTier::Public => "public",
        }
    }

    /// Tiers queried, in order, for the AutoRecall scope merge (§4.10):
    /// later entries win ties only when strictly fresher.
    pub fn merge_order() -> [ScopeTier; 3] {
        [ScopeTier::Private, ScopeTier::Team, ScopeTier::Public]
    }
}

impl std::str::FromStr for ScopeTier {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(ScopeTier::Private),
            "team" => Ok(ScopeTier::Team),
            "public" => Ok(ScopeTier::Public),
            other => Err(ScopeError::UnknownTier(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScopeError {
    #[error("unknown scope tier: {0}")]
    UnknownTier(String),
}

/// Storage coordinates for a slot, entity, or edge: `(user, agent)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeKey {
    pub user: String,
    pub agent: String,
}

impl ScopeKey {
    /// Resolve a session-derived `(user, agent)` pair plus a sharing tier to
    /// storage coordinates (§3). The user component of session-derived ids is
    /// always normalised to [`DEFAULT_USER`] except for the reserved markers,
    /// so ephemeral session ids never fragment storage.
    pub fn resolve(user: &str, agent: &str, tier: ScopeTier) -> Self {
        let user = normalize_user(user);
        match tier {
            ScopeTier::Private => ScopeKey {
                user,
                agent: agent.to_string(),
            },
            ScopeTier::Team => ScopeKey {
                user,
                agent: TEAM_MARKER.to_string(),
            },
            ScopeTier::Public => ScopeKey {
                user: PUBLIC_MARKER.to_string(),
                agent: PUBLIC_MARKER.to_string(),
            },
        }
    }

    pub fn tier(&self) -> ScopeTier {
        if self.user == PUBLIC_MARKER && self.agent == PUBLIC_MARKER {
            ScopeTier::Public
        } else if self.agent == TEAM_MARKER {
            ScopeTier::Team
        } else {
            ScopeTier::Private
        }
    }
}

/// Normalise a session-derived user component to the canonical value,
/// preserving the two reserved markers untouched.
fn normalize_user(user: &str) -> String {
    if user == TEAM_MARKER || user == PUBLIC_MARKER || user.is_empty() {
        if user.is_empty() {
            DEFAULT_USER.to_string()
        } else {
            user.to_string()
        }
    } else {
        DEFAULT_USER.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_scope_keeps_user_and_agent() {
        let key = ScopeKey::resolve("session-abc123", "assistant", ScopeTier::Private);
        assert_eq!(key.user, DEFAULT_USER);
        assert_eq!(key.agent, "assistant");
        assert_eq!(key.tier(), ScopeTier::Private);
    }

    #[test]
    fn team_scope_uses_team_marker_for_agent() {
        let key = ScopeKey::resolve("session-xyz", "assistant", ScopeTier::Team);
        assert_eq!(key.agent, TEAM_MARKER);
        assert_eq!(key.tier(), ScopeTier::Team);
    }

    #[test]
    fn public_scope_ignores_input_user_and_agent() {
        let key = ScopeKey::resolve("session-xyz", "assistant", ScopeTier::Public);
        assert_eq!(key.user, PUBLIC_MARKER);
        assert_eq!(key.agent, PUBLIC_MARKER);
        assert_eq!(key.tier(), ScopeTier::Public);
    }

    #[test]
    fn distinct_sessions_normalise_to_same_private_user() {
        let a = ScopeKey::resolve("session-one", "assistant", ScopeTier::Private);
        let b = ScopeKey::resolve("session-two", "assistant", ScopeTier::Private);
        assert_eq!(a.user, b.user);
    }

    #[test]
    fn tier_from_str_roundtrips_label() {
        for tier in ScopeTier::merge_order() {
            assert_eq!(tier.label().parse::<ScopeTier>().unwrap(), tier);
        }
    }

    #[test]
    fn tier_from_str_rejects_unknown() {
        assert!("nonsense".parse::<ScopeTier>().is_err());
    }
}
