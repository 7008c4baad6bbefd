//! Versioned structured key-value store (C2 SlotStore).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use redb::{ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use memsys_scope::ScopeKey;

use crate::db::StoreHandle;
use crate::error::{StoreError, StoreResult};

const SLOTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("slots");

const KNOWN_CATEGORIES: [&str; 4] = ["profile", "preferences", "project", "environment"];

/// Infer a slot's category from the first dot-segment of its key (§3).
pub fn infer_category(key: &str) -> String {
    let prefix = key.split('.').next().unwrap_or(key);
    if KNOWN_CATEGORIES.contains(&prefix) {
        prefix.to_string()
    } else {
        "custom".to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotSource {
    AutoCapture,
    Manual,
    Tool,
}

impl Default for SlotSource {
    fn default() -> Self {
        SlotSource::Manual
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub user: String,
    pub agent: String,
    pub key: String,
    pub category: String,
    pub value: Value,
    pub source: SlotSource,
    pub confidence: f32,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Slot {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp < now)
    }
}

/// Arguments to [`SlotStore::set`].
#[derive(Debug, Clone, Default)]
pub struct SetSlot {
    pub key: String,
    pub value: Value,
    pub category: Option<String>,
    pub source: Option<SlotSource>,
    pub confidence: Option<f32>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub category: Option<String>,
    pub prefix: Option<String>,
}

fn storage_key(scope: &ScopeKey, key: &str) -> String {
    format!("{}\u{0}{}\u{0}{}", scope.user, scope.agent, key)
}

fn parse_storage_key(raw: &str) -> Option<(&str, &str, &str)> {
    let mut parts = raw.splitn(3, '\u{0}');
    let user = parts.next()?;
    let agent = parts.next()?;
    let key = parts.next()?;
    Some((user, agent, key))
}

pub struct SlotStore {
    handle: StoreHandle,
}

impl SlotStore {
    pub fn new(handle: StoreHandle) -> StoreResult<Self> {
        {
            let tx = handle.db().begin_write()?;
            tx.open_table(SLOTS_TABLE)?;
            tx.commit()?;
        }
        Ok(Self { handle })
    }

    /// Upsert a slot. Atomic with respect to concurrent callers on the same
    /// key because it runs inside a single redb write transaction (§4.1,
    /// §5 ordering guarantees).
    pub fn set(&self, scope: &ScopeKey, args: SetSlot) -> StoreResult<Slot> {
        if args.key.is_empty() {
            return Err(StoreError::Validation("slot key must not be empty".into()));
        }
        let now = Utc::now();
        let storage_key = storage_key(scope, &args.key);

        let tx = self.handle.db().begin_write()?;
        let slot = {
            let mut table = tx.open_table(SLOTS_TABLE)?;
            let previous = match table.get(storage_key.as_str())? {
                Some(raw) => Some(serde_json::from_slice::<Slot>(raw.value())?),
                None => None,
            };

            let category = args
                .category
                .unwrap_or_else(|| infer_category(&args.key));
            let slot = match previous {
                Some(prev) => Slot {
                    user: scope.user.clone(),
                    agent: scope.agent.clone(),
                    key: args.key.clone(),
                    category,
                    value: args.value,
                    source: args.source.unwrap_or_default(),
                    confidence: args.confidence.unwrap_or(1.0),
                    version: prev.version + 1,
                    created_at: prev.created_at,
                    updated_at: now,
                    expires_at: args.expires_at,
                },
                None => Slot {
                    user: scope.user.clone(),
                    agent: scope.agent.clone(),
                    key: args.key.clone(),
                    category,
                    value: args.value,
                    source: args.source.unwrap_or_default(),
                    confidence: args.confidence.unwrap_or(1.0),
                    version: 1,
                    created_at: now,
                    updated_at: now,
                    expires_at: args.expires_at,
                },
            };

            let bytes = serde_json::to_vec(&slot)?;
            table.insert(storage_key.as_str(), bytes.as_slice())?;
            slot
        };
        tx.commit()?;
        tracing::debug!(key = %slot.key, version = slot.version, "slot upserted");
        Ok(slot)
    }

    /// Remove all expired rows under `scope` (§4.1: invoked before any read).
    pub fn clean_expired(&self, scope: &ScopeKey) -> StoreResult<usize> {
        let now = Utc::now();
        let tx = self.handle.db().begin_write()?;
        let removed = {
            let mut table = tx.open_table(SLOTS_TABLE)?;
            let expired_keys: Vec<String> = table
                .iter()?
                .filter_map(|r| r.ok())
                .filter_map(|(k, v)| {
                    let raw_key = k.value().to_string();
                    let (user, agent, _) = parse_storage_key(&raw_key)?;
                    if user != scope.user || agent != scope.agent {
                        return None;
                    }
                    let slot: Slot = serde_json::from_slice(v.value()).ok()?;
                    if slot.is_expired(now) {
                        Some(raw_key)
                    } else {
                        None
                    }
                })
                .collect();
            for k in &expired_keys {
                table.remove(k.as_str())?;
            }
            expired_keys.len()
        };
        tx.commit()?;
        if removed > 0 {
            tracing::debug!(removed, "expired slots cleaned");
        }
        Ok(removed)
    }

    pub fn get(&self, scope: &ScopeKey, key: &str) -> StoreResult<Option<Slot>> {
        self.clean_expired(scope)?;
        let storage_key = storage_key(scope, key);
        let tx = self.handle.db().begin_read()?;
        let table = tx.open_table(SLOTS_TABLE)?;
        match table.get(storage_key.as_str())? {
            Some(raw) => Ok(Some(serde_json::from_slice(raw.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_by_category(&self, scope: &ScopeKey, category: &str) -> StoreResult<Vec<Slot>> {
        self.clean_expired(scope)?;
        let mut slots = self.scan_scope(scope)?;
        slots.retain(|s| s.category == category);
        slots.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(slots)
    }

    pub fn all(&self, scope: &ScopeKey) -> StoreResult<Vec<Slot>> {
        self.clean_expired(scope)?;
        let mut slots = self.scan_scope(scope)?;
        slots.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.key.cmp(&b.key)));
        Ok(slots)
    }

    pub fn list(&self, scope: &ScopeKey, filter: ListFilter) -> StoreResult<Vec<Slot>> {
        self.clean_expired(scope)?;
        let mut slots = self.scan_scope(scope)?;
        if let Some(category) = &filter.category {
            slots.retain(|s| &s.category == category);
        }
        if let Some(prefix) = &filter.prefix {
            slots.retain(|s| s.key.starts_with(prefix.as_str()));
        }
        slots.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.key.cmp(&b.key)));
        Ok(slots)
    }

    pub fn delete(&self, scope: &ScopeKey, key: &str) -> StoreResult<bool> {
        let storage_key = storage_key(scope, key);
        let tx = self.handle.db().begin_write()?;
        let removed = {
            let mut table = tx.open_table(SLOTS_TABLE)?;
            table.remove(storage_key.as_str())?.is_some()
        };
        tx.commit()?;
        Ok(removed)
    }

    /// Two-level `category → key → value` mapping, skipping internal keys
    /// (leading `_`) per §4.1.
    pub fn current_state(&self, scope: &ScopeKey) -> StoreResult<BTreeMap<String, BTreeMap<String, Value>>> {
        let slots = self.all(scope)?;
        let mut state: BTreeMap<String, BTreeMap<String, Value>> = BTreeMap::new();
        for slot in slots {
            if slot.key.starts_with('_') {
                continue;
            }
            state
                .entry(slot.category.clone())
                .or_default()
                .insert(slot.key.clone(), slot.value.clone());
        }
        Ok(state)
    }

    pub fn count(&self, scope: &ScopeKey) -> StoreResult<usize> {
        Ok(self.scan_scope(scope)?.len())
    }

    fn scan_scope(&self, scope: &ScopeKey) -> StoreResult<Vec<Slot>> {
        let tx = self.handle.db().begin_read()?;
        let table = tx.open_table(SLOTS_TABLE)?;
        let mut out = Vec::new();
        for row in table.iter()? {
            let (k, v) = row?;
            let raw_key = k.value().to_string();
            let Some((user, agent, _)) = parse_storage_key(&raw_key) else {
                continue;
            };
            if user != scope.user || agent != scope.agent {
                continue;
            }
            out.push(serde_json::from_slice::<Slot>(v.value())?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::StoreHandle;
    use memsys_scope::ScopeTier;

    fn scope() -> ScopeKey {
        ScopeKey::resolve("session", "assistant", ScopeTier::Private)
    }

    fn store() -> (tempfile::TempDir, SlotStore) {
        let dir = tempfile::tempdir().unwrap();
        let handle = StoreHandle::open(dir.path().join("store.redb")).unwrap();
        (dir, SlotStore::new(handle).unwrap())
    }

    #[test]
    fn version_bump_on_update() {
        let (_dir, store) = store();
        let scope = scope();
        let first = store
            .set(
                &scope,
                SetSlot {
                    key: "profile.name".into(),
                    value: Value::String("MrC".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(first.version, 1);

        let second = store
            .set(
                &scope,
                SetSlot {
                    key: "profile.name".into(),
                    value: Value::String("MrC Dep Trai".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(second.version, 2);

        let fetched = store.get(&scope, "profile.name").unwrap().unwrap();
        assert_eq!(fetched.value, Value::String("MrC Dep Trai".into()));
        assert_eq!(fetched.version, 2);
    }

    #[test]
    fn category_inference() {
        let (_dir, store) = store();
        let scope = scope();
        let custom = store
            .set(
                &scope,
                SetSlot {
                    key: "hobby.favorite_game".into(),
                    value: Value::String("chess".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(custom.category, "custom");

        let project = store
            .set(
                &scope,
                SetSlot {
                    key: "project.tech_stack".into(),
                    value: serde_json::json!(["TypeScript", "SQLite"]),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(project.category, "project");
    }

    #[test]
    fn ttl_cleanup_hides_expired_slot() {
        let (_dir, store) = store();
        let scope = scope();
        store
            .set(
                &scope,
                SetSlot {
                    key: "temp.x".into(),
                    value: Value::String("gone".into()),
                    expires_at: Some(Utc::now() - chrono::Duration::days(1)),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(store.get(&scope, "temp.x").unwrap().is_none());
    }

    #[test]
    fn scope_isolation_between_users() {
        let (_dir, store) = store();
        let scope_a = ScopeKey::resolve("session-a", "assistant", ScopeTier::Private);
        let scope_b = ScopeKey::resolve("session-b", "assistant", ScopeTier::Private);
        // Both sessions normalise to the same private user, so emulate two
        // distinct users by using different agents instead.
        let scope_a = ScopeKey {
            user: "alice".into(),
            ..scope_a
        };
        let scope_b = ScopeKey {
            user: "bob".into(),
            ..scope_b
        };

        store
            .set(
                &scope_a,
                SetSlot {
                    key: "profile.name".into(),
                    value: Value::String("Alice".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        store
            .set(
                &scope_b,
                SetSlot {
                    key: "profile.name".into(),
                    value: Value::String("Bob".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(
            store.get(&scope_a, "profile.name").unwrap().unwrap().value,
            Value::String("Alice".into())
        );
        assert_eq!(
            store.get(&scope_b, "profile.name").unwrap().unwrap().value,
            Value::String("Bob".into())
        );
    }

    #[test]
    fn current_state_skips_internal_keys() {
        let (_dir, store) = store();
        let scope = scope();
        store
            .set(
                &scope,
                SetSlot {
                    key: "profile.name".into(),
                    value: Value::String("MrC".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        store
            .set(
                &scope,
                SetSlot {
                    key: "_internal.bookkeeping".into(),
                    value: Value::Bool(true),
                    ..Default::default()
                },
            )
            .unwrap();

        let state = store.current_state(&scope).unwrap();
        assert!(state.get("profile").unwrap().contains_key("profile.name"));
        assert!(!state.contains_key("custom"));
    }

    #[test]
    fn delete_returns_true_only_when_row_removed() {
        let (_dir, store) = store();
        let scope = scope();
        assert!(!store.delete(&scope, "missing.key").unwrap());
        store
            .set(
                &scope,
                SetSlot {
                    key: "profile.name".into(),
                    value: Value::String("MrC".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(store.delete(&scope, "profile.name").unwrap());
        assert!(!store.delete(&scope, "profile.name").unwrap());
    }
}
