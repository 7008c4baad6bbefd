//! Filter schema consumed by the core and passed through to the remote
//! vector DB (§4.3).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `{must: [{key, match:{value}}, ...]}`, with `{should: [...]}` nested
/// inside a `must` entry for multi-value OR within a single field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorFilter {
    pub must: Vec<FilterTerm>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterTerm {
    Match { key: String, r#match: MatchValue },
    Should { should: Vec<FilterTerm> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchValue {
    pub value: Value,
}

impl VectorFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.must.push(FilterTerm::Match {
            key: key.into(),
            r#match: MatchValue { value: value.into() },
        });
        self
    }

    /// OR across multiple candidate values for a single field (e.g. the
    /// namespace allow-list used by AutoRecall's semantic search).
    pub fn any_of(key: impl Into<String>, values: impl IntoIterator<Item = Value>) -> FilterTerm {
        let key = key.into();
        FilterTerm::Should {
            should: values
                .into_iter()
                .map(|value| FilterTerm::Match {
                    key: key.clone(),
                    r#match: MatchValue { value },
                })
                .collect(),
        }
    }

    pub fn with_term(mut self, term: FilterTerm) -> Self {
        self.must.push(term);
        self
    }
}
