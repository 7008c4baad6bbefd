//! Adapter to the external vector DB (C4 VectorGateway).

use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, Distance, FieldType, Filter,
    PointStruct, ScoredPoint, SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};

use crate::error::{VectorError, VectorResult};
use crate::filter::{FilterTerm, VectorFilter};
use crate::retry::{Retryable, RetryPolicy};

/// Payload keyword fields indexed at collection bootstrap (§4.3).
const PAYLOAD_INDICES: [&str; 4] = ["namespace", "source_agent", "source_type", "userId"];

#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub payload: serde_json::Value,
}

pub struct VectorGateway {
    client: Qdrant,
    collection: String,
    vector_size: u64,
    retry: RetryPolicy,
}

impl VectorGateway {
    pub fn new(url: &str, collection: impl Into<String>, vector_size: u64, retry: RetryPolicy) -> VectorResult<Self> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| VectorError::StorageUnavailable(e.to_string()))?;
        Ok(Self {
            client,
            collection: collection.into(),
            vector_size,
            retry,
        })
    }

    /// Create the collection if missing, then declare keyword payload
    /// indices. Index-creation failures are logged but not fatal — they may
    /// already exist (§4.3).
    pub async fn ensure_collection(&self) -> VectorResult<()> {
        let exists = self
            .client
            .collection_exists(self.collection.clone())
            .await
            .map_err(|e| VectorError::StorageUnavailable(e.to_string()))?;

        if !exists {
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(self.collection.clone())
                        .vectors_config(VectorParamsBuilder::new(self.vector_size, Distance::Cosine)),
                )
                .await
                .map_err(|e| VectorError::StorageUnavailable(e.to_string()))?;
            tracing::info!(collection = %self.collection, "vector collection created");
        }

        for field in PAYLOAD_INDICES {
            let result = self
                .client
                .create_field_index(CreateFieldIndexCollectionBuilder::new(
                    self.collection.clone(),
                    field,
                    FieldType::Keyword,
                ))
                .await;
            if let Err(err) = result {
                tracing::warn!(field, error = %err, "payload index creation failed (may already exist)");
            }
        }
        Ok(())
    }

    pub async fn upsert(&self, points: Vec<VectorPoint>) -> VectorResult<()> {
        if points.is_empty() {
            return Ok(());
        }
        let collection = self.collection.clone();
        self.retry
            .run(|| {
                let collection = collection.clone();
                let points = points.clone();
                async move {
                    let qdrant_points = points
                        .into_iter()
                        .map(|p| {
                            let payload: Payload = Payload::try_from(p.payload)
                                .map_err(|e| VectorError::Validation(e.to_string()))?;
                            Ok(PointStruct::new(p.id, p.vector, payload))
                        })
                        .collect::<VectorResult<Vec<_>>>()?;
                    self.client
                        .upsert_points(UpsertPointsBuilder::new(collection, qdrant_points))
                        .await
                        .map_err(|e| classify(e))?;
                    Ok(())
                }
            })
            .await
    }

    pub async fn search(&self, vector: Vec<f32>, limit: u64, filter: Option<VectorFilter>) -> VectorResult<Vec<SearchHit>> {
        let collection = self.collection.clone();
        self.retry
            .run(|| {
                let collection = collection.clone();
                let vector = vector.clone();
                let filter = filter.clone();
                async move {
                    let mut builder = SearchPointsBuilder::new(collection, vector, limit).with_payload(true);
                    if let Some(filter) = filter {
                        builder = builder.filter(to_qdrant_filter(&filter));
                    }
                    let response = self.client.search_points(builder).await.map_err(classify)?;
                    Ok(response.result.into_iter().map(from_scored_point).collect())
                }
            })
            .await
    }

    pub async fn delete_by_filter(&self, filter: VectorFilter) -> VectorResult<()> {
        self.client
            .delete_points(
                qdrant_client::qdrant::DeletePointsBuilder::new(self.collection.clone())
                    .points(to_qdrant_filter(&filter)),
            )
            .await
            .map_err(|e| VectorError::StorageUnavailable(e.to_string()))?;
        Ok(())
    }
}

fn to_qdrant_filter(filter: &VectorFilter) -> Filter {
    Filter {
        must: filter.must.iter().map(to_condition).collect(),
        ..Default::default()
    }
}

fn to_condition(term: &FilterTerm) -> Condition {
    match term {
        FilterTerm::Match { key, r#match } => Condition::matches(key, json_to_qdrant(&r#match.value)),
        FilterTerm::Should { should } => {
            let inner = Filter {
                should: should.iter().map(to_condition).collect(),
                ..Default::default()
            };
            Condition::filter(inner)
        }
    }
}

fn json_to_qdrant(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn from_scored_point(point: ScoredPoint) -> SearchHit {
    let id = point
        .id
        .as_ref()
        .and_then(|id| id.point_id_options.as_ref())
        .map(point_id_to_string)
        .unwrap_or_default();
    let payload = payload_to_json(point.payload);
    SearchHit {
        id,
        score: point.score,
        payload,
    }
}

/// Render a point id as the bare value qdrant stores it under, not a debug
/// string — this id round-trips into a later upsert on the dedup path.
fn point_id_to_string(opts: &PointIdOptions) -> String {
    match opts {
        PointIdOptions::Num(n) => n.to_string(),
        PointIdOptions::Uuid(u) => u.clone(),
    }
}

fn payload_to_json(payload: std::collections::HashMap<String, QdrantValue>) -> serde_json::Value {
    let map = payload
        .into_iter()
        .map(|(k, v)| (k, qdrant_value_to_json(v)))
        .collect::<serde_json::Map<_, _>>();
    serde_json::Value::Object(map)
}

fn qdrant_value_to_json(value: QdrantValue) -> serde_json::Value {
    use qdrant_client::qdrant::value::Kind;
    match value.kind {
        Some(Kind::StringValue(s)) => serde_json::Value::String(s),
        Some(Kind::IntegerValue(i)) => serde_json::Value::from(i),
        Some(Kind::DoubleValue(d)) => serde_json::json!(d),
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(b),
        Some(Kind::NullValue(_)) | None => serde_json::Value::Null,
        Some(Kind::ListValue(list)) => {
            serde_json::Value::Array(list.values.into_iter().map(qdrant_value_to_json).collect())
        }
        Some(Kind::StructValue(s)) => payload_to_json(s.fields),
    }
}

fn classify(err: qdrant_client::QdrantError) -> VectorError {
    let message = err.to_string();
    let retryable = message.contains("timeout")
        || message.contains("connect")
        || message.contains("refused")
        || message.contains("abort")
        || message.contains("unavailable");
    if retryable {
        VectorError::RemoteTransient(message)
    } else {
        VectorError::StorageUnavailable(message)
    }
}

impl Retryable for VectorError {
    fn is_retryable(&self) -> bool {
        matches!(self, VectorError::RemoteTransient(_))
    }
}
