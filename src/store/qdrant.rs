//! Qdrant-backed vector store
//!
//! Catalog text attributes are inconsistently cased, and Qdrant keyword and
//! text matches are case-sensitive. Upsert therefore writes a `facets`
//! object holding lower-cased copies of the filterable attributes (and a
//! numeric price), and every compiled clause targets `facets.<key>`.

use async_trait::async_trait;
use qdrant_client::qdrant::{
    value::Kind, Condition, CountPointsBuilder, CreateCollectionBuilder,
    CreateFieldIndexCollectionBuilder, Distance, FieldType, Filter, ListValue, PointId,
    PointStruct, Range, ScoredPoint, SearchPointsBuilder, Struct, UpsertPointsBuilder,
    Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::{Result, ShopError};
use crate::filter::{Clause, FilterExpr};
use crate::store::{ScoreKind, StoreConfig, VectorStore};
use crate::types::{FilterField, Metadata, ProductRecord, StoreHit};

/// Payload key holding the original item id (point ids are UUIDs)
const ITEM_ID_KEY: &str = "item_id";
/// Payload object with lower-cased filter copies
const FACETS_KEY: &str = "facets";

const TEXT_FACETS: [FilterField; 4] = [
    FilterField::Category,
    FilterField::Color,
    FilterField::Brand,
    FilterField::Gender,
];

pub struct QdrantStore {
    client: Qdrant,
    collection: String,
    score: ScoreKind,
}

impl QdrantStore {
    /// Build the client. No request is made until first use.
    pub fn connect(config: &StoreConfig) -> Result<Self> {
        let mut builder = Qdrant::from_url(&config.url).timeout(config.timeout());
        if let Some(key) = config.api_key.as_ref().filter(|k| !k.is_empty()) {
            builder = builder.api_key(key.clone());
        }
        let client = builder
            .build()
            .map_err(|e| ShopError::Store(format!("failed to create Qdrant client: {}", e)))?;

        Ok(Self {
            client,
            collection: config.collection.clone(),
            score: config.score,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Create the collection and its payload indexes if missing
    pub async fn ensure_collection(&self, dimension: usize) -> Result<()> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(store_err)?;
        if exists {
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(dimension as u64, Distance::Cosine)),
            )
            .await
            .map_err(store_err)?;

        for field in TEXT_FACETS {
            self.client
                .create_field_index(CreateFieldIndexCollectionBuilder::new(
                    &self.collection,
                    facet_key(field.payload_key()),
                    FieldType::Keyword,
                ))
                .await
                .map_err(store_err)?;
        }
        self.client
            .create_field_index(CreateFieldIndexCollectionBuilder::new(
                &self.collection,
                facet_key("price"),
                FieldType::Float,
            ))
            .await
            .map_err(store_err)?;

        info!(collection = %self.collection, dimension, "created Qdrant collection");
        Ok(())
    }
}

fn store_err(e: impl std::fmt::Display) -> ShopError {
    ShopError::Store(e.to_string())
}

fn facet_key(key: &str) -> String {
    format!("{}.{}", FACETS_KEY, key)
}

/// Stable point id for an item id
pub fn point_id(item_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, item_id.as_bytes()).to_string()
}

/// Lower-cased filter copies of a record's metadata
fn facets(metadata: &Metadata) -> Map<String, JsonValue> {
    let mut facets = Map::new();
    for field in TEXT_FACETS {
        let key = field.payload_key();
        let lowered = match metadata.get(key) {
            Some(JsonValue::String(s)) => JsonValue::String(s.to_lowercase()),
            Some(JsonValue::Array(items)) => JsonValue::Array(
                items
                    .iter()
                    .filter_map(JsonValue::as_str)
                    .map(|s| JsonValue::String(s.to_lowercase()))
                    .collect(),
            ),
            _ => continue,
        };
        facets.insert(key.to_string(), lowered);
    }

    let price = match metadata.get("price") {
        Some(JsonValue::Number(n)) => n.as_f64(),
        Some(JsonValue::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    if let Some(n) = price.and_then(serde_json::Number::from_f64) {
        facets.insert("price".to_string(), JsonValue::Number(n));
    }
    facets
}

fn to_point(record: ProductRecord) -> PointStruct {
    let facets = facets(&record.metadata);
    let mut payload: HashMap<String, QdrantValue> = record
        .metadata
        .into_iter()
        .map(|(key, value)| (key, json_to_qdrant_value(value)))
        .collect();
    payload.insert(ITEM_ID_KEY.to_string(), QdrantValue::from(record.id.clone()));
    payload.insert(FACETS_KEY.to_string(), json_to_qdrant_value(JsonValue::Object(facets)));

    PointStruct::new(point_id(&record.id), record.vector, payload)
}

/// Translate a compiled filter into Qdrant conditions
pub fn to_qdrant_filter(expr: &FilterExpr) -> Filter {
    let conditions: Vec<Condition> = expr
        .clauses
        .iter()
        .map(|clause| match clause {
            Clause::Exact { key, values } => match values.as_slice() {
                [single] => Condition::matches(facet_key(key), single.clone()),
                _ => Condition::matches(facet_key(key), values.clone()),
            },
            Clause::Contains { key, needles } => match needles.as_slice() {
                [single] => Condition::matches_text(facet_key(key), single.clone()),
                _ => Filter::should(
                    needles
                        .iter()
                        .map(|needle| Condition::matches_text(facet_key(key), needle.clone())),
                )
                .into(),
            },
            Clause::Range { key, gte, lte } => Condition::range(
                facet_key(key),
                Range {
                    gte: *gte,
                    lte: *lte,
                    ..Default::default()
                },
            ),
        })
        .collect();

    Filter::must(conditions)
}

fn to_hit(point: ScoredPoint, score: ScoreKind) -> StoreHit {
    let mut metadata = Metadata::new();
    let mut item_id = None;

    for (key, value) in point.payload {
        if key == FACETS_KEY {
            continue;
        }
        if let Some(json) = qdrant_to_json_value(&value) {
            if key == ITEM_ID_KEY {
                item_id = json.as_str().map(str::to_string);
            } else {
                metadata.insert(key, json);
            }
        }
    }

    StoreHit {
        id: item_id.unwrap_or_else(|| point_id_to_string(&point.id)),
        similarity: score.to_similarity(point.score),
        metadata,
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    fn name(&self) -> &str {
        "qdrant"
    }

    async fn upsert(&self, records: Vec<ProductRecord>) -> Result<()> {
        let Some(dimension) = records.first().map(|r| r.vector.len()) else {
            return Ok(());
        };
        self.ensure_collection(dimension).await?;

        let count = records.len();
        let points: Vec<PointStruct> = records.into_iter().map(to_point).collect();
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(store_err)?;

        debug!(collection = %self.collection, count, "upserted points");
        Ok(())
    }

    async fn query(&self, vector: &[f32], filter: Option<&FilterExpr>, k: usize) -> Result<Vec<StoreHit>> {
        let mut request = SearchPointsBuilder::new(&self.collection, vector.to_vec(), k as u64)
            .with_payload(true);
        if let Some(expr) = filter {
            request = request.filter(to_qdrant_filter(expr));
        }

        let response = self.client.search_points(request).await.map_err(store_err)?;

        Ok(response
            .result
            .into_iter()
            .map(|point| to_hit(point, self.score))
            .collect())
    }

    async fn count(&self) -> Result<u64> {
        let response = self
            .client
            .count(CountPointsBuilder::new(&self.collection).exact(true))
            .await
            .map_err(store_err)?;
        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }
}

fn json_to_qdrant_value(json: JsonValue) -> QdrantValue {
    let kind = match json {
        JsonValue::Null => Kind::NullValue(0),
        JsonValue::Bool(b) => Kind::BoolValue(b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Kind::IntegerValue(i),
            None => Kind::DoubleValue(n.as_f64().unwrap_or_default()),
        },
        JsonValue::String(s) => Kind::StringValue(s),
        JsonValue::Array(items) => Kind::ListValue(ListValue {
            values: items.into_iter().map(json_to_qdrant_value).collect(),
        }),
        JsonValue::Object(map) => Kind::StructValue(Struct {
            fields: map
                .into_iter()
                .map(|(key, value)| (key, json_to_qdrant_value(value)))
                .collect(),
        }),
    };
    QdrantValue { kind: Some(kind) }
}

fn qdrant_to_json_value(value: &QdrantValue) -> Option<JsonValue> {
    value.kind.as_ref().and_then(|kind| match kind {
        Kind::NullValue(_) => Some(JsonValue::Null),
        Kind::StringValue(s) => Some(JsonValue::String(s.clone())),
        Kind::IntegerValue(i) => Some(JsonValue::Number((*i).into())),
        Kind::DoubleValue(f) => serde_json::Number::from_f64(*f).map(JsonValue::Number),
        Kind::BoolValue(b) => Some(JsonValue::Bool(*b)),
        Kind::ListValue(list) => Some(JsonValue::Array(
            list.values.iter().filter_map(qdrant_to_json_value).collect(),
        )),
        Kind::StructValue(st) => Some(JsonValue::Object(
            st.fields
                .iter()
                .filter_map(|(k, v)| qdrant_to_json_value(v).map(|json| (k.clone(), json)))
                .collect(),
        )),
    })
}

fn point_id_to_string(point_id: &Option<PointId>) -> String {
    use qdrant_client::qdrant::point_id::PointIdOptions;

    match point_id.as_ref().and_then(|id| id.point_id_options.as_ref()) {
        Some(PointIdOptions::Num(n)) => n.to_string(),
        Some(PointIdOptions::Uuid(u)) => u.clone(),
        None => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterCompiler;
    use crate::types::Predicate;
    use serde_json::json;

    fn metadata(value: JsonValue) -> Metadata {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_point_id_is_stable_uuid() {
        let a = point_id("B07RUN1");
        assert_eq!(a, point_id("B07RUN1"));
        assert_ne!(a, point_id("B07RUN2"));
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn test_facets_lowercase_and_numeric_price() {
        let facets = facets(&metadata(json!({
            "color": "Dark RED",
            "brand": "Nike",
            "category": ["SHOES", "Sneakers"],
            "price": "89.99",
            "title": "ignored",
        })));

        assert_eq!(facets["color"], "dark red");
        assert_eq!(facets["brand"], "nike");
        assert_eq!(facets["category"], json!(["shoes", "sneakers"]));
        assert_eq!(facets["price"], json!(89.99));
        assert!(facets.get("title").is_none());
    }

    #[test]
    fn test_payload_round_trip() {
        let original = json!({"title": "Boot", "tags": ["a", "b"], "dims": {"w": 2}, "price": 12.5});
        let back = qdrant_to_json_value(&json_to_qdrant_value(original.clone())).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn test_filter_translation_targets_facets() {
        let compiled = FilterCompiler::default().compile(&[
            Predicate::text(crate::types::FilterField::Color, "Red"),
            Predicate::price_max(100.0),
        ]);
        let filter = to_qdrant_filter(&compiled.expr);
        assert_eq!(filter.must.len(), 2);

        let rendered = format!("{:?}", filter);
        assert!(rendered.contains("facets.color"));
        assert!(rendered.contains("facets.price"));
        assert!(rendered.contains("\"red\""));
    }

    #[test]
    fn test_to_hit_restores_item_id_and_hides_facets() {
        let point = ScoredPoint {
            id: Some(PointId::from(point_id("B07RUN1"))),
            payload: HashMap::from([
                (ITEM_ID_KEY.to_string(), QdrantValue::from("B07RUN1".to_string())),
                ("title".to_string(), QdrantValue::from("Pegasus".to_string())),
                (
                    FACETS_KEY.to_string(),
                    json_to_qdrant_value(json!({"color": "red"})),
                ),
            ]),
            score: 0.9,
            ..Default::default()
        };
        let hit = to_hit(point, ScoreKind::Similarity);
        assert_eq!(hit.id, "B07RUN1");
        assert_eq!(hit.metadata["title"], "Pegasus");
        assert!(hit.metadata.get(FACETS_KEY).is_none());
    }

    #[tokio::test]
    #[ignore] // Integration test - requires Qdrant
    async fn test_upsert_and_query() {
        let config = StoreConfig {
            collection: "shoptalk_test".to_string(),
            ..Default::default()
        };
        let store = QdrantStore::connect(&config).unwrap();
        store
            .upsert(vec![ProductRecord {
                id: "B07RUN1".to_string(),
                vector: vec![0.1; 8],
                metadata: metadata(json!({"title": "Pegasus", "color": "Red", "price": 90})),
            }])
            .await
            .unwrap();

        let compiled = FilterCompiler::default()
            .compile(&[Predicate::text(crate::types::FilterField::Color, "RED")]);
        let hits = store.query(&[0.1; 8], compiled.expr.as_option(), 5).await.unwrap();
        assert_eq!(hits[0].id, "B07RUN1");
    }
}
