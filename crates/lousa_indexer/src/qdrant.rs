use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lousa_domain::{
    sort_scored_chunks, ChunkMetadata, ChunkPayload, ChunkPoint, CollectionHandle,
    CollectionStats, DocumentId, Error, ProjectId, ScoredChunk, SearchQuery, VectorIndex,
};
use qdrant_client::config::QdrantConfig;
use qdrant_client::qdrant::points_selector::PointsSelectorOneOf;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors_config::Config;
use qdrant_client::qdrant::{
    Condition, CreateCollection, DeletePoints, Distance, Filter, PointStruct, PointsSelector,
    SearchPoints, Struct, UpsertPoints, Value, Vector, VectorParams, Vectors, VectorsConfig,
    WithPayloadSelector,
};
use qdrant_client::Qdrant;
use tracing::debug;
use uuid::Uuid;

/// Vector-store gateway over Qdrant. One cosine collection per project.
pub struct QdrantIndex {
    client: Qdrant,
}

impl QdrantIndex {
    pub fn try_new(url: &str, api_key: Option<String>) -> anyhow::Result<Self> {
        let mut config = QdrantConfig::from_url(url);
        if let Some(api_key) = api_key {
            config = config.api_key(api_key);
        }
        Ok(Self { client: config.build()? })
    }
}

fn store_error(e: impl std::fmt::Display) -> anyhow::Error {
    let message = e.to_string();
    if message.contains("dimension") || message.contains("vector size") {
        Error::VectorStoreCorrupt(message).into()
    } else {
        Error::VectorStoreUnavailable(message).into()
    }
}

fn to_point(point: ChunkPoint) -> PointStruct {
    let mut metadata = HashMap::with_capacity(6);
    metadata.insert(
        "filename".to_string(),
        point.payload.metadata.filename.into(),
    );
    metadata.insert(
        "original_name".to_string(),
        point.payload.metadata.original_name.into(),
    );
    metadata.insert(
        "mime_type".to_string(),
        point.payload.metadata.mime_type.into(),
    );
    metadata.insert(
        "chunk_size".to_string(),
        (point.payload.metadata.chunk_size as i64).into(),
    );
    metadata.insert(
        "total_chunks".to_string(),
        (point.payload.metadata.total_chunks as i64).into(),
    );
    metadata.insert(
        "created_at".to_string(),
        point.payload.metadata.created_at.to_rfc3339().into(),
    );

    let mut payload = HashMap::with_capacity(5);
    payload.insert(
        "document_id".to_string(),
        point.payload.document_id.to_string().into(),
    );
    payload.insert(
        "project_id".to_string(),
        point.payload.project_id.to_string().into(),
    );
    payload.insert("content".to_string(), point.payload.content.into());
    payload.insert(
        "chunk_index".to_string(),
        (point.payload.chunk_index as i64).into(),
    );
    payload.insert(
        "metadata".to_string(),
        Value { kind: Some(Kind::StructValue(Struct { fields: metadata })) },
    );

    PointStruct {
        id: Some(point.id.to_string().into()),
        vectors: Some(Vectors {
            vectors_options: Some(qdrant_client::qdrant::vectors::VectorsOptions::Vector(
                Vector { data: point.vector, ..Default::default() },
            )),
        }),
        payload,
    }
}

fn payload_str(payload: &HashMap<String, Value>, key: &str) -> anyhow::Result<String> {
    payload
        .get(key)
        .and_then(|v| v.as_str())
        .map(String::clone)
        .ok_or_else(|| anyhow::anyhow!("Missing {key} in payload"))
}

fn payload_int(payload: &HashMap<String, Value>, key: &str) -> anyhow::Result<i64> {
    payload
        .get(key)
        .and_then(|v| v.as_integer())
        .ok_or_else(|| anyhow::anyhow!("Missing {key} in payload"))
}

fn from_scored_point(
    point: qdrant_client::qdrant::ScoredPoint,
) -> anyhow::Result<ScoredChunk> {
    let id = point
        .id
        .as_ref()
        .and_then(|id| id.point_id_options.as_ref())
        .and_then(|options| match options {
            qdrant_client::qdrant::point_id::PointIdOptions::Uuid(uuid) => {
                Uuid::parse_str(uuid).ok()
            }
            qdrant_client::qdrant::point_id::PointIdOptions::Num(_) => None,
        })
        .ok_or_else(|| anyhow::anyhow!("Missing point id"))?;

    let payload = point.payload;
    let metadata_fields = match payload.get("metadata").and_then(|v| v.kind.as_ref()) {
        Some(Kind::StructValue(fields)) => &fields.fields,
        _ => anyhow::bail!("Missing metadata in payload"),
    };

    let created_at = payload_str(metadata_fields, "created_at")?
        .parse::<DateTime<Utc>>()
        .unwrap_or_else(|_| Utc::now());

    Ok(ScoredChunk {
        id,
        score: point.score,
        payload: ChunkPayload {
            document_id: DocumentId::parse(payload_str(&payload, "document_id")?)?,
            project_id: ProjectId::parse(payload_str(&payload, "project_id")?)?,
            content: payload_str(&payload, "content")?,
            chunk_index: payload_int(&payload, "chunk_index")? as usize,
            metadata: ChunkMetadata {
                filename: payload_str(metadata_fields, "filename")?,
                original_name: payload_str(metadata_fields, "original_name")?,
                mime_type: payload_str(metadata_fields, "mime_type")?,
                chunk_size: payload_int(metadata_fields, "chunk_size")? as usize,
                total_chunks: payload_int(metadata_fields, "total_chunks")? as usize,
                created_at,
            },
        },
    })
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn ensure_collection(
        &self,
        project_id: &ProjectId,
        dimension: u64,
    ) -> anyhow::Result<CollectionHandle> {
        let handle = CollectionHandle::for_project(project_id);
        let name = handle.as_str();

        match self.client.collection_exists(name).await {
            Ok(true) => Ok(handle),
            Ok(false) => {
                let create_collection = CreateCollection {
                    collection_name: name.to_string(),
                    vectors_config: Some(VectorsConfig {
                        config: Some(Config::Params(VectorParams {
                            size: dimension,
                            distance: Distance::Cosine.into(),
                            ..Default::default()
                        })),
                    }),
                    ..Default::default()
                };

                // A concurrent ingest may have created the collection between
                // the existence check and this call; verify before failing.
                match self.client.create_collection(create_collection).await {
                    Ok(_) => {
                        debug!(collection = name, dimension, "Created collection");
                        Ok(handle)
                    }
                    Err(e) => {
                        if self
                            .client
                            .collection_exists(name)
                            .await
                            .map_err(store_error)?
                        {
                            Ok(handle)
                        } else {
                            Err(store_error(e))
                        }
                    }
                }
            }
            Err(e) => Err(store_error(e)),
        }
    }

    async fn upsert(
        &self,
        handle: &CollectionHandle,
        points: Vec<ChunkPoint>,
    ) -> anyhow::Result<usize> {
        if points.is_empty() {
            return Ok(0);
        }
        let points_count = points.len();
        let upsert_request = UpsertPoints {
            collection_name: handle.as_str().to_string(),
            points: points.into_iter().map(to_point).collect(),
            wait: Some(true),
            ordering: None,
            shard_key_selector: None,
            ..Default::default()
        };

        self.client
            .upsert_points(upsert_request)
            .await
            .map_err(store_error)?;
        debug!(collection = handle.as_str(), points = points_count, "Upserted points");
        Ok(points_count)
    }

    async fn search(
        &self,
        handle: &CollectionHandle,
        query: SearchQuery,
    ) -> anyhow::Result<Vec<ScoredChunk>> {
        let search_request = SearchPoints {
            collection_name: handle.as_str().to_string(),
            vector: query.vector,
            limit: query.limit,
            score_threshold: query.score_threshold,
            with_payload: Some(WithPayloadSelector {
                selector_options: Some(
                    qdrant_client::qdrant::with_payload_selector::SelectorOptions::Enable(true),
                ),
            }),
            ..Default::default()
        };

        let response = self
            .client
            .search_points(search_request)
            .await
            .map_err(store_error)?;

        let mut chunks = response
            .result
            .into_iter()
            .map(from_scored_point)
            .collect::<anyhow::Result<Vec<_>>>()?;
        sort_scored_chunks(&mut chunks);
        Ok(chunks)
    }

    async fn delete_by_document(
        &self,
        handle: &CollectionHandle,
        document_id: &DocumentId,
    ) -> anyhow::Result<()> {
        let delete_request = DeletePoints {
            collection_name: handle.as_str().to_string(),
            points: Some(PointsSelector {
                points_selector_one_of: Some(PointsSelectorOneOf::Filter(Filter {
                    must: vec![Condition::matches(
                        "document_id",
                        document_id.to_string(),
                    )],
                    ..Default::default()
                })),
            }),
            wait: Some(true),
            ordering: None,
            shard_key_selector: None,
            ..Default::default()
        };

        self.client
            .delete_points(delete_request)
            .await
            .map_err(store_error)?;
        debug!(collection = handle.as_str(), document = %document_id, "Deleted document points");
        Ok(())
    }

    async fn delete_collection(&self, handle: &CollectionHandle) -> anyhow::Result<()> {
        self.client
            .delete_collection(handle.as_str())
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn stats(&self, handle: &CollectionHandle) -> anyhow::Result<CollectionStats> {
        let info = self
            .client
            .collection_info(handle.as_str())
            .await
            .map_err(store_error)?
            .result
            .ok_or_else(|| Error::VectorStoreUnavailable("missing collection info".into()))?;

        let status = match info.status {
            1 => "green",
            2 => "yellow",
            3 => "red",
            _ => "unknown",
        };

        Ok(CollectionStats {
            points_count: info.points_count.unwrap_or_default(),
            indexed_count: info.indexed_vectors_count.unwrap_or_default(),
            status: status.to_string(),
        })
    }
}
