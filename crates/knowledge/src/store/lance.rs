//! LanceDB-backed vector store.
//!
//! LanceDB has no multi-statement transactions, so writes are buffered in
//! order and applied at commit. The `chunks` table is created by the first
//! commit that inserts records, using that record's vector length.

use super::{
    cosine_similarity, no_transaction, rank, transaction_open, PendingOp, PendingRecord,
    StoreBackend, VectorStore,
};
use crate::types::{ChunkMetadata, ScoredChunk, StoredChunk};
use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use docbase_core::{AppError, AppResult};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use std::path::Path;
use std::sync::Arc;

const TABLE_NAME: &str = "chunks";

/// Backend storing each base as a LanceDB database directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct LanceDbBackend;

#[async_trait]
impl StoreBackend for LanceDbBackend {
    fn name(&self) -> &str {
        "lancedb"
    }

    async fn create(&self, dir: &Path) -> AppResult<()> {
        open_database(dir).await?;
        tracing::debug!("Initialized LanceDB store at {:?}", dir);
        Ok(())
    }

    async fn connect(&self, dir: &Path) -> AppResult<Box<dyn VectorStore>> {
        if !dir.is_dir() {
            return Err(AppError::Storage(format!(
                "No LanceDB store at {:?}",
                dir
            )));
        }
        let store = LanceDbStore::open(dir).await?;
        Ok(Box::new(store))
    }
}

async fn open_database(dir: &Path) -> AppResult<Connection> {
    let uri = dir.to_string_lossy().to_string();
    lancedb::connect(&uri)
        .execute()
        .await
        .map_err(|e| AppError::Storage(format!("Failed to connect to LanceDB: {}", e)))
}

/// Open handle on a base's LanceDB store.
pub struct LanceDbStore {
    conn: Connection,
    table: Option<Table>,
    dimensions: Option<usize>,
    pending: Option<Vec<PendingOp>>,
}

impl LanceDbStore {
    /// Open the database in `dir`, and the chunks table if it exists.
    pub async fn open(dir: &Path) -> AppResult<Self> {
        let conn = open_database(dir).await?;

        let table_names = conn
            .table_names()
            .execute()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to list tables: {}", e)))?;

        let (table, dimensions) = if table_names.iter().any(|name| name == TABLE_NAME) {
            let table = conn
                .open_table(TABLE_NAME)
                .execute()
                .await
                .map_err(|e| AppError::Storage(format!("Failed to open table: {}", e)))?;
            let schema = table
                .schema()
                .await
                .map_err(|e| AppError::Storage(format!("Failed to read table schema: {}", e)))?;
            let dimensions = vector_dimensions(&schema);
            (Some(table), dimensions)
        } else {
            (None, None)
        };

        Ok(Self {
            conn,
            table,
            dimensions,
            pending: None,
        })
    }

    /// Arrow schema of the chunks table.
    fn create_schema(dimensions: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("group_id", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("metadata", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimensions as i32,
                ),
                false,
            ),
        ]))
    }

    /// Convert buffered records to one Arrow RecordBatch.
    fn records_to_batch(records: &[PendingRecord], dimensions: usize) -> AppResult<RecordBatch> {
        let schema = Self::create_schema(dimensions);

        let group_ids = StringArray::from(
            records
                .iter()
                .map(|r| r.chunk.group_id.as_str())
                .collect::<Vec<_>>(),
        );
        let contents = StringArray::from(
            records
                .iter()
                .map(|r| r.chunk.content.as_str())
                .collect::<Vec<_>>(),
        );
        let metadata = StringArray::from(
            records
                .iter()
                .map(|r| serde_json::to_string(&r.chunk.metadata))
                .collect::<Result<Vec<_>, _>>()?,
        );

        let values: Vec<f32> = records
            .iter()
            .flat_map(|r| r.vector.iter().copied())
            .collect();
        let vectors = FixedSizeListArray::try_new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            dimensions as i32,
            Arc::new(Float32Array::from(values)),
            None,
        )
        .map_err(|e| AppError::Storage(format!("Failed to build vector column: {}", e)))?;

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(group_ids),
                Arc::new(contents),
                Arc::new(metadata),
                Arc::new(vectors),
            ],
        )
        .map_err(|e| AppError::Storage(format!("Failed to create RecordBatch: {}", e)))
    }

    /// Read every row of a result batch back into scored chunks.
    fn batch_to_hits(batch: &RecordBatch, query_vector: &[f32]) -> AppResult<Vec<ScoredChunk>> {
        let group_ids = string_column(batch, "group_id")?;
        let contents = string_column(batch, "content")?;
        let metadata_json = string_column(batch, "metadata")?;
        let vectors = batch
            .column_by_name("vector")
            .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
            .ok_or_else(|| AppError::Storage("Invalid vector column".to_string()))?;

        let mut hits = Vec::with_capacity(batch.num_rows());
        for row in 0..batch.num_rows() {
            let vector_ref = vectors.value(row);
            let values = vector_ref
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| AppError::Storage("Invalid vector values".to_string()))?;
            let vector: Vec<f32> = values.values().to_vec();

            let metadata: ChunkMetadata = serde_json::from_str(metadata_json.value(row))?;

            hits.push(ScoredChunk {
                chunk: StoredChunk {
                    group_id: group_ids.value(row).to_string(),
                    content: contents.value(row).to_string(),
                    metadata,
                },
                score: cosine_similarity(query_vector, &vector),
            });
        }

        Ok(hits)
    }

    /// Append buffered records, creating the table on first use.
    async fn flush_inserts(&mut self, records: &mut Vec<PendingRecord>) -> AppResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let dimensions = match self.dimensions {
            Some(d) => d,
            None => records[0].vector.len(),
        };
        let batch = Self::records_to_batch(records, dimensions)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(vec![Ok(batch)], schema);

        match &self.table {
            Some(table) => {
                table
                    .add(reader)
                    .execute()
                    .await
                    .map_err(|e| AppError::Storage(format!("Failed to add chunks: {}", e)))?;
            }
            None => {
                let table = self
                    .conn
                    .create_table(TABLE_NAME, reader)
                    .execute()
                    .await
                    .map_err(|e| AppError::Storage(format!("Failed to create table: {}", e)))?;
                self.table = Some(table);
                self.dimensions = Some(dimensions);
            }
        }

        tracing::debug!("Inserted {} chunks into LanceDB", records.len());
        records.clear();
        Ok(())
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> AppResult<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| AppError::Storage(format!("Invalid {} column", name)))
}

/// Vector width recorded in a chunks table schema.
fn vector_dimensions(schema: &Schema) -> Option<usize> {
    match schema.field_with_name("vector").ok()?.data_type() {
        DataType::FixedSizeList(_, n) => Some(*n as usize),
        _ => None,
    }
}

/// SQL predicate selecting one group.
fn group_predicate(group_id: &str) -> String {
    format!("group_id = '{}'", group_id.replace('\'', "''"))
}

#[async_trait]
impl VectorStore for LanceDbStore {
    async fn begin_transaction(&mut self) -> AppResult<()> {
        if self.pending.is_some() {
            return Err(transaction_open());
        }
        self.pending = Some(Vec::new());
        Ok(())
    }

    async fn commit_transaction(&mut self) -> AppResult<()> {
        let ops = self
            .pending
            .take()
            .ok_or_else(|| no_transaction("commit_transaction"))?;

        let mut inserts: Vec<PendingRecord> = Vec::new();
        for op in ops {
            match op {
                PendingOp::Insert(record) => inserts.push(record),
                PendingOp::Delete(group_id) => {
                    self.flush_inserts(&mut inserts).await?;
                    if let Some(table) = &self.table {
                        table.delete(&group_predicate(&group_id)).await.map_err(|e| {
                            AppError::Storage(format!("Failed to delete chunks: {}", e))
                        })?;
                    }
                }
            }
        }
        self.flush_inserts(&mut inserts).await?;

        Ok(())
    }

    async fn rollback_transaction(&mut self) -> AppResult<()> {
        if let Some(ops) = self.pending.take() {
            tracing::debug!("Discarded {} buffered LanceDB writes", ops.len());
        }
        Ok(())
    }

    async fn insert(
        &mut self,
        group_id: &str,
        content: &str,
        vector: &[f32],
        metadata: &ChunkMetadata,
    ) -> AppResult<()> {
        let expected = self.dimensions;
        let pending = self.pending.as_mut().ok_or_else(|| no_transaction("insert"))?;

        // The first buffered insert fixes the width for a table not yet created.
        let width = expected.or_else(|| {
            pending.iter().find_map(|op| match op {
                PendingOp::Insert(r) => Some(r.vector.len()),
                PendingOp::Delete(_) => None,
            })
        });
        if let Some(width) = width {
            if vector.len() != width {
                return Err(AppError::Storage(format!(
                    "Embedding dimension mismatch: expected {}, got {}",
                    width,
                    vector.len()
                )));
            }
        }

        pending.push(PendingOp::Insert(PendingRecord::new(
            group_id, content, vector, metadata,
        )));
        Ok(())
    }

    async fn delete(&mut self, group_id: &str) -> AppResult<()> {
        let pending = self.pending.as_mut().ok_or_else(|| no_transaction("delete"))?;
        pending.push(PendingOp::Delete(group_id.to_string()));
        Ok(())
    }

    async fn query(
        &self,
        _query_text: &str,
        query_vector: &[f32],
        k: usize,
    ) -> AppResult<Vec<ScoredChunk>> {
        let table = match &self.table {
            Some(table) => table,
            None => return Ok(Vec::new()),
        };

        if let Some(dimensions) = self.dimensions {
            if query_vector.len() != dimensions {
                return Err(AppError::Storage(format!(
                    "Query embedding dimension mismatch: expected {}, got {}",
                    dimensions,
                    query_vector.len()
                )));
            }
        }

        let batches = table
            .query()
            .nearest_to(query_vector.to_vec())
            .map_err(|e| AppError::Storage(format!("Failed to create query: {}", e)))?
            .distance_type(DistanceType::Cosine)
            .limit(k)
            .execute()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to execute search: {}", e)))?
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to collect results: {}", e)))?;

        let mut hits = Vec::new();
        for batch in &batches {
            hits.extend(Self::batch_to_hits(batch, query_vector)?);
        }

        tracing::debug!("Retrieved {} chunks (requested top-{})", hits.len(), k);
        Ok(rank(hits, k))
    }
}
