//! SQLite-backed vector store.
//!
//! One `index.sqlite` file per base. Transactions map onto SQLite
//! transactions; similarity search is a brute-force cosine scan over the
//! stored embeddings.

use super::{cosine_similarity, no_transaction, transaction_open, StoreBackend, VectorStore};
use crate::types::{ChunkMetadata, ScoredChunk, StoredChunk};
use async_trait::async_trait;
use docbase_core::{AppError, AppResult};
use rusqlite::{params, Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const INDEX_FILE: &str = "index.sqlite";

/// Backend creating one SQLite database per base directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteBackend;

impl SqliteBackend {
    fn index_path(dir: &Path) -> PathBuf {
        dir.join(INDEX_FILE)
    }
}

#[async_trait]
impl StoreBackend for SqliteBackend {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn create(&self, dir: &Path) -> AppResult<()> {
        let path = Self::index_path(dir);
        let conn = Connection::open(&path)
            .map_err(|e| AppError::Storage(format!("Failed to open SQLite index: {}", e)))?;
        init_schema(&conn)?;

        tracing::debug!("Initialized SQLite index at {:?}", path);
        Ok(())
    }

    async fn connect(&self, dir: &Path) -> AppResult<Box<dyn VectorStore>> {
        let path = Self::index_path(dir);
        let store = SqliteStore::open(&path)?;
        Ok(Box::new(store))
    }
}

/// Create tables if they do not exist.
fn init_schema(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            group_id TEXT NOT NULL,
            content TEXT NOT NULL,
            embedding BLOB NOT NULL,
            metadata TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chunks_group ON chunks(group_id);
        "#,
    )
    .map_err(|e| AppError::Storage(format!("Failed to create tables: {}", e)))
}

/// Open handle on a base's SQLite index.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    in_transaction: bool,
}

impl SqliteStore {
    /// Open an existing index. Fails if the file was never created.
    pub fn open(path: &Path) -> AppResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| {
            AppError::Storage(format!("Failed to open SQLite index at {:?}: {}", path, e))
        })?;
        init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            in_transaction: false,
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> AppResult<T>) -> AppResult<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| AppError::Storage("SQLite connection lock poisoned".to_string()))?;
        f(&conn)
    }

    /// Number of stored records.
    pub fn count(&self) -> AppResult<usize> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get::<_, i64>(0))
                .map(|n| n as usize)
                .map_err(|e| AppError::Storage(format!("Failed to count chunks: {}", e)))
        })
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn begin_transaction(&mut self) -> AppResult<()> {
        if self.in_transaction {
            return Err(transaction_open());
        }
        self.with_conn(|conn| {
            conn.execute_batch("BEGIN IMMEDIATE")
                .map_err(|e| AppError::Storage(format!("Failed to begin transaction: {}", e)))
        })?;
        self.in_transaction = true;
        Ok(())
    }

    async fn commit_transaction(&mut self) -> AppResult<()> {
        if !self.in_transaction {
            return Err(no_transaction("commit_transaction"));
        }
        self.with_conn(|conn| {
            conn.execute_batch("COMMIT")
                .map_err(|e| AppError::Storage(format!("Failed to commit transaction: {}", e)))
        })?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback_transaction(&mut self) -> AppResult<()> {
        if !self.in_transaction {
            return Ok(());
        }
        self.in_transaction = false;
        self.with_conn(|conn| {
            conn.execute_batch("ROLLBACK")
                .map_err(|e| AppError::Storage(format!("Failed to roll back transaction: {}", e)))
        })
    }

    async fn insert(
        &mut self,
        group_id: &str,
        content: &str,
        vector: &[f32],
        metadata: &ChunkMetadata,
    ) -> AppResult<()> {
        if !self.in_transaction {
            return Err(no_transaction("insert"));
        }

        let embedding_bytes = embedding_to_bytes(vector);
        let metadata_json = serde_json::to_string(metadata)?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chunks (group_id, content, embedding, metadata) VALUES (?1, ?2, ?3, ?4)",
                params![group_id, content, embedding_bytes, metadata_json],
            )
            .map_err(|e| AppError::Storage(format!("Failed to insert chunk: {}", e)))?;
            Ok(())
        })
    }

    async fn delete(&mut self, group_id: &str) -> AppResult<()> {
        if !self.in_transaction {
            return Err(no_transaction("delete"));
        }

        let removed = self.with_conn(|conn| {
            conn.execute("DELETE FROM chunks WHERE group_id = ?1", params![group_id])
                .map_err(|e| AppError::Storage(format!("Failed to delete chunks: {}", e)))
        })?;

        tracing::debug!("Deleted {} records of group {}", removed, group_id);
        Ok(())
    }

    async fn query(
        &self,
        _query_text: &str,
        query_vector: &[f32],
        k: usize,
    ) -> AppResult<Vec<ScoredChunk>> {
        // Score every embedding, then load text and metadata for the winners only
        let embeddings = self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, embedding FROM chunks ORDER BY id")
                .map_err(|e| AppError::Storage(format!("Failed to prepare query: {}", e)))?;

            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?)))
                .map_err(|e| AppError::Storage(format!("Failed to query chunks: {}", e)))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| AppError::Storage(format!("Failed to read chunk row: {}", e)))?;

            Ok(rows)
        })?;

        let total = embeddings.len();
        let mut scored = Vec::with_capacity(total);
        for (id, embedding_bytes) in embeddings {
            let embedding = bytes_to_embedding(&embedding_bytes)?;
            scored.push((id, cosine_similarity(query_vector, &embedding)));
        }
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        let rows = self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT group_id, content, metadata FROM chunks WHERE id = ?1")
                .map_err(|e| AppError::Storage(format!("Failed to prepare query: {}", e)))?;

            let rows = scored
                .iter()
                .map(|(id, score)| {
                    stmt.query_row(params![id], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            *score,
                        ))
                    })
                    .map_err(|e| AppError::Storage(format!("Failed to read chunk {}: {}", id, e)))
                })
                .collect::<AppResult<Vec<_>>>()?;

            Ok(rows)
        })?;

        let mut hits = Vec::with_capacity(rows.len());
        for (group_id, content, metadata_json, score) in rows {
            let metadata: ChunkMetadata = serde_json::from_str(&metadata_json)?;
            hits.push(ScoredChunk {
                chunk: StoredChunk {
                    group_id,
                    content,
                    metadata,
                },
                score,
            });
        }

        tracing::debug!("Retrieved {} of {} chunks (requested top-{})", hits.len(), total, k);
        Ok(hits)
    }
}

/// Convert embedding vector to bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert bytes back to embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Storage(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}
