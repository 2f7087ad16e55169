use std::collections::HashSet;

use async_trait::async_trait;
use pgvector::Vector;
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::VectorRepository;
use crate::domain::{DomainError, Embedding, EmbeddingDocument, RecordKind, SearchHit};

use super::postgres_schema::{
    create_vector_extension, ensure_vector_extension, execute_all, verify_tables,
};
use super::PostgresConnection;

const COLLECTION_TABLE: &str = "langchain_pg_collection";
const EMBEDDING_TABLE: &str = "langchain_pg_embedding";
const COLLECTION_COLUMNS: &[&str] = &["uuid", "name", "cmetadata"];
const EMBEDDING_COLUMNS: &[&str] = &["id", "collection_id", "embedding", "document", "cmetadata"];

/// Sessions and speakers in one LangChain-compatible pgvector collection.
/// Rows are keyed `"<collection>:<kind>:<id>"` and carry all attributes in
/// `cmetadata`.
pub struct PgVectorCollectionRepository {
    connection: PostgresConnection,
    collection_name: String,
    dimensions: usize,
    collection_id: OnceCell<Uuid>,
}

impl PgVectorCollectionRepository {
    pub fn new(connection: PostgresConnection, collection_name: &str, dimensions: usize) -> Self {
        Self {
            connection,
            collection_name: collection_name.to_string(),
            dimensions,
            collection_id: OnceCell::new(),
        }
    }

    fn schema_statements(&self) -> Vec<String> {
        vec![
            format!(
                r#"CREATE TABLE IF NOT EXISTS {COLLECTION_TABLE} (
                    uuid UUID PRIMARY KEY,
                    name VARCHAR NOT NULL UNIQUE,
                    cmetadata JSONB
                )"#
            ),
            format!(
                r#"CREATE TABLE IF NOT EXISTS {EMBEDDING_TABLE} (
                    id VARCHAR PRIMARY KEY,
                    collection_id UUID REFERENCES {COLLECTION_TABLE} (uuid) ON DELETE CASCADE,
                    embedding vector({dims}),
                    document VARCHAR,
                    cmetadata JSONB
                )"#,
                dims = self.dimensions,
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS ix_cmetadata_gin \
                 ON {EMBEDDING_TABLE} USING gin (cmetadata jsonb_path_ops)"
            ),
        ]
    }

    /// Looks the collection up by name, creating it on first use.
    async fn collection_id(&self) -> Result<Uuid, DomainError> {
        self.collection_id
            .get_or_try_init(|| async {
                let pool = self.connection.pool();
                let sql = format!("SELECT uuid FROM {COLLECTION_TABLE} WHERE name = $1");

                let existing: Option<Uuid> = sqlx::query_scalar(&sql)
                    .bind(&self.collection_name)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| {
                        DomainError::storage(format!("Failed to look up collection: {}", e))
                    })?;

                if let Some(id) = existing {
                    return Ok(id);
                }

                let id = Uuid::new_v4();
                let insert = format!(
                    "INSERT INTO {COLLECTION_TABLE} (uuid, name, cmetadata) VALUES ($1, $2, $3)"
                );
                sqlx::query(&insert)
                    .bind(id)
                    .bind(&self.collection_name)
                    .bind(json!({ "source": "event-embeddings" }))
                    .execute(pool)
                    .await
                    .map_err(|e| {
                        DomainError::storage(format!("Failed to create collection: {}", e))
                    })?;

                info!("Created collection '{}' ({})", self.collection_name, id);
                Ok(id)
            })
            .await
            .copied()
    }
}

/// Row id in the shared embedding table. The collection prefix keeps equal
/// record ids in different collections apart.
pub fn document_key(collection: &str, kind: RecordKind, id: i64) -> String {
    format!("{}:{}:{}", collection, kind.as_str(), id)
}

pub fn parse_document_key(key: &str) -> Option<(RecordKind, i64)> {
    let (rest, id) = key.rsplit_once(':')?;
    let kind = rest.rsplit_once(':').map_or(rest, |(_, kind)| kind);
    Some((kind.parse().ok()?, id.parse().ok()?))
}

#[async_trait]
impl VectorRepository for PgVectorCollectionRepository {
    async fn initialize(&self) -> Result<(), DomainError> {
        let pool = self.connection.pool();
        create_vector_extension(pool).await?;
        execute_all(pool, &self.schema_statements()).await?;
        let id = self.collection_id().await?;
        info!("Collection '{}' ready ({})", self.collection_name, id);
        Ok(())
    }

    async fn verify(&self) -> Result<(), DomainError> {
        let pool = self.connection.pool();
        ensure_vector_extension(pool).await?;
        verify_tables(
            pool,
            &[
                (COLLECTION_TABLE, COLLECTION_COLUMNS),
                (EMBEDDING_TABLE, EMBEDDING_COLUMNS),
            ],
        )
        .await?;
        info!("LangChain collection tables exist");
        Ok(())
    }

    fn target_name(&self, kind: RecordKind) -> String {
        format!("{}/{}", self.collection_name, kind.plural())
    }

    async fn existing_ids(
        &self,
        kind: RecordKind,
        ids: &[i64],
    ) -> Result<HashSet<i64>, DomainError> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }

        let keys: Vec<String> = ids
            .iter()
            .map(|id| document_key(&self.collection_name, kind, *id))
            .collect();
        let sql = format!(
            "SELECT e.id FROM {EMBEDDING_TABLE} e \
             JOIN {COLLECTION_TABLE} c ON e.collection_id = c.uuid \
             WHERE c.name = $1 AND e.id = ANY($2)"
        );

        let found: Vec<String> = sqlx::query_scalar(&sql)
            .bind(&self.collection_name)
            .bind(&keys)
            .fetch_all(self.connection.pool())
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to look up existing {}: {}",
                    kind.plural(),
                    e
                ))
            })?;

        Ok(found
            .iter()
            .filter_map(|key| parse_document_key(key))
            .filter(|(k, _)| *k == kind)
            .map(|(_, id)| id)
            .collect())
    }

    async fn upsert(
        &self,
        document: &EmbeddingDocument,
        embedding: &Embedding,
    ) -> Result<(), DomainError> {
        let collection_id = self.collection_id().await?;
        let key = document_key(&self.collection_name, document.kind(), document.id);

        let sql = format!(
            r#"INSERT INTO {EMBEDDING_TABLE} (id, collection_id, embedding, document, cmetadata)
               VALUES ($1, $2, $3::vector, $4, $5)
               ON CONFLICT (id) DO UPDATE SET
                   collection_id = EXCLUDED.collection_id,
                   embedding = EXCLUDED.embedding,
                   document = EXCLUDED.document,
                   cmetadata = EXCLUDED.cmetadata"#
        );

        sqlx::query(&sql)
            .bind(&key)
            .bind(collection_id)
            .bind(Vector::from(embedding.vector().to_vec()))
            .bind(&document.content)
            .bind(document.full_metadata())
            .execute(self.connection.pool())
            .await
            .map_err(|e| DomainError::storage(format!("Failed to upsert {}: {}", key, e)))?;

        debug!("Upserted {}", key);
        Ok(())
    }

    async fn search(
        &self,
        kind: RecordKind,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchHit>, DomainError> {
        let sql = format!(
            r#"SELECT e.id, e.document, e.cmetadata, (1 - (e.embedding <=> $1::vector))::real AS score
               FROM {EMBEDDING_TABLE} e
               JOIN {COLLECTION_TABLE} c ON e.collection_id = c.uuid
               WHERE c.name = $2 AND e.cmetadata->>'kind' = $3
               ORDER BY e.embedding <=> $1::vector
               LIMIT $4"#
        );

        let rows: Vec<(String, Option<String>, Option<Value>, f32)> = sqlx::query_as(&sql)
            .bind(Vector::from(query_embedding.to_vec()))
            .bind(&self.collection_name)
            .bind(kind.as_str())
            .bind(limit as i64)
            .fetch_all(self.connection.pool())
            .await
            .map_err(|e| DomainError::storage(format!("Similarity search failed: {}", e)))?;

        Ok(rows
            .into_iter()
            .filter_map(|(key, content, metadata, score)| {
                let (_, id) = parse_document_key(&key)?;
                Some(SearchHit::new(
                    kind,
                    id,
                    content.unwrap_or_default(),
                    metadata.unwrap_or(Value::Null),
                    score,
                ))
            })
            .collect())
    }

    async fn count(&self, kind: RecordKind) -> Result<u64, DomainError> {
        let sql = format!(
            "SELECT COUNT(*) FROM {EMBEDDING_TABLE} e \
             JOIN {COLLECTION_TABLE} c ON e.collection_id = c.uuid \
             WHERE c.name = $1 AND e.cmetadata->>'kind' = $2"
        );
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(&self.collection_name)
            .bind(kind.as_str())
            .fetch_one(self.connection.pool())
            .await
            .map_err(|e| {
                DomainError::storage(format!("Failed to count {}: {}", kind.plural(), e))
            })?;
        Ok(count.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_keys() {
        assert_eq!(
            document_key("event_embeddings", RecordKind::Session, 12),
            "event_embeddings:session:12"
        );
        assert_eq!(
            parse_document_key("event_embeddings:speaker:7"),
            Some((RecordKind::Speaker, 7))
        );
        assert_eq!(parse_document_key("speaker:7"), Some((RecordKind::Speaker, 7)));
        assert_eq!(parse_document_key("events:speaker:abc"), None);
        assert_eq!(parse_document_key("venue:1"), None);
        assert_eq!(parse_document_key("12"), None);
    }
}
