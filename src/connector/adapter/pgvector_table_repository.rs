use std::collections::HashSet;

use async_trait::async_trait;
use pgvector::Vector;
use serde_json::Value;
use tracing::{debug, info};

use crate::application::VectorRepository;
use crate::config::TableNames;
use crate::domain::{
    DocumentAttributes, DomainError, Embedding, EmbeddingDocument, RecordKind, SearchHit,
};

use super::postgres_schema::{
    create_vector_extension, ensure_vector_extension, execute_all, verify_tables,
};
use super::PostgresConnection;

const SESSION_REQUIRED_COLUMNS: &[&str] = &[
    "session_id",
    "event_id",
    "content",
    "embedding",
    "session_name",
    "session_date",
    "start_time",
    "end_time",
];

const SPEAKER_REQUIRED_COLUMNS: &[&str] = &["speaker_id", "speaker_name", "content", "embedding"];

/// One pgvector table per record kind, with the record's attributes as
/// ordinary columns next to the embedding.
pub struct PgVectorTableRepository {
    connection: PostgresConnection,
    tables: TableNames,
    dimensions: usize,
}

impl PgVectorTableRepository {
    /// Table names must already be valid SQL identifiers.
    pub fn new(connection: PostgresConnection, tables: TableNames, dimensions: usize) -> Self {
        Self {
            connection,
            tables,
            dimensions,
        }
    }

    fn table(&self, kind: RecordKind) -> &str {
        match kind {
            RecordKind::Session => &self.tables.sessions,
            RecordKind::Speaker => &self.tables.speakers,
        }
    }

    fn id_column(kind: RecordKind) -> &'static str {
        match kind {
            RecordKind::Session => "session_id",
            RecordKind::Speaker => "speaker_id",
        }
    }

    fn schema_statements(&self) -> Vec<String> {
        let sessions = &self.tables.sessions;
        let speakers = &self.tables.speakers;
        let dims = self.dimensions;

        vec![
            format!(
                r#"CREATE TABLE IF NOT EXISTS {sessions} (
                    session_id BIGINT PRIMARY KEY,
                    event_id BIGINT,
                    content TEXT NOT NULL,
                    embedding vector({dims}) NOT NULL,
                    session_name TEXT,
                    session_date DATE,
                    start_time TIME,
                    end_time TIME,
                    location TEXT,
                    speaker_names TEXT[] NOT NULL DEFAULT '{{}}',
                    tags TEXT[] NOT NULL DEFAULT '{{}}',
                    metadata JSONB NOT NULL DEFAULT '{{}}',
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
                )"#
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {sessions}_embedding_idx \
                 ON {sessions} USING hnsw (embedding vector_cosine_ops)"
            ),
            format!("CREATE INDEX IF NOT EXISTS {sessions}_event_idx ON {sessions} (event_id)"),
            format!(
                r#"CREATE TABLE IF NOT EXISTS {speakers} (
                    speaker_id BIGINT PRIMARY KEY,
                    speaker_name TEXT NOT NULL,
                    content TEXT NOT NULL,
                    embedding vector({dims}) NOT NULL,
                    sessions_count BIGINT NOT NULL DEFAULT 0,
                    session_names TEXT[] NOT NULL DEFAULT '{{}}',
                    all_tags TEXT[] NOT NULL DEFAULT '{{}}',
                    metadata JSONB NOT NULL DEFAULT '{{}}',
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
                )"#
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {speakers}_embedding_idx \
                 ON {speakers} USING hnsw (embedding vector_cosine_ops)"
            ),
        ]
    }
}

#[async_trait]
impl VectorRepository for PgVectorTableRepository {
    async fn initialize(&self) -> Result<(), DomainError> {
        let pool = self.connection.pool();
        create_vector_extension(pool).await?;
        execute_all(pool, &self.schema_statements()).await?;
        info!(
            "Vector tables ready: {}, {} (dimension {})",
            self.tables.sessions, self.tables.speakers, self.dimensions
        );
        Ok(())
    }

    async fn verify(&self) -> Result<(), DomainError> {
        let pool = self.connection.pool();
        ensure_vector_extension(pool).await?;
        verify_tables(
            pool,
            &[
                (self.tables.sessions.as_str(), SESSION_REQUIRED_COLUMNS),
                (self.tables.speakers.as_str(), SPEAKER_REQUIRED_COLUMNS),
            ],
        )
        .await?;
        info!("All required vector tables exist");
        Ok(())
    }

    fn target_name(&self, kind: RecordKind) -> String {
        self.table(kind).to_string()
    }

    async fn existing_ids(
        &self,
        kind: RecordKind,
        ids: &[i64],
    ) -> Result<HashSet<i64>, DomainError> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }

        let sql = format!(
            "SELECT {id} FROM {table} WHERE {id} = ANY($1)",
            id = Self::id_column(kind),
            table = self.table(kind),
        );

        let found: Vec<i64> = sqlx::query_scalar(&sql)
            .bind(ids)
            .fetch_all(self.connection.pool())
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to look up existing {}: {}",
                    kind.plural(),
                    e
                ))
            })?;

        Ok(found.into_iter().collect())
    }

    async fn upsert(
        &self,
        document: &EmbeddingDocument,
        embedding: &Embedding,
    ) -> Result<(), DomainError> {
        let vector = Vector::from(embedding.vector().to_vec());
        let pool = self.connection.pool();

        let result = match &document.attributes {
            DocumentAttributes::Session {
                event_id,
                name,
                date,
                start_time,
                end_time,
                location,
                speaker_names,
                tags,
            } => {
                let sql = format!(
                    r#"INSERT INTO {table} (
                        session_id, event_id, content, embedding, session_name,
                        session_date, start_time, end_time, location,
                        speaker_names, tags, metadata, updated_at
                    ) VALUES ($1, $2, $3, $4::vector, $5, $6, $7, $8, $9, $10, $11, $12, now())
                    ON CONFLICT (session_id) DO UPDATE SET
                        event_id = EXCLUDED.event_id,
                        content = EXCLUDED.content,
                        embedding = EXCLUDED.embedding,
                        session_name = EXCLUDED.session_name,
                        session_date = EXCLUDED.session_date,
                        start_time = EXCLUDED.start_time,
                        end_time = EXCLUDED.end_time,
                        location = EXCLUDED.location,
                        speaker_names = EXCLUDED.speaker_names,
                        tags = EXCLUDED.tags,
                        metadata = EXCLUDED.metadata,
                        updated_at = now()"#,
                    table = self.tables.sessions,
                );

                sqlx::query(&sql)
                    .bind(document.id)
                    .bind(event_id)
                    .bind(&document.content)
                    .bind(&vector)
                    .bind(name)
                    .bind(date)
                    .bind(start_time)
                    .bind(end_time)
                    .bind(location)
                    .bind(speaker_names)
                    .bind(tags)
                    .bind(&document.metadata)
                    .execute(pool)
                    .await
            }
            DocumentAttributes::Speaker {
                name,
                sessions_count,
                session_names,
                all_tags,
            } => {
                let sql = format!(
                    r#"INSERT INTO {table} (
                        speaker_id, speaker_name, content, embedding, sessions_count,
                        session_names, all_tags, metadata, updated_at
                    ) VALUES ($1, $2, $3, $4::vector, $5, $6, $7, $8, now())
                    ON CONFLICT (speaker_id) DO UPDATE SET
                        speaker_name = EXCLUDED.speaker_name,
                        content = EXCLUDED.content,
                        embedding = EXCLUDED.embedding,
                        sessions_count = EXCLUDED.sessions_count,
                        session_names = EXCLUDED.session_names,
                        all_tags = EXCLUDED.all_tags,
                        metadata = EXCLUDED.metadata,
                        updated_at = now()"#,
                    table = self.tables.speakers,
                );

                sqlx::query(&sql)
                    .bind(document.id)
                    .bind(name)
                    .bind(&document.content)
                    .bind(&vector)
                    .bind(sessions_count)
                    .bind(session_names)
                    .bind(all_tags)
                    .bind(&document.metadata)
                    .execute(pool)
                    .await
            }
        };

        result.map_err(|e| {
            DomainError::storage(format!(
                "Failed to upsert {} {}: {}",
                document.kind(),
                document.id,
                e
            ))
        })?;

        debug!("Upserted {} {}", document.kind(), document.id);
        Ok(())
    }

    async fn search(
        &self,
        kind: RecordKind,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchHit>, DomainError> {
        let sql = format!(
            r#"SELECT {id}, content, metadata, (1 - (embedding <=> $1::vector))::real AS score
               FROM {table}
               ORDER BY embedding <=> $1::vector
               LIMIT $2"#,
            id = Self::id_column(kind),
            table = self.table(kind),
        );

        let rows: Vec<(i64, String, Value, f32)> = sqlx::query_as(&sql)
            .bind(Vector::from(query_embedding.to_vec()))
            .bind(limit as i64)
            .fetch_all(self.connection.pool())
            .await
            .map_err(|e| DomainError::storage(format!("Similarity search failed: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|(id, content, metadata, score)| {
                SearchHit::new(kind, id, content, metadata, score)
            })
            .collect())
    }

    async fn count(&self, kind: RecordKind) -> Result<u64, DomainError> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.table(kind));
        let count: i64 = sqlx::query_scalar(&sql)
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
    use sqlx::postgres::PgPoolOptions;

    use super::*;
    use crate::config::tests::valid_config;
    use crate::connector::adapter::connect_options;

    fn repository() -> PgVectorTableRepository {
        let pool = PgPoolOptions::new().connect_lazy_with(connect_options(&valid_config().dest_db));
        PgVectorTableRepository::new(
            PostgresConnection::from_pool("destination", pool),
            TableNames::default(),
            384,
        )
    }

    #[tokio::test]
    async fn test_schema_uses_configured_dimension() {
        let statements = repository().schema_statements();
        let sessions = &statements[0];
        assert!(sessions.contains("CREATE TABLE IF NOT EXISTS session_embeddings"));
        assert!(sessions.contains("embedding vector(384) NOT NULL"));
        assert!(sessions.contains("speaker_names TEXT[] NOT NULL DEFAULT '{}'"));
        assert!(statements
            .iter()
            .any(|s| s.contains("speaker_embeddings_embedding_idx")));
    }

    #[tokio::test]
    async fn test_target_names_are_table_names() {
        let repo = repository();
        assert_eq!(repo.target_name(RecordKind::Session), "session_embeddings");
        assert_eq!(repo.target_name(RecordKind::Speaker), "speaker_embeddings");
    }
}
