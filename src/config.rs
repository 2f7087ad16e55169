//! Runtime settings for a sync run.
//!
//! Values come from the command line or, more commonly for a batch job, from
//! the environment (see `cli::SettingsArgs` for the variable names).
//! [`AppConfig::validate`] is the single gate every command passes through.

use std::path::PathBuf;

use crate::domain::{ContentStyle, DomainError, IncrementalPolicy};

pub const SUPPORTED_DIMENSIONS: [usize; 3] = [384, 768, 1024];
pub const SUPPORTED_DEVICES: [&str; 3] = ["cpu", "cuda", "mps"];
/// A century.
pub const MAX_LOOKBACK_HOURS: i64 = 24 * 365 * 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
}

impl DatabaseConfig {
    /// `user@host:port/db`, safe for logs.
    pub fn redacted(&self) -> String {
        format!("{}@{}:{}/{}", self.user, self.host, self.port, self.dbname)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingSettings {
    pub model_name: String,
    pub dimension: usize,
    pub device: String,
    pub batch_size: usize,
    pub normalize: bool,
    pub cache_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingConfig {
    pub incremental_mode: IncrementalPolicy,
    pub lookback_hours: i64,
    pub init_databases: bool,
    /// Source column on `schedules` that records modification time.
    pub change_column: Option<String>,
    pub content_style: ContentStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VectorBackend {
    /// One table per record kind.
    #[default]
    Tables,
    /// LangChain-style `langchain_pg_collection` / `langchain_pg_embedding`.
    Collection,
}

impl VectorBackend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "tables" | "table" => Some(VectorBackend::Tables),
            "collection" | "langchain" | "pgvector" => Some(VectorBackend::Collection),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VectorBackend::Tables => "tables",
            VectorBackend::Collection => "collection",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub sessions: String,
    pub speakers: String,
    pub sync_log: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            sessions: "session_embeddings".to_string(),
            speakers: "speaker_embeddings".to_string(),
            sync_log: "embeddings_sync_log".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub source_db: DatabaseConfig,
    pub dest_db: DatabaseConfig,
    pub embedding: EmbeddingSettings,
    pub processing: ProcessingConfig,
    pub backend: VectorBackend,
    pub collection_name: String,
    pub table_names: TableNames,
}

impl AppConfig {
    /// Checks every setting and reports all problems at once.
    pub fn validate(&self) -> Result<(), DomainError> {
        let mut errors = Vec::new();

        for (label, db) in [("Source", &self.source_db), ("Destination", &self.dest_db)] {
            if db.host.trim().is_empty() || db.password.is_empty() {
                errors.push(format!("{} database configuration incomplete", label));
            }
        }

        if !SUPPORTED_DIMENSIONS.contains(&self.embedding.dimension) {
            errors.push(format!(
                "Unusual embedding dimension: {}",
                self.embedding.dimension
            ));
        }

        if !SUPPORTED_DEVICES.contains(&self.embedding.device.as_str()) {
            errors.push(format!("Invalid device: {}", self.embedding.device));
        }

        if self.embedding.batch_size == 0 {
            errors.push("Batch size must be at least 1".to_string());
        }

        if !(0..=MAX_LOOKBACK_HOURS).contains(&self.processing.lookback_hours) {
            errors.push(format!(
                "Lookback hours must be between 0 and {}: {}",
                MAX_LOOKBACK_HOURS, self.processing.lookback_hours
            ));
        }

        let mut identifiers = vec![
            ("sessions table", self.table_names.sessions.as_str()),
            ("speakers table", self.table_names.speakers.as_str()),
            ("sync log table", self.table_names.sync_log.as_str()),
        ];
        if let Some(column) = self.processing.change_column.as_deref() {
            identifiers.push(("change column", column));
        }
        for (label, name) in identifiers {
            if !is_sql_identifier(name) {
                errors.push(format!("Invalid {} name: '{}'", label, name));
            }
        }

        if self.backend == VectorBackend::Collection && !is_sql_identifier(&self.collection_name) {
            errors.push(format!("Invalid collection name: '{}'", self.collection_name));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DomainError::config(errors.join("; ")))
        }
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "source_db={}, dest_db={}, model={}, device={}, incremental={}, backend={}",
            self.source_db.redacted(),
            self.dest_db.redacted(),
            self.embedding.model_name,
            self.embedding.device,
            self.processing.incremental_mode.as_str(),
            self.backend.as_str()
        )
    }
}

/// A bare SQL identifier: ASCII letter or underscore, then letters, digits or
/// underscores. Anything interpolated into SQL text must pass this.
pub fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
