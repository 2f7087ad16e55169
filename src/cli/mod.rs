use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::config::{
    AppConfig, DatabaseConfig, EmbeddingSettings, ProcessingConfig, TableNames, VectorBackend,
};
use crate::domain::{ContentStyle, IncrementalPolicy, RecordKind};

#[derive(Parser)]
#[command(name = "event-embeddings")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use deterministic fake embeddings instead of downloading a model
    #[arg(long, global = true, env = "MOCK_EMBEDDINGS")]
    pub mock_embeddings: bool,

    /// Read the source but keep embeddings and the sync log in memory
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Hide the progress bar (log lines are still written)
    #[arg(long, global = true)]
    pub no_progress: bool,

    #[command(flatten)]
    pub settings: SettingsArgs,

    /// Defaults to `sync`
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Embed sessions and speakers and upsert them into the destination
    Sync {
        /// Override INCREMENTAL_MODE for this run (auto, full, incremental)
        #[arg(long, value_parser = parse_policy)]
        mode: Option<IncrementalPolicy>,
    },

    /// Create (with INIT_DBS) and check the destination schema
    Verify,

    /// Show the most recent sync log entries
    Status {
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Find the stored records closest to a query
    Search {
        query: String,

        #[arg(short, long, default_value = "session", value_parser = parse_kind)]
        kind: RecordKind,

        #[arg(long, default_value = "5")]
        num: usize,

        #[arg(short, long)]
        min_score: Option<f32>,
    },
}

/// Every setting, read from flags or the environment.
#[derive(Args, Clone, Debug)]
pub struct SettingsArgs {
    #[arg(long, env = "DB_SOURCE_HOST", default_value = "localhost", global = true)]
    pub source_host: String,
    #[arg(long, env = "DB_SOURCE_PORT", default_value = "5432", global = true)]
    pub source_port: u16,
    #[arg(long, env = "DB_SOURCE_NAME", default_value = "source_db", global = true)]
    pub source_name: String,
    #[arg(long, env = "DB_SOURCE_USER", default_value = "postgres", global = true)]
    pub source_user: String,
    #[arg(long, env = "DB_SOURCE_PASSWORD", default_value = "", hide_env_values = true, global = true)]
    pub source_password: String,

    #[arg(long, env = "DB_DEST_HOST", default_value = "localhost", global = true)]
    pub dest_host: String,
    #[arg(long, env = "DB_DEST_PORT", default_value = "5432", global = true)]
    pub dest_port: u16,
    #[arg(long, env = "DB_DEST_NAME", default_value = "dest_db", global = true)]
    pub dest_name: String,
    #[arg(long, env = "DB_DEST_USER", default_value = "postgres", global = true)]
    pub dest_user: String,
    #[arg(long, env = "DB_DEST_PASSWORD", default_value = "", hide_env_values = true, global = true)]
    pub dest_password: String,

    #[arg(
        long,
        env = "EMBEDDING_MODEL_NAME",
        default_value = "sentence-transformers/multi-qa-mpnet-base-dot-v1",
        global = true
    )]
    pub model_name: String,
    #[arg(long, env = "EMBEDDING_DIM", default_value = "768", global = true)]
    pub embedding_dim: usize,
    #[arg(long, env = "EMBEDDING_DEVICE", default_value = "cpu", global = true)]
    pub device: String,
    #[arg(long, env = "BATCH_SIZE", default_value = "32", global = true)]
    pub batch_size: usize,
    #[arg(
        long,
        env = "EMBEDDING_NORMALIZE",
        default_value = "true",
        value_parser = parse_bool,
        action = ArgAction::Set,
        global = true
    )]
    pub normalize: bool,
    #[arg(long, env = "CACHE_DIR", default_value = "/cache/.cache", global = true)]
    pub cache_dir: PathBuf,

    #[arg(
        long,
        env = "INCREMENTAL_MODE",
        default_value = "auto",
        value_parser = parse_policy,
        global = true
    )]
    pub incremental_mode: IncrementalPolicy,
    #[arg(long, env = "LOOKBACK_HOURS", default_value = "24", global = true)]
    pub lookback_hours: i64,
    #[arg(
        long,
        env = "INIT_DBS",
        default_value = "true",
        value_parser = parse_bool,
        action = ArgAction::Set,
        global = true
    )]
    pub init_dbs: bool,
    #[arg(long, env = "SOURCE_CHANGE_COLUMN", global = true)]
    pub change_column: Option<String>,
    #[arg(
        long,
        env = "CONTENT_STYLE",
        default_value = "detailed",
        value_parser = parse_style,
        global = true
    )]
    pub content_style: ContentStyle,

    #[arg(
        long,
        env = "VECTOR_BACKEND",
        default_value = "tables",
        value_parser = parse_backend,
        global = true
    )]
    pub backend: VectorBackend,
    #[arg(long, env = "COLLECTION_NAME", default_value = "event_embeddings", global = true)]
    pub collection_name: String,
    #[arg(long, env = "SESSIONS_TABLE", default_value = "session_embeddings", global = true)]
    pub sessions_table: String,
    #[arg(long, env = "SPEAKERS_TABLE", default_value = "speaker_embeddings", global = true)]
    pub speakers_table: String,
    #[arg(long, env = "SYNC_LOG_TABLE", default_value = "embeddings_sync_log", global = true)]
    pub sync_log_table: String,
}

impl SettingsArgs {
    pub fn into_config(self) -> AppConfig {
        AppConfig {
            source_db: DatabaseConfig {
                host: self.source_host,
                port: self.source_port,
                dbname: self.source_name,
                user: self.source_user,
                password: self.source_password,
            },
            dest_db: DatabaseConfig {
                host: self.dest_host,
                port: self.dest_port,
                dbname: self.dest_name,
                user: self.dest_user,
                password: self.dest_password,
            },
            embedding: EmbeddingSettings {
                model_name: self.model_name,
                dimension: self.embedding_dim,
                device: self.device.to_lowercase(),
                batch_size: self.batch_size,
                normalize: self.normalize,
                cache_dir: self.cache_dir,
            },
            processing: ProcessingConfig {
                incremental_mode: self.incremental_mode,
                lookback_hours: self.lookback_hours,
                init_databases: self.init_dbs,
                change_column: self.change_column.filter(|c| !c.trim().is_empty()),
                content_style: self.content_style,
            },
            backend: self.backend,
            collection_name: self.collection_name,
            table_names: TableNames {
                sessions: self.sessions_table,
                speakers: self.speakers_table,
                sync_log: self.sync_log_table,
            },
        }
    }
}

fn parse_policy(value: &str) -> Result<IncrementalPolicy, String> {
    IncrementalPolicy::parse(value)
        .ok_or_else(|| format!("expected auto, true/incremental or false/full, got '{}'", value))
}

fn parse_style(value: &str) -> Result<ContentStyle, String> {
    ContentStyle::parse(value).ok_or_else(|| format!("expected detailed or agenda, got '{}'", value))
}

fn parse_backend(value: &str) -> Result<VectorBackend, String> {
    VectorBackend::parse(value)
        .ok_or_else(|| format!("expected tables or collection, got '{}'", value))
}

fn parse_kind(value: &str) -> Result<RecordKind, String> {
    value.parse()
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(format!("expected true or false, got '{}'", other)),
    }
}
