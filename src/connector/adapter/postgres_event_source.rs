use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::FromRow;
use tracing::debug;

use crate::application::EventSource;
use crate::domain::{DomainError, Session, Speaker};

use super::PostgresConnection;

const SESSION_COLUMNS: &str = r#"
    SELECT
        s.id::bigint AS id,
        s.session_name::text AS session_name,
        s.start_time::time AS start_time,
        s.end_time::time AS end_time,
        COALESCE(r.room_name, v.venue_name, 'Sin ubicación')::text AS location,
        s.event_id::bigint AS event_id,
        sp.id::bigint AS speaker_id,
        sp.name::text AS speaker_name,
        sp.bio::text AS speaker_bio,
        COALESCE(
            array_agg(DISTINCT t.tag_name::text) FILTER (WHERE t.tag_name IS NOT NULL),
            ARRAY[]::text[]
        ) AS tags,
        s.session_date::date AS session_date
    FROM schedules s
    LEFT JOIN events e ON s.event_id = e.id
    LEFT JOIN rooms r ON s.room_id = r.id
    LEFT JOIN venues v ON r.venue_id = v.id
    LEFT JOIN speakers sp ON s.speaker_id = sp.id
    LEFT JOIN session_tags st ON s.id = st.session_id
    LEFT JOIN tags t ON st.tag_id = t.id
"#;

const SESSION_GROUPING: &str = r#"
    GROUP BY s.id, s.session_name, s.start_time, s.end_time,
             s.event_id, sp.id, sp.name, sp.bio, s.session_date,
             r.room_name, v.venue_name
    ORDER BY s.start_time
"#;

const SPEAKERS_QUERY: &str = r#"
    SELECT
        sp.id::bigint AS id,
        sp.name::text AS name,
        sp.bio::text AS bio,
        COUNT(DISTINCT s.id) AS session_count,
        COALESCE(
            array_agg(DISTINCT s.session_name::text) FILTER (WHERE s.session_name IS NOT NULL),
            ARRAY[]::text[]
        ) AS session_names,
        COALESCE(
            array_agg(DISTINCT t.tag_name::text) FILTER (WHERE t.tag_name IS NOT NULL),
            ARRAY[]::text[]
        ) AS all_tags
    FROM speakers sp
    LEFT JOIN schedules s ON sp.id = s.speaker_id
    LEFT JOIN session_tags st ON s.id = st.session_id
    LEFT JOIN tags t ON st.tag_id = t.id
    GROUP BY sp.id, sp.name, sp.bio
    ORDER BY sp.id
"#;

#[derive(Debug, FromRow)]
struct SessionRow {
    id: i64,
    session_name: Option<String>,
    start_time: Option<NaiveTime>,
    end_time: Option<NaiveTime>,
    location: Option<String>,
    event_id: Option<i64>,
    speaker_id: Option<i64>,
    speaker_name: Option<String>,
    speaker_bio: Option<String>,
    tags: Vec<String>,
    session_date: Option<NaiveDate>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session {
            id: row.id,
            name: row.session_name.unwrap_or_default(),
            date: row.session_date,
            start_time: row.start_time,
            end_time: row.end_time,
            location: row.location,
            event_id: row.event_id,
            speaker_id: row.speaker_id,
            speaker_name: row.speaker_name,
            speaker_bio: row.speaker_bio,
            tags: row.tags,
        }
    }
}

#[derive(Debug, FromRow)]
struct SpeakerRow {
    id: i64,
    name: Option<String>,
    bio: Option<String>,
    session_count: i64,
    session_names: Vec<String>,
    all_tags: Vec<String>,
}

impl From<SpeakerRow> for Speaker {
    fn from(row: SpeakerRow) -> Self {
        Speaker {
            id: row.id,
            name: row.name.unwrap_or_default(),
            bio: row.bio,
            session_count: row.session_count,
            session_names: row.session_names,
            tags: row.all_tags,
        }
    }
}

/// Reads sessions and speakers from the relational event schema.
pub struct PostgresEventSource {
    connection: PostgresConnection,
    change_column: Option<String>,
}

impl PostgresEventSource {
    pub fn new(connection: PostgresConnection) -> Self {
        Self {
            connection,
            change_column: None,
        }
    }

    /// Column on `schedules` holding the last modification time. Without it
    /// incremental runs still fetch every session.
    pub fn with_change_column(mut self, column: Option<String>) -> Self {
        self.change_column = column;
        self
    }

    fn sessions_query(&self, incremental: bool) -> String {
        match (&self.change_column, incremental) {
            (Some(column), true) => format!(
                "{} WHERE s.{} >= $1 {}",
                SESSION_COLUMNS, column, SESSION_GROUPING
            ),
            _ => format!("{} {}", SESSION_COLUMNS, SESSION_GROUPING),
        }
    }
}

#[async_trait]
impl EventSource for PostgresEventSource {
    async fn fetch_sessions(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Session>, DomainError> {
        let filter_since = since.filter(|_| self.supports_incremental());
        let sql = self.sessions_query(filter_since.is_some());

        let mut query = sqlx::query_as::<_, SessionRow>(&sql);
        if let Some(since) = filter_since {
            query = query.bind(since);
        }

        let rows = query
            .fetch_all(self.connection.pool())
            .await
            .map_err(|e| DomainError::storage(format!("Failed to fetch sessions: {}", e)))?;

        debug!("Loaded {} session rows", rows.len());
        Ok(rows.into_iter().map(Session::from).collect())
    }

    async fn fetch_speakers(&self) -> Result<Vec<Speaker>, DomainError> {
        let rows = sqlx::query_as::<_, SpeakerRow>(SPEAKERS_QUERY)
            .fetch_all(self.connection.pool())
            .await
            .map_err(|e| DomainError::storage(format!("Failed to fetch speakers: {}", e)))?;

        debug!("Loaded {} speaker rows", rows.len());
        Ok(rows.into_iter().map(Speaker::from).collect())
    }

    fn supports_incremental(&self) -> bool {
        self.change_column.is_some()
    }
}

#[cfg(test)]
mod tests {
    use sqlx::postgres::PgPoolOptions;

    use super::*;
    use crate::config::tests::valid_config;
    use crate::connector::adapter::connect_options;

    fn source(change_column: Option<&str>) -> PostgresEventSource {
        let pool = PgPoolOptions::new()
            .connect_lazy_with(connect_options(&valid_config().source_db));
        PostgresEventSource::new(PostgresConnection::from_pool("source", pool))
            .with_change_column(change_column.map(str::to_string))
    }

    #[tokio::test]
    async fn test_sessions_query_filters_on_change_column() {
        let source = source(Some("updated_at"));
        assert!(source.supports_incremental());

        let sql = source.sessions_query(true);
        assert!(sql.contains("WHERE s.updated_at >= $1"));
        assert!(sql.find("WHERE s.").unwrap() < sql.find("GROUP BY").unwrap());
    }

    #[tokio::test]
    async fn test_sessions_query_without_change_column_is_unfiltered() {
        let source = source(None);
        assert!(!source.supports_incremental());
        assert!(!source.sessions_query(true).contains("WHERE s."));
        assert!(!source.sessions_query(false).contains("$1"));
    }

    #[test]
    fn test_row_conversion_fills_missing_name() {
        let row = SpeakerRow {
            id: 4,
            name: None,
            bio: Some("bio".to_string()),
            session_count: 2,
            session_names: vec!["a".to_string(), "b".to_string()],
            all_tags: vec![],
        };
        let speaker = Speaker::from(row);
        assert_eq!(speaker.name, "");
        assert_eq!(speaker.session_count, 2);
        assert!(speaker.has_bio());
    }
}
