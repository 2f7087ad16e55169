use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{RecordKind, Session, Speaker};

/// Kind-specific columns written next to the embedding in dedicated tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentAttributes {
    Session {
        event_id: Option<i64>,
        name: String,
        date: Option<NaiveDate>,
        start_time: Option<NaiveTime>,
        end_time: Option<NaiveTime>,
        location: Option<String>,
        speaker_names: Vec<String>,
        tags: Vec<String>,
    },
    Speaker {
        name: String,
        sessions_count: i64,
        session_names: Vec<String>,
        all_tags: Vec<String>,
    },
}

/// A rendered record ready to be embedded and upserted under its record id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingDocument {
    pub id: i64,
    pub content: String,
    pub metadata: Value,
    pub attributes: DocumentAttributes,
}

impl EmbeddingDocument {
    pub fn from_session(session: &Session, content: String) -> Self {
        let metadata = json!({
            "event_id": session.event_id,
            "has_speaker": session.has_speaker(),
            "duration_minutes": session.duration_minutes(),
            "tag_count": session.tags.len(),
        });

        Self {
            id: session.id,
            content,
            metadata,
            attributes: DocumentAttributes::Session {
                event_id: session.event_id,
                name: session.name.clone(),
                date: session.date,
                start_time: session.start_time,
                end_time: session.end_time,
                location: session.location.clone(),
                speaker_names: session.speaker_names(),
                tags: session.tags.clone(),
            },
        }
    }

    pub fn from_speaker(speaker: &Speaker, content: String) -> Self {
        let metadata = json!({
            "has_bio": speaker.has_bio(),
            "unique_tag_count": speaker.unique_tags().len(),
        });

        Self {
            id: speaker.id,
            content,
            metadata,
            attributes: DocumentAttributes::Speaker {
                name: speaker.name.clone(),
                sessions_count: speaker.session_count,
                session_names: speaker.session_names.clone(),
                all_tags: speaker.tags.clone(),
            },
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self.attributes {
            DocumentAttributes::Session { .. } => RecordKind::Session,
            DocumentAttributes::Speaker { .. } => RecordKind::Speaker,
        }
    }

    /// Metadata merged with the kind-specific attributes, for stores that keep
    /// everything in a single JSON column.
    pub fn full_metadata(&self) -> Value {
        let mut merged = serde_json::to_value(&self.attributes).unwrap_or(Value::Null);
        if let (Value::Object(target), Value::Object(extra)) = (&mut merged, &self.metadata) {
            for (key, value) in extra {
                target.insert(key.clone(), value.clone());
            }
            target.insert("record_id".to_string(), Value::from(self.id));
        }
        merged
    }
}
