use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// The two kinds of source records that get embedded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Session,
    Speaker,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Session => "session",
            RecordKind::Speaker => "speaker",
        }
    }

    pub fn plural(&self) -> &'static str {
        match self {
            RecordKind::Session => "sessions",
            RecordKind::Speaker => "speakers",
        }
    }
}

impl std::str::FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "session" | "sessions" => Ok(RecordKind::Session),
            "speaker" | "speakers" => Ok(RecordKind::Speaker),
            other => Err(format!("unknown record kind '{}'", other)),
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A scheduled session joined with its room, venue, speaker and tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub name: String,
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub location: Option<String>,
    pub event_id: Option<i64>,
    pub speaker_id: Option<i64>,
    pub speaker_name: Option<String>,
    pub speaker_bio: Option<String>,
    pub tags: Vec<String>,
}

impl Session {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            date: None,
            start_time: None,
            end_time: None,
            location: None,
            event_id: None,
            speaker_id: None,
            speaker_name: None,
            speaker_bio: None,
            tags: Vec::new(),
        }
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_schedule(mut self, start: NaiveTime, end: NaiveTime) -> Self {
        self.start_time = Some(start);
        self.end_time = Some(end);
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_event(mut self, event_id: i64) -> Self {
        self.event_id = Some(event_id);
        self
    }

    pub fn with_speaker(
        mut self,
        speaker_id: i64,
        name: impl Into<String>,
        bio: Option<String>,
    ) -> Self {
        self.speaker_id = Some(speaker_id);
        self.speaker_name = Some(name.into());
        self.speaker_bio = bio;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_speaker(&self) -> bool {
        self.speaker_name.as_deref().is_some_and(|n| !n.is_empty())
    }

    /// Length in minutes. A session ending before it starts runs past midnight.
    pub fn duration_minutes(&self) -> Option<i64> {
        let (start, end) = (self.start_time?, self.end_time?);
        let minutes = (end - start).num_minutes();
        Some(if minutes < 0 { minutes + 24 * 60 } else { minutes })
    }

    pub fn speaker_names(&self) -> Vec<String> {
        self.speaker_name
            .iter()
            .filter(|n| !n.is_empty())
            .cloned()
            .collect()
    }
}

/// A speaker aggregated over every session they give.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Speaker {
    pub id: i64,
    pub name: String,
    pub bio: Option<String>,
    pub session_count: i64,
    pub session_names: Vec<String>,
    pub tags: Vec<String>,
}

impl Speaker {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            bio: None,
            session_count: 0,
            session_names: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_bio(mut self, bio: impl Into<String>) -> Self {
        self.bio = Some(bio.into());
        self
    }

    pub fn with_sessions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.session_names = names.into_iter().map(Into::into).collect();
        self.session_count = self.session_names.len() as i64;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_bio(&self) -> bool {
        self.bio.as_deref().is_some_and(|b| !b.trim().is_empty())
    }

    /// Tags without repeats, first occurrence wins.
    pub fn unique_tags(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.tags
            .iter()
            .filter(|t| seen.insert(t.as_str()))
            .cloned()
            .collect()
    }
}
