use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::application::EventSource;
use crate::domain::{DomainError, Session, Speaker};

/// Fixed set of records, for tests and dry runs. Has no notion of
/// modification time, so `since` is ignored.
#[derive(Default)]
pub struct InMemoryEventSource {
    sessions: Arc<RwLock<Vec<Session>>>,
    speakers: Arc<RwLock<Vec<Speaker>>>,
}

impl InMemoryEventSource {
    pub fn new(sessions: Vec<Session>, speakers: Vec<Speaker>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(sessions)),
            speakers: Arc::new(RwLock::new(speakers)),
        }
    }

    pub async fn set_sessions(&self, sessions: Vec<Session>) {
        *self.sessions.write().await = sessions;
    }

    pub async fn set_speakers(&self, speakers: Vec<Speaker>) {
        *self.speakers.write().await = speakers;
    }
}

#[async_trait]
impl EventSource for InMemoryEventSource {
    async fn fetch_sessions(
        &self,
        _since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Session>, DomainError> {
        let mut sessions = self.sessions.read().await.clone();
        sessions.sort_by_key(|s| (s.date, s.start_time, s.id));
        Ok(sessions)
    }

    async fn fetch_speakers(&self) -> Result<Vec<Speaker>, DomainError> {
        Ok(self.speakers.read().await.clone())
    }

    fn supports_incremental(&self) -> bool {
        false
    }
}
