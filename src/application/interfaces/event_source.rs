use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{DomainError, Session, Speaker};

/// Read access to the relational event data being embedded.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Fetch sessions ordered by start time. With `since`, sources that track
    /// modification times only return sessions changed at or after it.
    async fn fetch_sessions(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Session>, DomainError>;

    /// Fetch every speaker with their aggregated sessions and tags.
    async fn fetch_speakers(&self) -> Result<Vec<Speaker>, DomainError>;

    /// Whether `since` actually narrows [`EventSource::fetch_sessions`].
    fn supports_incremental(&self) -> bool;
}
