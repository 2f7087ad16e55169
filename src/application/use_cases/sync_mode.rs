use tracing::debug;

use crate::application::SyncLogRepository;
use crate::domain::{DomainError, IncrementalPolicy, SyncMode};

/// Decides how a run syncs. `Auto` goes incremental once the sync log holds
/// a successful run for `target`.
pub async fn resolve_sync_mode(
    policy: IncrementalPolicy,
    sync_log: &dyn SyncLogRepository,
    target: &str,
) -> Result<SyncMode, DomainError> {
    let mode = match policy {
        IncrementalPolicy::Always => SyncMode::Incremental,
        IncrementalPolicy::Never => SyncMode::Full,
        IncrementalPolicy::Auto => {
            let successes = sync_log.count_successful(target).await?;
            debug!("{} successful syncs logged for {}", successes, target);
            if successes > 0 {
                SyncMode::Incremental
            } else {
                SyncMode::Full
            }
        }
    };

    Ok(mode)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::Value;

    use super::*;
    use crate::connector::adapter::InMemorySyncLogRepository;
    use crate::domain::{SyncLogEntry, UpsertCounts};

    #[tokio::test]
    async fn test_auto_is_full_without_history() {
        let log = InMemorySyncLogRepository::new();
        let mode = resolve_sync_mode(IncrementalPolicy::Auto, &log, "session_embeddings")
            .await
            .unwrap();
        assert_eq!(mode, SyncMode::Full);
    }

    #[tokio::test]
    async fn test_auto_ignores_errors_and_other_targets() {
        let log = InMemorySyncLogRepository::new();
        log.record(&SyncLogEntry::failure("error", "boom", Utc::now(), Value::Null))
            .await
            .unwrap();
        log.record(&SyncLogEntry::success(
            "speaker_embeddings",
            1,
            UpsertCounts::default(),
            Utc::now(),
            Value::Null,
        ))
        .await
        .unwrap();

        let mode = resolve_sync_mode(IncrementalPolicy::Auto, &log, "session_embeddings")
            .await
            .unwrap();
        assert_eq!(mode, SyncMode::Full);

        let mode = resolve_sync_mode(IncrementalPolicy::Auto, &log, "speaker_embeddings")
            .await
            .unwrap();
        assert_eq!(mode, SyncMode::Incremental);
    }

    #[tokio::test]
    async fn test_explicit_policies_skip_the_log() {
        let log = InMemorySyncLogRepository::new();
        assert_eq!(
            resolve_sync_mode(IncrementalPolicy::Always, &log, "t").await.unwrap(),
            SyncMode::Incremental
        );
        assert_eq!(
            resolve_sync_mode(IncrementalPolicy::Never, &log, "t").await.unwrap(),
            SyncMode::Full
        );
    }
}
