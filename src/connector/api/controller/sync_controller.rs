use anyhow::Result;

use crate::domain::{IncrementalPolicy, SyncSummary};

use super::super::Container;

pub struct SyncController<'a> {
    container: &'a Container,
}

impl<'a> SyncController<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self { container }
    }

    pub async fn sync(&self, mode: Option<IncrementalPolicy>) -> Result<String> {
        self.container
            .prepare_use_case()
            .execute(self.container.init_databases())
            .await?;

        let use_case = match self.container.sync_use_case(mode).await {
            Ok(use_case) => use_case,
            Err(e) => {
                self.container.record_setup_failure(&e).await;
                return Err(e);
            }
        };
        let summary = use_case.execute().await?;

        Ok(format_summary(&summary, self.container.dry_run()))
    }
}

fn format_summary(summary: &SyncSummary, dry_run: bool) -> String {
    let mut output = format!(
        "Sync completed ({} mode) in {}\n  {}\n  {}",
        summary.mode,
        summary.elapsed_human(),
        summary.sessions,
        summary.speakers
    );

    if summary.total_failed() > 0 {
        output.push_str(&format!(
            "\n  Warning: {} records could not be written",
            summary.total_failed()
        ));
    }

    if dry_run {
        output.push_str("\n  (dry run: nothing was written to the destination database)");
    }

    output
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::domain::{KindSummary, RecordKind, SyncMode, UpsertCounts};

    fn summary(failed: u64) -> SyncSummary {
        SyncSummary {
            mode: SyncMode::Incremental,
            sessions: KindSummary::new(
                RecordKind::Session,
                12,
                UpsertCounts {
                    inserted: 10,
                    updated: 2,
                    failed: 0,
                },
            ),
            speakers: KindSummary::new(
                RecordKind::Speaker,
                4,
                UpsertCounts {
                    inserted: 0,
                    updated: 4 - failed,
                    failed,
                },
            ),
            elapsed: Duration::from_secs(65),
        }
    }

    #[test]
    fn test_summary_lists_both_kinds() {
        let output = format_summary(&summary(0), false);
        assert!(output.starts_with("Sync completed (INCREMENTAL mode) in 1m 5s"));
        assert!(output.contains("Sessions: 12 processed (10 new, 2 updated)"));
        assert!(output.contains("Speakers: 4 processed (0 new, 4 updated)"));
        assert!(!output.contains("Warning"));
    }

    #[test]
    fn test_summary_flags_failures_and_dry_run() {
        let output = format_summary(&summary(1), true);
        assert!(output.contains("Warning: 1 records could not be written"));
        assert!(output.contains("dry run"));
    }
}
