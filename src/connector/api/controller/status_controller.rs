use anyhow::Result;

use crate::domain::{format_duration, SyncLogEntry};

use super::super::Container;

pub struct StatusController<'a> {
    container: &'a Container,
}

impl<'a> StatusController<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self { container }
    }

    pub async fn status(&self, limit: usize) -> Result<String> {
        let entries = self
            .container
            .list_sync_runs_use_case()
            .execute(limit)
            .await?;
        Ok(format_entries(&entries))
    }
}

fn format_entries(entries: &[SyncLogEntry]) -> String {
    if entries.is_empty() {
        return "No sync runs recorded.".to_string();
    }

    let mut output = "Recent sync runs:\n\n".to_string();
    for entry in entries {
        output.push_str(&format!(
            "  {} {} [{}]\n",
            entry.sync_timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            entry.table_name,
            entry.status.as_str()
        ));

        match &entry.error_message {
            Some(message) => output.push_str(&format!("    Error: {}\n", message)),
            None => output.push_str(&format!(
                "    Processed: {}, Inserted: {}, Updated: {}, Took: {}\n",
                entry.records_processed,
                entry.records_inserted,
                entry.records_updated,
                format_duration(entry.execution_time_seconds)
            )),
        }
    }

    output.trim_end().to_string()
}
