use anyhow::Result;

use crate::domain::{RecordKind, SearchHit, SearchQuery};

use super::super::Container;

const PREVIEW_CHARS: usize = 300;

pub struct SearchController<'a> {
    container: &'a Container,
}

impl<'a> SearchController<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self { container }
    }

    pub async fn search(
        &self,
        query: String,
        kind: RecordKind,
        num: usize,
        min_score: Option<f32>,
    ) -> Result<String> {
        let mut search_query = SearchQuery::new(query, kind).with_limit(num);

        if let Some(score) = min_score {
            search_query = search_query.with_min_score(score);
        }

        let use_case = self.container.search_use_case().await?;
        let hits = use_case.execute(search_query).await?;

        Ok(format_hits(&hits))
    }
}

fn format_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No results found.".to_string();
    }

    let mut output = format!("Found {} results:\n\n", hits.len());

    for (i, hit) in hits.iter().enumerate() {
        output.push_str(&format!("{}. {}\n", i + 1, hit.display_line()));

        let mut preview: String = hit.content().chars().take(PREVIEW_CHARS).collect();
        if hit.content().chars().count() > PREVIEW_CHARS {
            preview.push_str("...");
        }
        output.push_str(&format!("   | {}\n\n", preview));
    }

    output.trim_end().to_string()
}
