//! Markdown rendering of search results.

use super::region::ResolvedRegion;
use super::types::SearchHit;

fn header(query: &str, region: &ResolvedRegion) -> String {
    let mut out = format!(
        "# Web Search Results\nQuery: {query}\nRegion: {}\n",
        region.resolved
    );
    if let Some(note) = &region.note {
        out.push_str(&format!("Note: {note}\n"));
    }
    out
}

/// Report for one query.
pub fn render_results(query: &str, region: &ResolvedRegion, hits: &[SearchHit]) -> String {
    let mut out = header(query, region);
    if hits.is_empty() {
        out.push_str("No results found.");
        return out;
    }
    let items = hits
        .iter()
        .map(|h| format!("### {}\n{}\n\nRead more: {}\n", h.title, h.description, h.url))
        .collect::<Vec<_>>()
        .join("\n\n");
    out.push_str(&format!("Results: {}\n\n---\n\n{items}\n", hits.len()));
    out
}

/// Outcome of one query inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub query: String,
    pub outcome: Result<String, String>,
}

/// Report for a batch; sections keep input order.
pub fn render_batch(entries: &[BatchEntry]) -> String {
    let ok = entries.iter().filter(|e| e.outcome.is_ok()).count();
    let sections = entries
        .iter()
        .map(|e| match &e.outcome {
            Ok(report) => format!("## Query: {}\n\n{report}", e.query),
            Err(err) => format!("## Query: {}\n\nError: {err}", e.query),
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");
    format!(
        "# Batch Web Search Results\nTotal queries: {}\nSuccessful: {ok}\nFailed: {}\n\n{sections}",
        entries.len(),
        entries.len() - ok
    )
}
