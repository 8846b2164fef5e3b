use serde::{Deserialize, Serialize};

/// `GET /search?format=json` response body; only the fields we read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearxResponse {
    #[serde(default)]
    pub results: Vec<SearxResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearxResult {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// A normalized search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub title: String,
    pub description: String,
    pub url: String,
}

fn non_blank(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl SearxResult {
    /// `None` for items without a URL.
    pub fn normalize(&self) -> Option<SearchHit> {
        let url = non_blank(&self.url)?;
        let title = non_blank(&self.title);
        Some(SearchHit {
            title: title.unwrap_or("Untitled result").to_string(),
            description: non_blank(&self.content)
                .or(title)
                .unwrap_or("No description")
                .to_string(),
            url: url.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_fills_gaps_and_drops_urlless_items() {
        let body = r#"{"results":[
            {"title":" Минск ","content":"","url":"https://minsk.gov.by/"},
            {"content":"text only","url":"https://a.example/"},
            {"url":"https://b.example/"},
            {"title":"no url","content":"x"},
            {"title":"blank","url":"  "}
        ],"number_of_results":5}"#;
        let parsed: SearxResponse = serde_json::from_str(body).unwrap();
        let hits: Vec<_> = parsed.results.iter().filter_map(SearxResult::normalize).collect();

        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].title, "Минск");
        assert_eq!(hits[0].description, "Минск");
        assert_eq!(hits[1].title, "Untitled result");
        assert_eq!(hits[1].description, "text only");
        assert_eq!(hits[2].description, "No description");
    }

    #[test]
    fn missing_results_field_is_empty() {
        let parsed: SearxResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.results.is_empty());
    }
}
