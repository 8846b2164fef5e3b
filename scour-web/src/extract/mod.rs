//! Turning raw markup into one normalized text document.
//!
//! Order of attempts for a page:
//!
//! 1. the first registered [`SiteExtractor`] whose `is_match` accepts the URL
//! 2. the generic noise-stripping transform over the whole page
//! 3. every text node of the page, whitespace collapsed
//! 4. a fixed placeholder
//!
//! An extractor returning `None` is not an error; it only moves the page
//! down the list.

use std::sync::Arc;

use scraper::Html;
use url::Url;

pub mod generic;
pub mod onliner;

pub use onliner::CatalogOnlinerExtractor;

pub const PLACEHOLDER_BODY: &str = "No content.";

/// Cleaned fragment produced by a site extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub title: String,
    pub body_html: String,
}

/// Site-specific extraction rule.
pub trait SiteExtractor: Send + Sync {
    fn id(&self) -> &'static str;

    fn is_match(&self, url: &Url) -> bool;

    /// `None` when the page lacks the structure this rule knows about.
    fn extract(&self, html: &str) -> Option<Extracted>;
}

/// How a [`Document`] body was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Extractor(&'static str),
    Generic,
    RawText,
    Placeholder,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Extractor(id) => write!(f, "extractor:{id}"),
            Self::Generic => f.write_str("generic"),
            Self::RawText => f.write_str("raw_text"),
            Self::Placeholder => f.write_str("placeholder"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub title: String,
    pub source: Url,
    pub body: String,
    pub strategy: Strategy,
}

impl Document {
    /// Title header, source line, separator, body.
    pub fn render(&self) -> String {
        format!(
            "# {}\n\nSource: {}\n\n---\n\n{}",
            self.title, self.source, self.body
        )
    }
}

/// Ordered table of site extractors; the first match wins.
#[derive(Clone, Default)]
pub struct ExtractionDispatcher {
    extractors: Vec<Arc<dyn SiteExtractor>>,
}

impl ExtractionDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatcher preloaded with the bundled extractors.
    pub fn with_defaults() -> Self {
        Self::new().with(CatalogOnlinerExtractor)
    }

    /// Append an extractor; earlier registrations take precedence.
    pub fn with(mut self, extractor: impl SiteExtractor + 'static) -> Self {
        self.extractors.push(Arc::new(extractor));
        self
    }

    pub fn select(&self, url: &Url) -> Option<&dyn SiteExtractor> {
        self.extractors
            .iter()
            .find(|e| e.is_match(url))
            .map(|e| e.as_ref())
    }

    pub fn extract(&self, html: &str, url: &Url) -> Document {
        let page = Html::parse_document(html);
        let page_title = generic::document_title(&page).unwrap_or_else(|| host_title(url));

        if let Some(extractor) = self.select(url) {
            match extractor.extract(html) {
                Some(found) => {
                    let fragment = Html::parse_fragment(&found.body_html);
                    let body = generic::render_markdown(&fragment, url);
                    if !body.is_empty() {
                        let title = if found.title.trim().is_empty() {
                            page_title
                        } else {
                            found.title.trim().to_string()
                        };
                        return self.finish(title, url, body, Strategy::Extractor(extractor.id()));
                    }
                }
                None => tracing::debug!(
                    target: "web.extract",
                    extractor = extractor.id(),
                    url = %url,
                    "extract.no_structure"
                ),
            }
        }

        let body = generic::render_markdown(&page, url);
        if !body.is_empty() {
            return self.finish(page_title, url, body, Strategy::Generic);
        }

        let raw = generic::raw_text(&page);
        if !raw.is_empty() {
            return self.finish(page_title, url, raw, Strategy::RawText);
        }

        self.finish(
            page_title,
            url,
            PLACEHOLDER_BODY.to_string(),
            Strategy::Placeholder,
        )
    }

    fn finish(&self, title: String, url: &Url, body: String, strategy: Strategy) -> Document {
        tracing::debug!(
            target: "web.extract",
            url = %url,
            %strategy,
            body_len = body.len(),
            "extract.done"
        );
        Document {
            title,
            source: url.clone(),
            body,
            strategy,
        }
    }
}

fn host_title(url: &Url) -> String {
    url.host_str().unwrap_or("untitled").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Never;

    impl SiteExtractor for Never {
        fn id(&self) -> &'static str {
            "never"
        }
        fn is_match(&self, url: &Url) -> bool {
            url.host_str() == Some("shop.example")
        }
        fn extract(&self, _html: &str) -> Option<Extracted> {
            None
        }
    }

    struct Always(&'static str);

    impl SiteExtractor for Always {
        fn id(&self) -> &'static str {
            self.0
        }
        fn is_match(&self, _url: &Url) -> bool {
            true
        }
        fn extract(&self, _html: &str) -> Option<Extracted> {
            Some(Extracted {
                title: self.0.to_string(),
                body_html: format!("<p>{}</p>", self.0),
            })
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn unmatched_page_falls_back_to_generic_with_title() {
        let html = "<html><head><title>Погода в Минске</title></head>\
                    <body><nav>menu</nav><p>Сегодня солнечно.</p></body></html>";
        let doc = ExtractionDispatcher::with_defaults().extract(html, &url("https://pogoda.example/minsk"));

        assert_eq!(doc.strategy, Strategy::Generic);
        let text = doc.render();
        assert!(text.starts_with("# Погода в Минске\n\nSource: https://pogoda.example/minsk\n\n---\n\n"));
        assert!(text.contains("Сегодня солнечно."));
        assert!(!text.contains("menu"));
    }

    #[test]
    fn extractor_miss_is_not_an_error() {
        let html = "<html><head><title>Shop</title></head><body><p>Items</p></body></html>";
        let dispatcher = ExtractionDispatcher::new().with(Never);
        let doc = dispatcher.extract(html, &url("https://shop.example/list"));
        assert_eq!(doc.strategy, Strategy::Generic);
        assert_eq!(doc.body, "Items");
    }

    #[test]
    fn first_registered_extractor_wins() {
        let dispatcher = ExtractionDispatcher::new().with(Always("first")).with(Always("second"));
        let target = url("https://any.example/");
        assert_eq!(dispatcher.select(&target).map(|e| e.id()), Some("first"));
        let doc = dispatcher.extract("<html></html>", &target);
        assert_eq!(doc.strategy, Strategy::Extractor("first"));
        assert_eq!(doc.title, "first");
    }

    #[test]
    fn noise_only_page_uses_raw_text() {
        let html = "<html><head><title>T</title></head><body><nav>Only navigation</nav></body></html>";
        let doc = ExtractionDispatcher::new().extract(html, &url("https://a.example/"));
        assert_eq!(doc.strategy, Strategy::RawText);
        assert_eq!(doc.body, "Only navigation");
    }

    #[test]
    fn deeply_nested_page_still_produces_a_document() {
        let depth = 20_000;
        let html = format!(
            "<html><head><title>Deep</title></head><body>{}x{}</body></html>",
            "<div>".repeat(depth),
            "</div>".repeat(depth)
        );
        let doc = ExtractionDispatcher::with_defaults().extract(&html, &url("https://deep.example/"));
        assert_eq!(doc.strategy, Strategy::Generic);
        assert_eq!(doc.title, "Deep");
        assert_eq!(doc.body, "x");
    }

    #[test]
    fn empty_page_gets_placeholder_and_host_title() {
        let doc = ExtractionDispatcher::new().extract("", &url("https://empty.example/x"));
        assert_eq!(doc.strategy, Strategy::Placeholder);
        assert_eq!(doc.title, "empty.example");
        assert_eq!(doc.body, PLACEHOLDER_BODY);
    }
}
