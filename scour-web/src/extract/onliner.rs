use scraper::{Html, Selector};
use url::Url;

use super::{Extracted, SiteExtractor};

const HOST: &str = "catalog.onliner.by";
const FALLBACK_TITLE: &str = "Каталог Onlíner";

/// Most specific container first: offers list, product card, middle column.
const CONTAINERS: &[&str] = &[".catalog-form__offers", ".catalog-content", ".g-middle"];

/// Product listings and cards on the Onliner catalog.
pub struct CatalogOnlinerExtractor;

impl SiteExtractor for CatalogOnlinerExtractor {
    fn id(&self) -> &'static str {
        "catalog.onliner"
    }

    fn is_match(&self, url: &Url) -> bool {
        url.host_str()
            .is_some_and(|h| h.eq_ignore_ascii_case(HOST))
    }

    fn extract(&self, html: &str) -> Option<Extracted> {
        let page = Html::parse_document(html);
        let title = Selector::parse("title")
            .ok()
            .and_then(|s| page.select(&s).next())
            .map(|t| t.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| FALLBACK_TITLE.to_string());

        CONTAINERS.iter().find_map(|css| {
            let selector = Selector::parse(css).ok()?;
            let node = page.select(&selector).next()?;
            Some(Extracted {
                title: title.clone(),
                body_html: node.inner_html(),
            })
        })
    }
}
