//! Site-agnostic markup to markdown.
//!
//! The page is first pruned with `scraper` into a small, well-formed HTML
//! subset: noise dropped, links made absolute, attributes stripped, nesting
//! capped. `htmd` turns that subset into markdown. Embedded JSON-LD bypasses
//! the converter and is spliced back in as fenced blocks.

use htmd::HtmlToMarkdown;
use htmd::options::{CodeBlockStyle, HeadingStyle, LinkStyle, Options};
use scraper::{ElementRef, Html, Selector};
use url::Url;

const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "iframe", "nav", "header", "footer",
    "aside", "form", "button", "select", "input", "textarea",
];

const NOISE_TOKENS: &[&str] = &[
    "ad",
    "ads",
    "advert",
    "advertisement",
    "banner",
    "social",
    "share",
    "sharing",
    "cookie",
    "cookies",
    "popup",
    "promo",
    "sponsor",
    "sponsored",
];

/// Tags passed through to the converter under their own name.
const KEPT_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "p", "ul", "ol", "li", "blockquote", "table", "thead",
    "tbody", "tfoot", "tr", "td", "th", "dl", "dt", "dd", "strong", "b", "em", "i", "code",
];

/// Containers passed through as `<div>` so block boundaries survive.
const BLOCK_TAGS: &[&str] = &[
    "div", "section", "article", "main", "body", "figure", "figcaption",
];

/// Deepest emitted nesting; anything below is flattened to text.
const MAX_NESTING: usize = 64;

const LD_JSON_MARK: &str = "SCOURLDJSON";

/// Text of the first non-empty `<title>`.
pub fn document_title(page: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    page.select(&selector)
        .map(|t| collapse(&t.text().collect::<String>()))
        .find(|t| !t.is_empty())
}

/// Prune the page and convert what is left to markdown. Embedded JSON-LD
/// is kept as a fenced block. Empty when nothing survives.
pub fn render_markdown(page: &Html, base: &Url) -> String {
    let pruned = prune(page.root_element(), base);
    if !pruned.has_content {
        return String::new();
    }
    let markdown = match converter().convert(&pruned.html) {
        Ok(markdown) => markdown,
        Err(e) => {
            tracing::debug!(target: "web.extract", error = %e, "extract.convert_failed");
            return String::new();
        }
    };
    tidy(&markdown, &pruned.ld_json)
}

/// Every visible text node, whitespace collapsed, noise filters off.
pub fn raw_text(page: &Html) -> String {
    let root = Selector::parse("body")
        .ok()
        .and_then(|s| page.select(&s).next())
        .unwrap_or_else(|| page.root_element());
    collapse(&collect_text(root))
}

fn converter() -> HtmlToMarkdown {
    HtmlToMarkdown::builder()
        .options(Options {
            heading_style: HeadingStyle::Atx,
            code_block_style: CodeBlockStyle::Fenced,
            link_style: LinkStyle::Inlined,
            ..Default::default()
        })
        .build()
}

fn collect_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    let mut stack = vec![*element];
    while let Some(node) = stack.pop() {
        if let Some(text) = node.value().as_text() {
            out.push_str(text);
            out.push(' ');
        } else if ElementRef::wrap(node).is_some_and(|el| {
            !matches!(el.value().name(), "script" | "style" | "noscript" | "template")
        }) {
            let children: Vec<_> = node.children().collect();
            stack.extend(children.into_iter().rev());
        }
    }
    out
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_ld_json(element: ElementRef<'_>) -> bool {
    element.value().name() == "script"
        && element
            .value()
            .attr("type")
            .is_some_and(|t| t.trim().eq_ignore_ascii_case("application/ld+json"))
}

fn is_noise(element: ElementRef<'_>) -> bool {
    let el = element.value();
    if SKIPPED_TAGS.contains(&el.name()) {
        return true;
    }
    if el.attr("hidden").is_some() {
        return true;
    }
    if el
        .attr("aria-hidden")
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    {
        return true;
    }
    if let Some(style) = el.attr("style") {
        let compact: String = style
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        if compact.contains("display:none") {
            return true;
        }
    }
    el.classes()
        .chain(el.id())
        .flat_map(|v| v.split(|c: char| !c.is_ascii_alphanumeric()))
        .any(|token| NOISE_TOKENS.iter().any(|n| n.eq_ignore_ascii_case(token)))
}

fn link_target(element: ElementRef<'_>, base: &Url) -> Option<String> {
    let href = element.value().attr("href")?.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.to_ascii_lowercase().starts_with("javascript:")
    {
        return None;
    }
    base.join(href).ok().map(String::from)
}

fn push_escaped(out: &mut String, text: &str, attr: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attr => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

struct Pruned {
    html: String,
    ld_json: Vec<String>,
    has_content: bool,
}

enum Step<'a, N> {
    /// Node and the number of tags currently open around it.
    Enter(N, usize),
    Leave(&'a str),
}

fn prune(root: ElementRef<'_>, base: &Url) -> Pruned {
    let mut out = Pruned {
        html: String::new(),
        ld_json: Vec::new(),
        has_content: false,
    };
    let mut stack = vec![Step::Enter(*root, 0)];

    while let Some(step) = stack.pop() {
        let (node, depth) = match step {
            Step::Leave(tag) => {
                out.html.push_str("</");
                out.html.push_str(tag);
                out.html.push('>');
                continue;
            }
            Step::Enter(node, depth) => (node, depth),
        };

        if let Some(text) = node.value().as_text() {
            out.has_content |= !text.trim().is_empty();
            push_escaped(&mut out.html, text, false);
            continue;
        }
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        let name = element.value().name();

        if is_ld_json(element) {
            out.push_ld_json(element);
            continue;
        }
        if name == "head" {
            for script in element.children().filter_map(ElementRef::wrap) {
                if is_ld_json(script) {
                    out.push_ld_json(script);
                }
            }
            continue;
        }
        if is_noise(element) || name == "img" {
            continue;
        }

        match name {
            "br" | "hr" => {
                out.html.push('<');
                out.html.push_str(name);
                out.html.push('>');
                continue;
            }
            "pre" => {
                let code = element.text().collect::<String>();
                let code = code.trim_matches('\n');
                if !code.trim().is_empty() {
                    out.has_content = true;
                    out.html.push_str("<pre><code>");
                    push_escaped(&mut out.html, code, false);
                    out.html.push_str("</code></pre>");
                }
                continue;
            }
            _ => {}
        }

        let (tag, href) = if name == "a" {
            if element.text().all(|t| t.trim().is_empty()) {
                continue;
            }
            match link_target(element, base) {
                Some(href) => (Some("a"), Some(href)),
                None => (None, None),
            }
        } else if KEPT_TAGS.contains(&name) {
            (Some(name), None)
        } else if BLOCK_TAGS.contains(&name) {
            (Some("div"), None)
        } else {
            (None, None)
        };

        let Some(tag) = tag else {
            let children: Vec<_> = node.children().collect();
            stack.extend(children.into_iter().rev().map(|c| Step::Enter(c, depth)));
            continue;
        };

        if depth >= MAX_NESTING {
            let text = collapse(&collect_text(element));
            out.has_content |= !text.is_empty();
            out.html.push(' ');
            push_escaped(&mut out.html, &text, false);
            out.html.push(' ');
            continue;
        }

        match href {
            Some(href) => {
                out.html.push_str("<a href=\"");
                push_escaped(&mut out.html, &href, true);
                out.html.push_str("\">");
            }
            None => {
                out.html.push('<');
                out.html.push_str(tag);
                out.html.push('>');
            }
        }
        stack.push(Step::Leave(tag));
        let children: Vec<_> = node.children().collect();
        stack.extend(children.into_iter().rev().map(|c| Step::Enter(c, depth + 1)));
    }
    out
}

impl Pruned {
    fn push_ld_json(&mut self, element: ElementRef<'_>) {
        let raw = element.text().collect::<String>();
        let raw = raw.trim();
        if raw.is_empty() {
            return;
        }
        self.html.push_str(&format!("<p>{LD_JSON_MARK}{}</p>", self.ld_json.len()));
        self.ld_json.push(raw.to_string());
        self.has_content = true;
    }
}

/// Trim trailing spaces, squeeze blank-line runs, and put JSON-LD back.
fn tidy(markdown: &str, ld_json: &[String]) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut gap = false;
    for line in markdown.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            gap = !lines.is_empty();
            continue;
        }
        if gap {
            lines.push(String::new());
            gap = false;
        }
        let block = line
            .trim()
            .strip_prefix(LD_JSON_MARK)
            .and_then(|n| n.parse::<usize>().ok())
            .and_then(|n| ld_json.get(n));
        match block {
            Some(raw) => lines.push(format!("```json\n{raw}\n```")),
            None => lines.push(line.to_string()),
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(html: &str) -> String {
        let base = Url::parse("https://news.example/section/").unwrap();
        render_markdown(&Html::parse_document(html), &base)
    }

    #[test]
    fn headings_paragraphs_and_lists() {
        let out = render(
            "<body><h2>Курс валют</h2><p>USD  \n  3.27</p>\
             <ul><li>EUR</li><li>RUB <b>100</b></li></ul></body>",
        );
        assert!(out.starts_with("## Курс валют\n\n"), "{out}");
        assert!(out.contains("USD 3.27"), "{out}");
        assert!(out.contains("EUR"), "{out}");
        assert!(out.contains("RUB"), "{out}");
    }

    #[test]
    fn links_resolve_against_page_url() {
        let out = render(
            "<p>See <a href=\"../item/7\">item</a> and \
             <a href=\"javascript:void(0)\">this</a> or <a href=\"#top\">top</a>.</p>",
        );
        assert!(out.contains("[item](https://news.example/item/7)"), "{out}");
        assert!(out.contains("this or top"), "{out}");
        assert!(!out.contains("javascript"), "{out}");
    }

    #[test]
    fn noise_is_dropped() {
        let out = render(
            "<body><header>Logo</header>\
             <div class=\"ad-slot\">Buy now</div>\
             <div id=\"cookie_bar\">Accept</div>\
             <div class=\"header-shadow\">kept</div>\
             <p hidden>h</p><p aria-hidden=\"true\">a</p>\
             <p style=\"display: none\">s</p>\
             <script>var x = 1;</script><style>p{}</style>\
             <article><p>Story</p></article>\
             <footer>(c)</footer></body>",
        );
        assert_eq!(out, "kept\n\nStory");
    }

    #[test]
    fn structured_data_is_kept_as_json_block() {
        let out = render(
            "<html><head><script type=\"application/ld+json\">{\"@type\":\"Product\"}</script>\
             </head><body><p>Body</p></body></html>",
        );
        assert_eq!(out, "```json\n{\"@type\":\"Product\"}\n```\n\nBody");
    }

    #[test]
    fn code_blocks_are_fenced() {
        let out = render("<body><pre>let a = 1;\nlet b = 2;</pre></body>");
        assert!(out.starts_with("```"), "{out}");
        assert!(out.contains("let a = 1;\nlet b = 2;"), "{out}");
    }

    #[test]
    fn deeply_nested_page_still_renders() {
        let depth = 20_000;
        let html = format!("{}deep text{}", "<div>".repeat(depth), "</div>".repeat(depth));
        let out = render(&html);
        assert_eq!(out, "deep text");

        let html = format!("{}x{}", "<span><em>".repeat(depth), "</em></span>".repeat(depth));
        assert!(render(&html).contains('x'));
    }

    #[test]
    fn markup_in_text_is_not_reinterpreted() {
        let out = render("<p>a &lt;script&gt;alert(1)&lt;/script&gt; b</p>");
        assert!(out.contains("alert(1)"), "{out}");
        assert!(out.contains("a "), "{out}");
    }

    #[test]
    fn title_and_raw_text() {
        let page = Html::parse_document(
            "<html><head><title>  A   page </title></head>\
             <body><nav>one</nav><script>x()</script><div>two</div></body></html>",
        );
        assert_eq!(document_title(&page).as_deref(), Some("A page"));
        assert_eq!(raw_text(&page), "one two");
    }

    #[test]
    fn raw_text_survives_deep_nesting() {
        let html = format!("<body>{}y{}</body>", "<b>".repeat(20_000), "</b>".repeat(20_000));
        assert_eq!(raw_text(&Html::parse_document(&html)), "y");
    }
}
