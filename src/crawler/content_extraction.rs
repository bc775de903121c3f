//! Content extraction functionality for the crawler module

use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

/// Elements whose text never counts as page content
const NON_CONTENT_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "iframe", "svg", "canvas", "object",
];

/// Clean text and title of a page that passed the signal threshold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    /// Contents of `<title>`, if present and non-blank
    pub title: Option<String>,

    /// Whitespace-collapsed visible text
    pub text: String,
}

/// Result of running the extractor over one page
#[derive(Debug, Clone, Default)]
pub struct PageExtraction {
    /// `None` when the page is below the minimum-signal length
    pub content: Option<ExtractedPage>,

    /// Same-origin outbound links in document order, de-duplicated
    pub links: Vec<Url>,
}

impl PageExtraction {
    /// Whether the page was filtered out as low-signal
    pub fn is_empty(&self) -> bool {
        self.content.is_none()
    }
}

/// Extract text, title and same-origin links from rendered HTML
///
/// # Arguments
///
/// * `html` - The page markup
/// * `page_url` - The URL the markup was loaded from, used to resolve links
/// * `min_text_length` - Pages whose title plus cleaned text is not longer than this are dropped
pub fn extract(html: &str, page_url: &Url, min_text_length: usize) -> PageExtraction {
    let document = Html::parse_document(html);

    let text = visible_text(&document);
    let title = extract_title(&document);

    // the title counts toward the signal threshold but is not part of the text
    let signal_length = text.chars().count()
        + title.as_ref().map_or(0, |t| t.chars().count() + 1);

    let content = if signal_length > min_text_length {
        Some(ExtractedPage { title, text })
    } else {
        None
    };

    PageExtraction {
        content,
        links: same_origin_links(&document, page_url),
    }
}

/// Collect visible text, skipping non-content subtrees, and collapse whitespace
pub fn visible_text(document: &Html) -> String {
    let root = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element());

    let mut raw = String::new();
    collect_text(root, &mut raw);
    collapse_whitespace(&raw)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(el) if NON_CONTENT_TAGS.contains(&el.name()) => {}
            Node::Element(_) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    collect_text(child_element, out);
                }
            }
            _ => {}
        }
    }
}

/// Collapse runs of whitespace into single spaces and trim
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn extract_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|title| !title.is_empty())
}

fn same_origin_links(document: &Html, page_url: &Url) -> Vec<Url> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut links: Vec<Url> = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(link) = resolve_link(page_url, href) else {
            continue;
        };
        if same_origin(page_url, &link) && !links.contains(&link) {
            links.push(link);
        }
    }
    links
}

/// Resolve an href against the page URL, dropping fragments and non-web schemes
pub fn resolve_link(page_url: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let mut link = page_url.join(href).ok()?;
    if !matches!(link.scheme(), "http" | "https") {
        return None;
    }
    link.set_fragment(None);
    Some(link)
}

/// Scheme and host (including effective port) match
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
}
