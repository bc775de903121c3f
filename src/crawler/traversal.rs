//! Bounded-depth, same-origin traversal
//!
//! The crawl is an explicit depth-first work stack. Each frontier entry carries
//! its own depth, and the visited set is checked and updated before a page is
//! fetched, so cyclic link graphs terminate and no URL is requested twice.

use std::collections::HashSet;

use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::crawler::content_extraction::{self, ExtractedPage};
use crate::crawler::error::FetchError;
use crate::crawler::fetcher::PageFetcher;
use crate::crawler::{CrawlerConfig, Document, ExtractionMethod, Provenance};

/// A URL waiting to be fetched, tagged with its depth from the seed
#[derive(Debug, Clone)]
struct FrontierItem {
    url: Url,
    depth: u32,
}

/// Per-invocation traversal state; never outlives a single crawl
#[derive(Debug, Default)]
struct CrawlState {
    visited: HashSet<String>,
    frontier: Vec<FrontierItem>,
}

impl CrawlState {
    fn new(seed: Url) -> Self {
        Self {
            visited: HashSet::new(),
            frontier: vec![FrontierItem {
                url: seed,
                depth: 0,
            }],
        }
    }

    fn next(&mut self) -> Option<FrontierItem> {
        self.frontier.pop()
    }

    /// Records the URL as visited; false if it was already seen
    fn visit(&mut self, url: &Url) -> bool {
        self.visited.insert(url.as_str().to_string())
    }

    /// Queue children so that the first link in document order is popped first
    fn push_children(&mut self, links: Vec<Url>, depth: u32) {
        for url in links.into_iter().rev() {
            if !self.visited.contains(url.as_str()) {
                self.frontier.push(FrontierItem { url, depth });
            }
        }
    }
}

/// Result of a traversal, including why the seed failed if it did
#[derive(Debug, Default)]
pub(crate) struct CrawlOutcome {
    pub documents: Vec<Document>,
    pub seed_error: Option<FetchError>,
    pub pages_fetched: usize,
}

/// Depth-first crawler over any `PageFetcher`
#[derive(Debug, Clone)]
pub struct Crawler {
    config: CrawlerConfig,
}

impl Crawler {
    /// Create a crawler with the given configuration
    pub fn new(config: CrawlerConfig) -> Self {
        Self { config }
    }

    /// Crawl from `seed_url`, returning every page that passed extraction
    ///
    /// Never fails: an unreachable seed yields an empty list.
    pub async fn crawl<F>(
        &self,
        fetcher: &F,
        seed_url: &str,
        method: ExtractionMethod,
    ) -> Vec<Document>
    where
        F: PageFetcher + ?Sized,
    {
        self.traverse(fetcher, seed_url, method).await.documents
    }

    #[instrument(skip(self, fetcher))]
    pub(crate) async fn traverse<F>(
        &self,
        fetcher: &F,
        seed_url: &str,
        method: ExtractionMethod,
    ) -> CrawlOutcome
    where
        F: PageFetcher + ?Sized,
    {
        let mut outcome = CrawlOutcome::default();

        let seed = match Url::parse(seed_url) {
            Ok(url) => url,
            Err(e) => {
                warn!("Invalid seed URL {}: {}", seed_url, e);
                outcome.seed_error = Some(e.into());
                return outcome;
            }
        };

        info!("Starting {} crawl for {}", method, seed);
        let timeout = self.config.page_timeout();
        let budget = self.config.document_budget();
        let mut state = CrawlState::new(seed);

        while let Some(item) = state.next() {
            if !state.visit(&item.url) {
                continue;
            }

            outcome.pages_fetched += 1;
            let html = match fetcher.fetch(item.url.as_str(), timeout).await {
                Ok(html) => html,
                Err(e) => {
                    warn!("Error fetching {}: {}", item.url, e);
                    if item.depth == 0 {
                        outcome.seed_error = Some(e);
                    }
                    continue;
                }
            };

            let extraction =
                content_extraction::extract(&html, &item.url, self.config.min_text_length);

            match extraction.content {
                Some(page) => {
                    let position = outcome.documents.len();
                    outcome.documents.push(build_document(
                        seed_url, &item, position, page, method,
                    ));
                }
                None => debug!("Skipping low-signal page: {}", item.url),
            }

            if item.depth < self.config.max_depth && outcome.documents.len() < budget {
                let children: Vec<Url> = extraction
                    .links
                    .into_iter()
                    .take(self.config.max_links_per_page)
                    .collect();
                state.push_children(children, item.depth + 1);
            }
        }

        info!(
            "Crawl of {} finished: {} document(s) from {} page(s)",
            seed_url,
            outcome.documents.len(),
            outcome.pages_fetched
        );
        outcome
    }
}

fn build_document(
    seed_url: &str,
    item: &FrontierItem,
    position: usize,
    page: ExtractedPage,
    method: ExtractionMethod,
) -> Document {
    let page_url = item.url.to_string();
    Document {
        id: Document::derive_id(&page_url, position),
        title: page.title.unwrap_or_else(|| page_url.clone()),
        body: page.text,
        provenance: Provenance {
            source_url: seed_url.to_string(),
            page_url,
            crawl_depth: item.depth,
            extraction_method: method,
        },
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    pub(crate) const PARAGRAPH: &str = "Hello World, this is a substantial paragraph of content exceeding the minimum threshold length for extraction.";

    /// Serves canned pages and counts requests per URL
    #[derive(Default)]
    pub(crate) struct StubFetcher {
        pages: HashMap<String, String>,
        calls: Mutex<HashMap<String, usize>>,
    }

    impl StubFetcher {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn page(mut self, url: &str, html: String) -> Self {
            self.pages.insert(url.to_string(), html);
            self
        }

        pub(crate) fn calls(&self, url: &str) -> usize {
            self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
        }

        pub(crate) fn total_calls(&self) -> usize {
            self.calls.lock().unwrap().values().sum()
        }
    }

    #[async_trait]
    impl PageFetcher for StubFetcher {
        async fn fetch(&self, url: &str, _timeout: Duration) -> Result<String, FetchError> {
            *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                })
        }
    }

    /// A content page linking to `links`
    pub(crate) fn html_page(title: &str, links: &[&str]) -> String {
        let anchors: String = links
            .iter()
            .map(|l| format!("<a href=\"{}\">link</a>", l))
            .collect();
        format!(
            "<html><head><title>{}</title></head><body><p>{} ({})</p>{}</body></html>",
            title, PARAGRAPH, title, anchors
        )
    }

    fn crawler(max_depth: u32, max_links: usize) -> Crawler {
        Crawler::new(
            CrawlerConfig::builder()
                .max_depth(max_depth)
                .max_links_per_page(max_links)
                .build(),
        )
    }

    #[tokio::test]
    async fn test_depth_zero_fetches_only_seed() {
        let fetcher = StubFetcher::new().page(
            "https://example.com/",
            html_page("Home", &["/a", "/b"]),
        );

        let docs = crawler(0, 2)
            .crawl(&fetcher, "https://example.com/", ExtractionMethod::Rendered)
            .await;

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].provenance.crawl_depth, 0);
        assert_eq!(docs[0].title, "Home");
        assert_eq!(fetcher.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_cycles_are_fetched_once() {
        let fetcher = StubFetcher::new()
            .page("https://example.com/", html_page("Home", &["/a", "/b"]))
            .page("https://example.com/a", html_page("A", &["/", "/b"]))
            .page("https://example.com/b", html_page("B", &["/a", "/"]));

        let docs = crawler(5, 3)
            .crawl(&fetcher, "https://example.com/", ExtractionMethod::Rendered)
            .await;

        assert_eq!(docs.len(), 3);
        for url in ["https://example.com/", "https://example.com/a", "https://example.com/b"] {
            assert_eq!(fetcher.calls(url), 1, "{} fetched more than once", url);
        }
    }

    #[tokio::test]
    async fn test_depth_bound() {
        let fetcher = StubFetcher::new()
            .page("https://example.com/", html_page("0", &["/1"]))
            .page("https://example.com/1", html_page("1", &["/2"]))
            .page("https://example.com/2", html_page("2", &["/3"]))
            .page("https://example.com/3", html_page("3", &[]));

        let docs = crawler(2, 5)
            .crawl(&fetcher, "https://example.com/", ExtractionMethod::Rendered)
            .await;

        assert_eq!(docs.len(), 3);
        assert!(docs.iter().all(|d| d.provenance.crawl_depth <= 2));
        assert_eq!(fetcher.calls("https://example.com/3"), 0);
    }

    #[tokio::test]
    async fn test_depth_first_order_and_links_per_page() {
        let fetcher = StubFetcher::new()
            .page(
                "https://example.com/",
                html_page("Home", &["/a", "/b", "/c", "https://other.org/x"]),
            )
            .page("https://example.com/a", html_page("A", &["/a1"]))
            .page("https://example.com/a1", html_page("A1", &[]))
            .page("https://example.com/b", html_page("B", &[]))
            .page("https://example.com/c", html_page("C", &[]));

        let docs = crawler(3, 2)
            .crawl(&fetcher, "https://example.com/", ExtractionMethod::Rendered)
            .await;

        let titles: Vec<&str> = docs.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["Home", "A", "A1", "B"]);
        assert_eq!(fetcher.calls("https://example.com/c"), 0);
        assert_eq!(fetcher.calls("https://other.org/x"), 0);
    }

    #[tokio::test]
    async fn test_document_budget_stops_recursion() {
        let fetcher = StubFetcher::new()
            .page("https://example.com/", html_page("0", &["/1"]))
            .page("https://example.com/1", html_page("1", &["/2"]))
            .page("https://example.com/2", html_page("2", &["/3"]))
            .page("https://example.com/3", html_page("3", &[]));

        // budget is 2 × 1 documents
        let docs = crawler(10, 1)
            .crawl(&fetcher, "https://example.com/", ExtractionMethod::Rendered)
            .await;

        assert_eq!(docs.len(), 2);
        assert_eq!(fetcher.calls("https://example.com/2"), 0);
    }

    #[tokio::test]
    async fn test_failed_child_does_not_abort_siblings() {
        let fetcher = StubFetcher::new()
            .page("https://example.com/", html_page("Home", &["/missing", "/ok"]))
            .page("https://example.com/ok", html_page("Ok", &[]));

        let docs = crawler(1, 2)
            .crawl(&fetcher, "https://example.com/", ExtractionMethod::Rendered)
            .await;

        assert_eq!(docs.len(), 2);
        assert_eq!(fetcher.calls("https://example.com/missing"), 1);
        assert_eq!(docs[1].title, "Ok");
    }

    #[tokio::test]
    async fn test_low_signal_page_is_dropped_but_traversed() {
        let fetcher = StubFetcher::new()
            .page(
                "https://example.com/",
                "<html><body><p>Tiny page</p><a href=\"/full\">more</a></body></html>"
                    .to_string(),
            )
            .page("https://example.com/full", html_page("Full", &[]));

        let docs = crawler(1, 2)
            .crawl(&fetcher, "https://example.com/", ExtractionMethod::Rendered)
            .await;

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].provenance.page_url, "https://example.com/full");
        assert_eq!(docs[0].provenance.crawl_depth, 1);
        assert_eq!(docs[0].provenance.source_url, "https://example.com/");
    }

    #[tokio::test]
    async fn test_unreachable_seed_yields_nothing() {
        let fetcher = StubFetcher::new();
        let outcome = crawler(3, 2)
            .traverse(&fetcher, "https://example.com/", ExtractionMethod::Rendered)
            .await;

        assert!(outcome.documents.is_empty());
        assert!(matches!(outcome.seed_error, Some(FetchError::Status { .. })));
    }

    #[tokio::test]
    async fn test_title_defaults_to_url_and_ids_follow_position() {
        let fetcher = StubFetcher::new().page(
            "https://example.com/",
            format!("<html><body><p>{}</p></body></html>", PARAGRAPH),
        );

        let docs = crawler(0, 2)
            .crawl(&fetcher, "https://example.com/", ExtractionMethod::Fallback)
            .await;

        assert_eq!(docs[0].title, "https://example.com/");
        assert_eq!(docs[0].id, "https://example.com/#0");
        assert_eq!(docs[0].provenance.extraction_method, ExtractionMethod::Fallback);
    }
}
