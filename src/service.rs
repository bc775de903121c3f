//! # Knowledge Service
//!
//! The operations exposed to callers: ingest a site, remove it, clear
//! everything, list sources and browse stored records.
//!
//! Ingestion runs the extraction strategies in order, stores the winning
//! documents and only then registers the source, so a failed ingestion never
//! leaves a registry entry behind. Removal checks the registry first and
//! unregisters the source after its records are gone.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};
use url::Url;

use crate::crawler::{
    ChromeEngine, CrawlError, CrawlerConfig, Document, ExtractionMethod, ExtractionStrategy,
    FallbackReader, FallbackStrategy, RenderedStrategy, run_strategies,
};
use crate::error::{Error, Result};
use crate::index::{IngestOutcome, KnowledgeStore, RecordPage, VectorStore};
use crate::registry::SourceRegistry;

/// Phrases static pages show when their content is built by scripts
const JS_SHELL_MARKERS: [&str; 3] = [
    "enable javascript",
    "you need to enable javascript",
    "javascript is disabled",
];

/// Outcome of a successful ingestion
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    /// Seed URL that was ingested
    pub url: String,

    /// Number of records stored for it
    pub document_count: usize,

    /// Strategy that produced the documents
    pub method: ExtractionMethod,

    /// Set when the content looks like a script-only shell
    pub warning: Option<String>,

    /// Registered sources after the ingestion
    pub sources: Vec<String>,
}

/// Outcome of removing a source
#[derive(Debug, Clone, Serialize)]
pub struct RemoveReport {
    /// Records deleted from the store
    pub deleted_count: usize,

    /// Sources still registered
    pub remaining: Vec<String>,
}

/// Build the default strategy list: rendered crawl first, static fallback second
///
/// With `use_browser` off only the fallback is used.
pub fn default_strategies(
    config: &CrawlerConfig,
    use_browser: bool,
) -> Result<Vec<Box<dyn ExtractionStrategy>>> {
    let mut strategies: Vec<Box<dyn ExtractionStrategy>> = Vec::with_capacity(2);

    if use_browser {
        let engine = Arc::new(ChromeEngine::new(config.clone()));
        strategies.push(Box::new(RenderedStrategy::new(engine, config.clone())));
    }

    let reader = FallbackReader::new(config.clone()).map_err(CrawlError::from)?;
    strategies.push(Box::new(FallbackStrategy::new(reader)));

    Ok(strategies)
}

/// Validate a caller-supplied URL, returning it trimmed
pub fn validate_url(raw: &str) -> Result<String> {
    let url = raw.trim();
    if url.is_empty() {
        return Err(Error::InvalidUrl("URL cannot be empty".to_string()));
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(Error::InvalidUrl(format!(
            "{} (must start with http:// or https://)",
            url
        )));
    }

    let parsed = Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{}: {}", url, e)))?;
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(Error::InvalidUrl(format!("{} (missing host)", url)));
    }

    Ok(url.to_string())
}

fn js_shell_warning(method: ExtractionMethod, documents: &[Document]) -> Option<String> {
    if method != ExtractionMethod::Fallback {
        return None;
    }

    let shell = documents.iter().any(|doc| {
        let body = doc.body.to_lowercase();
        JS_SHELL_MARKERS.iter().any(|marker| body.contains(marker))
    });

    shell.then(|| {
        "This site appears to require JavaScript. Content may be incomplete; \
         browser rendering is recommended."
            .to_string()
    })
}

/// Content lifecycle operations over a knowledge store and source registry
pub struct KnowledgeService<S> {
    knowledge: KnowledgeStore<S>,
    registry: Arc<SourceRegistry>,
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl<S: VectorStore> KnowledgeService<S> {
    /// Create a service from its collaborators
    pub fn new(
        knowledge: KnowledgeStore<S>,
        registry: Arc<SourceRegistry>,
        strategies: Vec<Box<dyn ExtractionStrategy>>,
    ) -> Self {
        Self {
            knowledge,
            registry,
            strategies,
        }
    }

    /// The source registry
    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.registry
    }

    /// The knowledge store adapter
    pub fn knowledge(&self) -> &KnowledgeStore<S> {
        &self.knowledge
    }

    /// Crawl `url`, store its documents and register it as a source
    ///
    /// Re-ingesting a registered source replaces its records.
    #[instrument(skip(self))]
    pub async fn ingest_from_url(&self, url: &str) -> Result<IngestReport> {
        let url = validate_url(url)?;

        let (method, documents) = run_strategies(&self.strategies, &url)
            .await
            .ok_or_else(|| Error::NoContentExtracted { url: url.clone() })?;

        let replacing = self.registry.contains(&url);
        if replacing {
            let replaced = self.knowledge.delete_by_source_url(&url).await?;
            info!("Replacing {} existing record(s) for {}", replaced, url);
        }

        let outcome = match self.store_documents(&url, &documents).await {
            Ok(outcome) => outcome,
            Err(e) => {
                // the old records are gone, so the source must not stay registered
                if replacing && self.registry.remove(&url).is_ok() {
                    warn!("Unregistered {} after its replacement records failed to store", url);
                }
                return Err(e);
            }
        };
        if outcome.rejected > 0 {
            warn!(
                "Stored {} of {} document(s) for {}",
                outcome.stored,
                documents.len(),
                url
            );
        }

        self.registry.add(&url);

        let warning = js_shell_warning(method, &documents);
        if let Some(warning) = &warning {
            warn!("{}: {}", url, warning);
        }

        Ok(IngestReport {
            url,
            document_count: outcome.stored,
            method,
            warning,
            sources: self.registry.list(),
        })
    }

    /// Store documents, failing if the store accepted none of them
    async fn store_documents(
        &self,
        url: &str,
        documents: &[Document],
    ) -> Result<IngestOutcome> {
        let outcome = self.knowledge.ingest(documents).await?;
        if outcome.stored == 0 {
            return Err(Error::Store(format!(
                "store rejected all {} record(s) for {}",
                outcome.rejected, url
            )));
        }
        Ok(outcome)
    }

    /// Delete every record of a registered source and unregister it
    #[instrument(skip(self))]
    pub async fn remove_url(&self, url: &str) -> Result<RemoveReport> {
        let url = validate_url(url)?;
        if !self.registry.contains(&url) {
            return Err(Error::NotFound(format!("URL not found in sources: {}", url)));
        }

        let deleted_count = self.knowledge.delete_by_source_url(&url).await?;
        self.registry.remove(&url)?;
        info!("Removed {} ({} record(s))", url, deleted_count);

        Ok(RemoveReport {
            deleted_count,
            remaining: self.registry.list(),
        })
    }

    /// Delete every record and forget every source
    #[instrument(skip(self))]
    pub async fn clear_all(&self) -> Result<usize> {
        let deleted = self.knowledge.clear_all().await?;
        self.registry.clear();
        info!("Cleared knowledge base ({} record(s))", deleted);
        Ok(deleted)
    }

    /// Registered sources in insertion order
    pub fn list_sources(&self) -> Vec<String> {
        self.registry.list()
    }

    /// Read a window of stored records
    ///
    /// Fails with `StoreUnavailable` before the first ingestion.
    #[instrument(skip(self))]
    pub async fn browse_records(&self, limit: usize, offset: usize) -> Result<RecordPage> {
        Ok(self.knowledge.list_sample(limit, offset).await?)
    }

    /// Whether any knowledge is loaded
    pub fn knowledge_loaded(&self) -> bool {
        self.registry.is_loaded()
    }

    /// Rebuild the registry from the sources actually present in the store
    ///
    /// Returns the number of sources registered afterwards.
    #[instrument(skip(self))]
    pub async fn reconcile_sources(&self) -> Result<usize> {
        let sources = self.knowledge.source_urls().await?;
        self.registry.replace_all(sources);
        let count = self.registry.len();
        info!("Registry reconciled with store: {} source(s)", count);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::strategy::tests::{StubEngine, stub_strategies};
    use crate::crawler::traversal::tests::{PARAGRAPH, StubFetcher, html_page};
    use crate::index::{
        CollectionInfo, MemoryStore, NewRecord, RecordId, ScrollCursor, ScrollPage, StoreError,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    const SEED: &str = "https://example.com/";

    /// Memory store whose upserts can be switched to fail
    #[derive(Default)]
    struct SwitchableStore {
        inner: MemoryStore,
        reject: AtomicBool,
    }

    #[async_trait]
    impl VectorStore for SwitchableStore {
        async fn ensure_collection(&self, collection: &str) -> std::result::Result<(), StoreError> {
            self.inner.ensure_collection(collection).await
        }

        async fn collection_info(
            &self,
            collection: &str,
        ) -> std::result::Result<Option<CollectionInfo>, StoreError> {
            self.inner.collection_info(collection).await
        }

        async fn upsert(
            &self,
            collection: &str,
            record: NewRecord,
        ) -> std::result::Result<RecordId, StoreError> {
            if self.reject.load(Ordering::SeqCst) {
                return Err(StoreError::Query("write rejected".to_string()));
            }
            self.inner.upsert(collection, record).await
        }

        async fn scroll(
            &self,
            collection: &str,
            limit: usize,
            cursor: Option<ScrollCursor>,
        ) -> std::result::Result<ScrollPage, StoreError> {
            self.inner.scroll(collection, limit, cursor).await
        }

        async fn delete(
            &self,
            collection: &str,
            ids: &[RecordId],
        ) -> std::result::Result<(), StoreError> {
            self.inner.delete(collection, ids).await
        }
    }

    fn site() -> Vec<(&'static str, String)> {
        vec![
            (SEED, html_page("Home", &["/about", "/blog"])),
            ("https://example.com/about", html_page("About", &[])),
            ("https://example.com/blog", html_page("Blog", &[])),
        ]
    }

    fn service(
        engine: StubEngine,
        fallback: StubFetcher,
    ) -> KnowledgeService<Arc<MemoryStore>> {
        service_on(Arc::new(MemoryStore::new()), engine, fallback)
    }

    fn service_on(
        store: Arc<MemoryStore>,
        engine: StubEngine,
        fallback: StubFetcher,
    ) -> KnowledgeService<Arc<MemoryStore>> {
        KnowledgeService::new(
            KnowledgeStore::new(store, "website-content").with_page_size(2),
            Arc::new(SourceRegistry::new()),
            stub_strategies(engine, fallback),
        )
    }

    #[test]
    fn test_validate_url() {
        assert!(matches!(validate_url("   "), Err(Error::InvalidUrl(_))));
        assert!(matches!(validate_url("ftp://example.com"), Err(Error::InvalidUrl(_))));
        assert!(matches!(validate_url("example.com"), Err(Error::InvalidUrl(_))));
        assert!(matches!(validate_url("http://"), Err(Error::InvalidUrl(_))));
        assert_eq!(
            validate_url("  https://example.com/docs ").unwrap(),
            "https://example.com/docs"
        );
    }

    #[test]
    fn test_js_shell_warning_only_for_fallback() {
        let doc = Document {
            id: "x".to_string(),
            title: "x".to_string(),
            body: "Please ENABLE JavaScript to run this app.".to_string(),
            provenance: crate::crawler::Provenance {
                source_url: SEED.to_string(),
                page_url: SEED.to_string(),
                crawl_depth: 0,
                extraction_method: ExtractionMethod::Fallback,
            },
        };
        assert!(js_shell_warning(ExtractionMethod::Fallback, &[doc.clone()]).is_some());
        assert!(js_shell_warning(ExtractionMethod::Rendered, &[doc]).is_none());
    }

    #[tokio::test]
    async fn test_ingest_registers_source() {
        let service = service(StubEngine::new(site()), StubFetcher::new());

        let report = service.ingest_from_url(SEED).await.unwrap();
        assert_eq!(report.method, ExtractionMethod::Rendered);
        assert_eq!(report.document_count, 3);
        assert!(report.warning.is_none());
        assert_eq!(report.sources, vec![SEED]);
        assert!(service.knowledge_loaded());
    }

    #[tokio::test]
    async fn test_ingest_twice_lists_source_once() {
        let service = service(StubEngine::new(site()), StubFetcher::new());

        service.ingest_from_url(SEED).await.unwrap();
        let second = service.ingest_from_url(SEED).await.unwrap();

        assert_eq!(service.list_sources(), vec![SEED]);
        let page = service.browse_records(100, 0).await.unwrap();
        assert_eq!(page.total, second.document_count);
    }

    #[tokio::test]
    async fn test_ingest_then_remove_round_trip() {
        let service = service(StubEngine::new(site()), StubFetcher::new());

        let report = service.ingest_from_url(SEED).await.unwrap();
        let removed = service.remove_url(SEED).await.unwrap();

        assert_eq!(removed.deleted_count, report.document_count);
        assert!(removed.remaining.is_empty());
        assert!(!service.list_sources().contains(&SEED.to_string()));
        assert!(!service.knowledge_loaded());
    }

    #[tokio::test]
    async fn test_remove_unknown_url_is_not_found() {
        let service = service(StubEngine::new(site()), StubFetcher::new());
        assert!(matches!(
            service.remove_url("https://other.com/").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_blank_url_is_invalid() {
        let service = service(StubEngine::new(site()), StubFetcher::new());
        match service.remove_url("   ").await {
            Err(Error::InvalidUrl(msg)) => assert!(msg.contains("cannot be empty")),
            other => panic!("Expected InvalidUrl, got {:?}", other),
        }
        assert!(matches!(
            service.remove_url("example.com").await,
            Err(Error::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_replacement_unregisters_source() {
        let store = Arc::new(SwitchableStore::default());
        let service = KnowledgeService::new(
            KnowledgeStore::new(store.clone(), "website-content"),
            Arc::new(SourceRegistry::new()),
            stub_strategies(StubEngine::new(site()), StubFetcher::new()),
        );
        service.ingest_from_url(SEED).await.unwrap();

        store.reject.store(true, Ordering::SeqCst);
        assert!(matches!(
            service.ingest_from_url(SEED).await,
            Err(Error::Store(_))
        ));

        assert!(service.list_sources().is_empty());
        assert!(!service.knowledge_loaded());
        assert!(service.knowledge().source_urls().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_first_ingestion_is_not_registered() {
        let store = Arc::new(SwitchableStore::default());
        store.reject.store(true, Ordering::SeqCst);
        let service = KnowledgeService::new(
            KnowledgeStore::new(store, "website-content"),
            Arc::new(SourceRegistry::new()),
            stub_strategies(StubEngine::new(site()), StubFetcher::new()),
        );

        assert!(matches!(
            service.ingest_from_url(SEED).await,
            Err(Error::Store(_))
        ));
        assert!(service.list_sources().is_empty());
    }

    #[tokio::test]
    async fn test_clear_all_reports_every_document() {
        let engine = StubEngine::new(vec![
            (SEED, html_page("Home", &["/about"])),
            ("https://example.com/about", html_page("About", &[])),
            ("https://other.com/", html_page("Other", &[])),
        ]);
        let service = service(engine, StubFetcher::new());

        let first = service.ingest_from_url(SEED).await.unwrap();
        let second = service.ingest_from_url("https://other.com/").await.unwrap();

        let deleted = service.clear_all().await.unwrap();
        assert_eq!(deleted, first.document_count + second.document_count);
        assert!(service.list_sources().is_empty());
    }

    #[tokio::test]
    async fn test_clear_before_any_ingestion() {
        let service = service(StubEngine::new(Vec::new()), StubFetcher::new());
        assert_eq!(service.clear_all().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_nothing_extracted() {
        let service = service(StubEngine::new(Vec::new()), StubFetcher::new());

        match service.ingest_from_url(SEED).await {
            Err(Error::NoContentExtracted { url }) => assert_eq!(url, SEED),
            other => panic!("Expected NoContentExtracted, got {:?}", other),
        }
        assert!(service.list_sources().is_empty());
    }

    #[tokio::test]
    async fn test_fallback_shell_warning() {
        let shell = format!(
            "<html><body><p>{}</p><noscript>x</noscript><p>You need to enable JavaScript to run this app.</p></body></html>",
            PARAGRAPH
        );
        let engine = StubEngine::unavailable();
        let service = service(engine, StubFetcher::new().page(SEED, shell));

        let report = service.ingest_from_url(SEED).await.unwrap();
        assert_eq!(report.method, ExtractionMethod::Fallback);
        assert!(report.warning.is_some());
    }

    #[tokio::test]
    async fn test_browse_before_ingestion_is_unavailable() {
        let service = service(StubEngine::new(Vec::new()), StubFetcher::new());
        assert!(matches!(
            service.browse_records(10, 0).await,
            Err(Error::StoreUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected_before_crawling() {
        let engine = StubEngine::new(site());
        let opened = engine.opened.clone();
        let service = service(engine, StubFetcher::new());

        assert!(matches!(
            service.ingest_from_url("").await,
            Err(Error::InvalidUrl(_))
        ));
        assert_eq!(opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reconcile_rebuilds_registry_from_store() {
        let store = Arc::new(MemoryStore::new());
        let first = service_on(store.clone(), StubEngine::new(site()), StubFetcher::new());
        first.ingest_from_url(SEED).await.unwrap();

        // a new process starts with an empty registry over the same store
        let second = service_on(store, StubEngine::new(Vec::new()), StubFetcher::new());
        assert!(!second.knowledge_loaded());

        assert_eq!(second.reconcile_sources().await.unwrap(), 1);
        assert_eq!(second.list_sources(), vec![SEED]);
        assert_eq!(second.remove_url(SEED).await.unwrap().deleted_count, 3);
    }
}
