//! Test utilities: mock implementations of the core collaborators.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Semaphore;
use url::Url;

use crate::error::AppError;
use crate::models::{HostPage, Locator};
use crate::traits::{Fetcher, ItemHighlighter, PageSource};
use crate::worker::{ScrapeEvent, ScrapeReporter};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub const LISTING_URL: &str = "https://dealer.example.com/machinery/excavators";

pub fn detail_url(i: usize) -> String {
    format!("https://dealer.example.com/item/{i}")
}

/// A listing page whose "Listings" section links to `detail_url(1..=count)`.
pub fn listing_html(count: usize) -> String {
    listing_html_with(1..=count)
}

/// A listing page whose "Listings" section links to `detail_url(i)` for each id.
pub fn listing_html_with(ids: impl IntoIterator<Item = usize>) -> String {
    let tiles: String = ids
        .into_iter()
        .map(|i| {
            format!(
                r#"<div class="tiled_results_container"><a class="equip_link" href="/item/{i}">Item {i}</a></div>"#
            )
        })
        .collect();
    format!(
        r#"<html><body>
             <div class="search-right-head-panel">Listings</div>{tiles}
             <div class="search-right-head-panel">Recently viewed</div>
           </body></html>"#
    )
}

pub fn detail_html(i: usize) -> String {
    format!(
        r#"<html><body>
             <h1 class="list-title">Item {i}</h1>
             <span class="price_normal"><b>${i},000</b></span>
             <div class="business-name">Seller {i}</div>
             <a onclick="showAdvertMap()">{i} Main St, Springfield, QLD</a>
             <div class="ad_det_children">Make:</div><div>Make {i}</div>
           </body></html>"#
    )
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher serving canned pages by URL.
///
/// Unknown URLs fail with an HTTP 404 error. A gated URL blocks until a
/// permit is added to its semaphore.
#[derive(Clone, Default)]
pub struct MockFetcher {
    pages: Arc<Mutex<HashMap<String, Result<String, String>>>>,
    gates: Arc<Mutex<HashMap<String, Arc<Semaphore>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `detail_html(i)` at `detail_url(i)` for `i` in `1..=count`.
    pub fn with_detail_pages(count: usize) -> Self {
        (1..=count).fold(Self::new(), |fetcher, i| {
            fetcher.with_page(&detail_url(i), &detail_html(i))
        })
    }

    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), Ok(html.to_string()));
        self
    }

    pub fn with_error(self, url: &str, message: &str) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), Err(message.to_string()));
        self
    }

    /// Make fetches of `url` wait for a permit on the returned semaphore.
    pub fn gated(self, url: &str) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gates
            .lock()
            .unwrap()
            .insert(url.to_string(), Arc::clone(&gate));
        (self, gate)
    }

    /// URLs fetched so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        self.calls.lock().unwrap().push(url.to_string());

        let gate = self.gates.lock().unwrap().get(url).cloned();
        if let Some(gate) = gate {
            gate.acquire()
                .await
                .map_err(|e| AppError::Generic(e.to_string()))?
                .forget();
        }

        match self.pages.lock().unwrap().get(url) {
            Some(Ok(html)) => Ok(html.clone()),
            Some(Err(message)) => Err(AppError::HttpError(message.clone())),
            None => Err(AppError::HttpError(format!("HTTP 404 for {url}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// StaticPageSource
// ---------------------------------------------------------------------------

/// Page source that serves one fixed listing document, with optional
/// per-target overrides.
#[derive(Clone)]
pub struct StaticPageSource {
    html: Result<String, String>,
    overrides: HashMap<String, String>,
    loads: Arc<Mutex<Vec<String>>>,
}

impl StaticPageSource {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: Ok(html.into()),
            overrides: HashMap::new(),
            loads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            html: Err(message.to_string()),
            overrides: HashMap::new(),
            loads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Serve `html` when `target` is loaded instead of the default document.
    pub fn with_page(mut self, target: &str, html: impl Into<String>) -> Self {
        self.overrides.insert(target.to_string(), html.into());
        self
    }

    /// Targets loaded so far.
    pub fn loads(&self) -> Vec<String> {
        self.loads.lock().unwrap().clone()
    }
}

impl PageSource for StaticPageSource {
    async fn load(&self, target: &Url) -> Result<HostPage, AppError> {
        self.loads.lock().unwrap().push(target.to_string());
        if let Some(html) = self.overrides.get(target.as_str()) {
            return Ok(HostPage::new(target.clone(), html.clone()));
        }
        match &self.html {
            Ok(html) => Ok(HostPage::new(target.clone(), html.clone())),
            Err(message) => Err(AppError::PageSourceError(message.clone())),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingHighlighter
// ---------------------------------------------------------------------------

/// Highlighter that tracks which items are currently decorated.
#[derive(Clone, Default)]
pub struct RecordingHighlighter {
    highlighted: Arc<Mutex<Vec<String>>>,
    active: Arc<Mutex<Vec<String>>>,
}

impl RecordingHighlighter {
    /// Every item ever highlighted, in order.
    pub fn highlighted(&self) -> Vec<String> {
        self.highlighted.lock().unwrap().clone()
    }

    /// Number of highlights not yet cleared.
    pub fn active(&self) -> usize {
        self.active.lock().unwrap().len()
    }

    pub fn is_balanced(&self) -> bool {
        self.active() == 0
    }
}

impl ItemHighlighter for RecordingHighlighter {
    fn highlight(&self, locator: &Locator, _index: usize, _total: usize) {
        self.highlighted.lock().unwrap().push(locator.to_string());
        self.active.lock().unwrap().push(locator.to_string());
    }

    fn clear(&self, locator: &Locator) {
        let mut active = self.active.lock().unwrap();
        if let Some(pos) = active.iter().position(|l| l == locator.as_str()) {
            active.remove(pos);
        }
    }
}

// ---------------------------------------------------------------------------
// Reporters
// ---------------------------------------------------------------------------

/// Reporter that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoReport;

impl ScrapeReporter for NoReport {}

/// Reporter that keeps a short name for every event it receives.
#[derive(Clone, Default)]
pub struct RecordingReporter {
    events: Arc<Mutex<Vec<String>>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.events().iter().any(|e| e.contains(needle))
    }

    /// Poll until an event containing `needle` shows up (2 s limit).
    pub async fn wait_for(&self, needle: &str) -> bool {
        for _ in 0..400 {
            if self.contains(needle) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }
}

impl ScrapeReporter for RecordingReporter {
    fn report(&self, event: ScrapeEvent<'_>) {
        let name = match event {
            ScrapeEvent::RunStarted { .. } => "run_started",
            ScrapeEvent::Discovered { .. } => "discovered",
            ScrapeEvent::ItemStarted { .. } => "item_started",
            ScrapeEvent::ItemScraped { .. } => "item_scraped",
            ScrapeEvent::ItemSkipped { .. } => "item_skipped",
            ScrapeEvent::Cancelled { .. } => "cancelled",
            ScrapeEvent::Finished { .. } => "finished",
            ScrapeEvent::Failed { .. } => "failed",
            ScrapeEvent::FailureSuppressed { .. } => "failure_suppressed",
        };
        self.events.lock().unwrap().push(name.to_string());
    }
}
