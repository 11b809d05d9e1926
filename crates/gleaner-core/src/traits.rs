use std::future::Future;

use url::Url;

use crate::error::AppError;
use crate::models::{HostPage, Locator};

/// Fetches raw HTML content from a URL.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Obtains the listing document a run operates on.
///
/// Called once per `start`; a run only begins scraping after the page is ready.
pub trait PageSource: Send + Sync + Clone {
    fn load(&self, target: &Url) -> impl Future<Output = Result<HostPage, AppError>> + Send;
}

/// Visual decoration of the item currently being scraped.
///
/// Whatever `highlight` adds must be removed again by `clear`. The worker pairs
/// the two calls through [`HighlightGuard`], so `clear` runs on every exit path.
pub trait ItemHighlighter: Send + Sync {
    fn highlight(&self, locator: &Locator, index: usize, total: usize);

    fn clear(&self, locator: &Locator);
}

/// Highlighter for headless runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHighlight;

impl ItemHighlighter for NoHighlight {
    fn highlight(&self, _locator: &Locator, _index: usize, _total: usize) {}

    fn clear(&self, _locator: &Locator) {}
}

/// Clears a highlight when dropped.
#[must_use = "the highlight is cleared as soon as the guard is dropped"]
pub struct HighlightGuard<'a, H: ItemHighlighter + ?Sized> {
    highlighter: &'a H,
    locator: &'a Locator,
}

impl<'a, H: ItemHighlighter + ?Sized> HighlightGuard<'a, H> {
    pub fn new(highlighter: &'a H, locator: &'a Locator, index: usize, total: usize) -> Self {
        highlighter.highlight(locator, index, total);
        Self {
            highlighter,
            locator,
        }
    }
}

impl<H: ItemHighlighter + ?Sized> Drop for HighlightGuard<'_, H> {
    fn drop(&mut self) {
        self.highlighter.clear(self.locator);
    }
}
