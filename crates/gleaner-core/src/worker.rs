use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::ScrapeConfig;
use crate::discovery::ItemDiscovery;
use crate::error::AppError;
use crate::extract::FieldExtractor;
use crate::models::{HostPage, Locator, Record};
use crate::traits::{Fetcher, HighlightGuard, ItemHighlighter, NoHighlight};

/// Messages a worker sends to whoever coordinates the run.
///
/// A run produces progress events followed by exactly one `Complete` or
/// `Error`. A cancelled run simply stops sending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    Progress(u8),
    Complete(Vec<Record>),
    Error(String),
}

/// Destination for [`WorkerEvent`]s.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: WorkerEvent);
}

impl EventSink for mpsc::UnboundedSender<WorkerEvent> {
    fn emit(&self, event: WorkerEvent) {
        // A closed receiver means nobody is listening for this run any more.
        let _ = self.send(event);
    }
}

/// Diagnostic events emitted by the worker for logging.
#[derive(Debug, Clone)]
pub enum ScrapeEvent<'a> {
    RunStarted {
        target: &'a str,
    },
    Discovered {
        total: usize,
    },
    ItemStarted {
        index: usize,
        total: usize,
        url: &'a str,
    },
    ItemScraped {
        url: &'a str,
    },
    ItemSkipped {
        url: &'a str,
        error: &'a str,
    },
    Cancelled {
        processed: usize,
        total: usize,
    },
    Finished {
        records: usize,
        total: usize,
    },
    Failed {
        error: &'a str,
    },
    /// The run failed after it had already been cancelled.
    FailureSuppressed {
        error: &'a str,
    },
}

/// Trait for receiving worker events (decoupled logging).
pub trait ScrapeReporter: Send + Sync {
    fn report(&self, event: ScrapeEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingScrapeReporter;

impl ScrapeReporter for TracingScrapeReporter {
    fn report(&self, event: ScrapeEvent<'_>) {
        match event {
            ScrapeEvent::RunStarted { target } => {
                tracing::info!(%target, "Scrape started");
            }
            ScrapeEvent::Discovered { total } => {
                tracing::info!(%total, "Discovered detail pages");
            }
            ScrapeEvent::ItemStarted { index, total, url } => {
                tracing::debug!(item = index + 1, %total, %url, "Scraping item");
            }
            ScrapeEvent::ItemScraped { url } => {
                tracing::debug!(%url, "Item scraped");
            }
            ScrapeEvent::ItemSkipped { url, error } => {
                tracing::warn!(%url, %error, "Item skipped");
            }
            ScrapeEvent::Cancelled { processed, total } => {
                tracing::info!(%processed, %total, "Scrape cancelled");
            }
            ScrapeEvent::Finished { records, total } => {
                tracing::info!(%records, %total, "Scrape finished");
            }
            ScrapeEvent::Failed { error } => {
                tracing::error!(%error, "Scrape failed");
            }
            ScrapeEvent::FailureSuppressed { error } => {
                tracing::debug!(%error, "Ignoring failure of cancelled scrape");
            }
        }
    }
}

/// Percentage of `done` out of `total`, rounded half up.
pub fn progress_percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let done = done.min(total);
    ((done * 200 + total) / (total * 2)) as u8
}

/// Scrapes every detail page linked from one listing page, in order.
pub struct ScrapeWorker<F, H = NoHighlight>
where
    F: Fetcher,
    H: ItemHighlighter,
{
    fetcher: F,
    discovery: ItemDiscovery,
    extractor: FieldExtractor,
    highlighter: H,
    fetch_timeout: Option<Duration>,
}

impl<F: Fetcher> ScrapeWorker<F> {
    pub fn new(fetcher: F, config: &ScrapeConfig) -> Result<Self, AppError> {
        Ok(Self {
            fetcher,
            discovery: ItemDiscovery::new(&config.selectors)?,
            extractor: FieldExtractor::new(&config.selectors)?,
            highlighter: NoHighlight,
            fetch_timeout: config.fetch_timeout,
        })
    }
}

impl<F, H> ScrapeWorker<F, H>
where
    F: Fetcher,
    H: ItemHighlighter,
{
    /// Replace the item highlighter.
    pub fn with_highlighter<H2: ItemHighlighter>(self, highlighter: H2) -> ScrapeWorker<F, H2> {
        ScrapeWorker {
            fetcher: self.fetcher,
            discovery: self.discovery,
            extractor: self.extractor,
            highlighter,
            fetch_timeout: self.fetch_timeout,
        }
    }

    /// Run one scrape over `page` until done or cancelled.
    ///
    /// Sends progress after every attempted item, then `Complete` or `Error`.
    /// Nothing terminal is sent once `cancel` has fired, not even an error.
    pub async fn run<S: EventSink, R: ScrapeReporter>(
        &self,
        page: &HostPage,
        cancel: &CancellationToken,
        sink: &S,
        reporter: &R,
    ) {
        reporter.report(ScrapeEvent::RunStarted {
            target: page.url.as_str(),
        });

        match self.scrape(page, cancel, sink, reporter).await {
            Ok(Some(records)) => sink.emit(WorkerEvent::Complete(records)),
            Ok(None) => {}
            Err(e) if cancel.is_cancelled() => {
                reporter.report(ScrapeEvent::FailureSuppressed {
                    error: &e.to_string(),
                });
            }
            Err(e) => {
                let message = e.to_string();
                reporter.report(ScrapeEvent::Failed { error: &message });
                sink.emit(WorkerEvent::Error(message));
            }
        }
    }

    /// `Ok(None)` means the run was cancelled.
    async fn scrape<S: EventSink, R: ScrapeReporter>(
        &self,
        page: &HostPage,
        cancel: &CancellationToken,
        sink: &S,
        reporter: &R,
    ) -> Result<Option<Vec<Record>>, AppError> {
        let locators = self.discovery.discover(page)?;
        let total = locators.len();
        reporter.report(ScrapeEvent::Discovered { total });

        let mut records = Vec::with_capacity(total);
        for (index, locator) in locators.iter().enumerate() {
            if cancel.is_cancelled() {
                reporter.report(ScrapeEvent::Cancelled {
                    processed: index,
                    total,
                });
                return Ok(None);
            }

            if let Some(record) = self.scrape_item(locator, index, total, reporter).await {
                records.push(record);
            }
            sink.emit(WorkerEvent::Progress(progress_percent(index + 1, total)));
        }

        // A cancel that lands during the last fetch still silences the run.
        if cancel.is_cancelled() {
            reporter.report(ScrapeEvent::Cancelled {
                processed: total,
                total,
            });
            return Ok(None);
        }

        reporter.report(ScrapeEvent::Finished {
            records: records.len(),
            total,
        });
        Ok(Some(records))
    }

    /// Fetch and extract one item. Fetch failures skip the item.
    async fn scrape_item<R: ScrapeReporter>(
        &self,
        locator: &Locator,
        index: usize,
        total: usize,
        reporter: &R,
    ) -> Option<Record> {
        let _highlight = HighlightGuard::new(&self.highlighter, locator, index, total);
        reporter.report(ScrapeEvent::ItemStarted {
            index,
            total,
            url: locator.as_str(),
        });

        match self.fetch_detail(locator).await {
            Ok(html) => {
                let record = self.extractor.extract(&html, locator);
                reporter.report(ScrapeEvent::ItemScraped {
                    url: locator.as_str(),
                });
                Some(record)
            }
            Err(e) => {
                reporter.report(ScrapeEvent::ItemSkipped {
                    url: locator.as_str(),
                    error: &e.to_string(),
                });
                None
            }
        }
    }

    async fn fetch_detail(&self, locator: &Locator) -> Result<String, AppError> {
        let fetch = self.fetcher.fetch(locator.as_str());
        match self.fetch_timeout {
            Some(limit) => tokio::time::timeout(limit, fetch)
                .await
                .map_err(|_| AppError::Timeout(limit.as_secs()))?,
            None => fetch.await,
        }
    }
}
