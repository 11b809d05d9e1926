use gleaner_core::error::AppError;
use gleaner_core::models::HostPage;
use gleaner_core::traits::{Fetcher, PageSource};
use url::Url;

/// Loads a run's listing page over HTTP.
#[derive(Clone)]
pub struct HttpPageSource<F: Fetcher> {
    fetcher: F,
}

impl<F: Fetcher> HttpPageSource<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }
}

impl<F: Fetcher> PageSource for HttpPageSource<F> {
    async fn load(&self, target: &Url) -> Result<HostPage, AppError> {
        tracing::debug!(%target, "Loading listing page");
        let html = self
            .fetcher
            .fetch(target.as_str())
            .await
            .map_err(|e| AppError::PageSourceError(format!("Failed to load {target}: {e}")))?;
        Ok(HostPage::new(target.clone(), html))
    }
}
