use std::time::Duration;

use gleaner_core::config::ScrapeConfig;
use gleaner_core::error::AppError;
use gleaner_core::traits::Fetcher;
use reqwest::Client;
use url::Url;

use crate::guard::AddressPolicy;

/// HTTP fetcher using reqwest.
///
/// Sends the configured User-Agent and applies the per-request timeout from
/// [`ScrapeConfig`]. Destinations are checked against an [`AddressPolicy`],
/// [`AddressPolicy::PublicOnly`] unless [`allow_private_urls`](Self::allow_private_urls)
/// is called.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
    timeout: Option<Duration>,
    policy: AddressPolicy,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self, AppError> {
        Self::from_config(&ScrapeConfig::default())
    }

    pub fn from_config(config: &ScrapeConfig) -> Result<Self, AppError> {
        let mut builder = Client::builder().user_agent(config.user_agent.as_str());
        if let Some(timeout) = config.fetch_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            timeout: config.fetch_timeout,
            policy: AddressPolicy::default(),
        })
    }

    /// Allow loopback and private-network destinations.
    ///
    /// For the CLI, where the user runs against their own machine.
    pub fn allow_private_urls(mut self) -> Self {
        self.policy = AddressPolicy::AllowAll;
        self
    }

    pub fn policy(&self) -> AddressPolicy {
        self.policy
    }

    fn map_send_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(self.timeout.map_or(0, |t| t.as_secs()))
        } else if e.is_connect() {
            AppError::NetworkError(format!("Connection failed: {e}"))
        } else {
            AppError::HttpError(e.to_string())
        }
    }
}

impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        let parsed =
            Url::parse(url).map_err(|e| AppError::HttpError(format!("Invalid URL {url}: {e}")))?;
        self.policy.check(&parsed).await?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpError(format!(
                "HTTP {} for {url}",
                status.as_u16()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to read response body: {e}")))
    }
}
