//! Runtime configuration: CSS selectors for the scraped site, fetch limits,
//! and their environment-variable overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
const DEFAULT_USER_AGENT: &str = "Gleaner/0.1 (Listing Scraper)";

/// Where things live in the listing and detail markup.
///
/// Every field has a default, so a JSON override file only needs the
/// selectors that differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Heading element that starts a block of listings.
    pub section_heading: String,
    /// Heading text that identifies the wanted block exactly.
    pub primary_label: String,
    /// Heading text accepted as a substring when no exact match exists.
    pub secondary_label: String,
    /// One listing tile on the listing page.
    pub tile: String,
    /// Link inside a tile that points at the detail page.
    pub tile_link: String,

    pub title: String,
    pub price: String,
    pub seller: String,
    pub location: String,
    /// Label element of a label/value pair; the value is its next sibling.
    pub detail_label: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            section_heading: ".search-right-head-panel".into(),
            primary_label: "Listings".into(),
            secondary_label: "Search Results".into(),
            tile: ".tiled_results_container".into(),
            tile_link: "a.equip_link".into(),
            title: "h1.list-title".into(),
            price: "span.price_normal b".into(),
            seller: ".business-name".into(),
            location: r#"a[onclick="showAdvertMap()"]"#.into(),
            detail_label: ".ad_det_children".into(),
        }
    }
}

impl SelectorConfig {
    /// Load selector overrides from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(format!(
                "Failed to read selector file {}: {e}",
                path.display()
            ))
        })?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Settings shared by the worker and the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub selectors: SelectorConfig,
    /// Upper bound for one detail fetch. `None` waits indefinitely.
    pub fetch_timeout: Option<Duration>,
    pub user_agent: String,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            selectors: SelectorConfig::default(),
            fetch_timeout: Some(Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS)),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ScrapeConfig {
    /// Read configuration from environment variables.
    ///
    /// - `GLEANER_FETCH_TIMEOUT_SECS` (optional, defaults to 30; `0` disables the timeout)
    /// - `GLEANER_USER_AGENT` (optional)
    /// - `GLEANER_SELECTORS` (optional path to a selector JSON file)
    pub fn from_env() -> Result<Self, AppError> {
        let fetch_timeout = match std::env::var("GLEANER_FETCH_TIMEOUT_SECS") {
            Err(_) => Some(Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS)),
            Ok(raw) => parse_timeout_secs(&raw)?,
        };

        let user_agent =
            std::env::var("GLEANER_USER_AGENT").unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string());

        let selectors = match std::env::var("GLEANER_SELECTORS") {
            Ok(path) => SelectorConfig::from_file(Path::new(&path))?,
            Err(_) => SelectorConfig::default(),
        };

        Ok(Self {
            selectors,
            fetch_timeout,
            user_agent,
        })
    }

    pub fn with_fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_selectors(mut self, selectors: SelectorConfig) -> Self {
        self.selectors = selectors;
        self
    }
}

/// Parse a timeout given in whole seconds, where `0` means "no timeout".
pub fn parse_timeout_secs(raw: &str) -> Result<Option<Duration>, AppError> {
    let secs: u64 = raw.trim().parse().map_err(|_| {
        AppError::ConfigError(format!(
            "Invalid GLEANER_FETCH_TIMEOUT_SECS '{raw}': must be a non-negative integer"
        ))
    })?;
    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_parse_timeout_secs() {
        assert_eq!(
            parse_timeout_secs("45").unwrap(),
            Some(Duration::from_secs(45))
        );
        assert_eq!(parse_timeout_secs(" 5 ").unwrap(), Some(Duration::from_secs(5)));
        assert_eq!(parse_timeout_secs("0").unwrap(), None);
        assert!(matches!(
            parse_timeout_secs("soon"),
            Err(AppError::ConfigError(_))
        ));
        assert!(parse_timeout_secs("-1").is_err());
    }

    #[test]
    fn test_partial_selector_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"tile": ".result-card", "primary_label": "Results"}}"#).unwrap();

        let selectors = SelectorConfig::from_file(file.path()).unwrap();
        assert_eq!(selectors.tile, ".result-card");
        assert_eq!(selectors.primary_label, "Results");
        assert_eq!(selectors.tile_link, SelectorConfig::default().tile_link);
    }

    #[test]
    fn test_missing_selector_file_is_config_error() {
        let err = SelectorConfig::from_file(Path::new("/nonexistent/selectors.json")).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[test]
    fn test_malformed_selector_file_is_serialization_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = SelectorConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, AppError::SerializationError(_)));
    }

    #[test]
    fn test_default_config_has_timeout() {
        let config = ScrapeConfig::default();
        assert_eq!(config.fetch_timeout, Some(Duration::from_secs(30)));
        let config = config.with_fetch_timeout(None);
        assert!(config.fetch_timeout.is_none());
    }
}
