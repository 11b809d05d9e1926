use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

/// Placeholder stored in a [`Record`] field that could not be extracted.
pub const NOT_AVAILABLE: &str = "N/A";

/// One scraped listing.
///
/// Every field is always present; a value that was not found on the detail
/// page holds [`NOT_AVAILABLE`]. Serde names match the exported column headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "Brand")]
    pub brand: String,
    #[serde(rename = "Model")]
    pub model: String,
    #[serde(rename = "Condition")]
    pub condition: String,
    #[serde(rename = "Location")]
    pub location: String,
    #[serde(rename = "Seller")]
    pub seller: String,
    #[serde(rename = "Year")]
    pub year: String,
    #[serde(rename = "Price")]
    pub price: String,
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "AD Title")]
    pub title: String,
}

impl Record {
    /// Column headers, in export order.
    pub const FIELD_NAMES: [&'static str; 9] = [
        "Brand",
        "Model",
        "Condition",
        "Location",
        "Seller",
        "Year",
        "Price",
        "URL",
        "AD Title",
    ];

    /// A record for `url` with every other field set to [`NOT_AVAILABLE`].
    pub fn unavailable(url: impl Into<String>) -> Self {
        Self {
            brand: NOT_AVAILABLE.to_string(),
            model: NOT_AVAILABLE.to_string(),
            condition: NOT_AVAILABLE.to_string(),
            location: NOT_AVAILABLE.to_string(),
            seller: NOT_AVAILABLE.to_string(),
            year: NOT_AVAILABLE.to_string(),
            price: NOT_AVAILABLE.to_string(),
            url: url.into(),
            title: NOT_AVAILABLE.to_string(),
        }
    }

    /// Field values in the same order as [`Record::FIELD_NAMES`].
    pub fn values(&self) -> [&str; 9] {
        [
            self.brand.as_str(),
            self.model.as_str(),
            self.condition.as_str(),
            self.location.as_str(),
            self.seller.as_str(),
            self.year.as_str(),
            self.price.as_str(),
            self.url.as_str(),
            self.title.as_str(),
        ]
    }
}

/// Absolute address of one detail page; the unit of work for a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator(Url);

impl Locator {
    pub fn new(url: Url) -> Self {
        Self(url)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn url(&self) -> &Url {
        &self.0
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// The listing document a worker runs against.
#[derive(Debug, Clone)]
pub struct HostPage {
    /// Address the page was loaded from; relative links resolve against it.
    pub url: Url,
    pub html: String,
}

impl HostPage {
    pub fn new(url: Url, html: impl Into<String>) -> Self {
        Self {
            url,
            html: html.into(),
        }
    }
}

/// Status of the current run.
///
/// A cancelled run returns to `Idle`; there is no separate cancelled state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Complete,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Complete => "complete",
            RunStatus::Error => "error",
        }
    }

    /// Whether a `start` command is accepted without cancelling anything first.
    pub fn is_settled(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "idle" => Ok(RunStatus::Idle),
            "running" => Ok(RunStatus::Running),
            "complete" => Ok(RunStatus::Complete),
            "error" => Ok(RunStatus::Error),
            _ => Err(format!("Unknown run status: {}", s)),
        }
    }
}

/// Snapshot of the coordinator's run state, as broadcast to observers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunState {
    pub status: RunStatus,
    /// Percentage of locators attempted, 0 to 100. Only meaningful while running.
    pub progress: u8,
    /// Non-empty only when `status` is `Complete`.
    pub records: Vec<Record>,
    /// Non-empty only when `status` is `Error`.
    pub error_message: String,
    /// Listing page of the current or last run.
    pub target: Option<String>,
}

impl RunState {
    pub fn idle() -> Self {
        Self::default()
    }
}
