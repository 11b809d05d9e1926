use thiserror::Error;

/// Application-wide error types for Gleaner.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed (fetching a page).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// The listing page has no usable section or no item tiles in it.
    #[error("Discovery error: {0}")]
    DiscoveryError(String),

    /// A configured CSS selector does not parse.
    #[error("Invalid selector '{selector}': {message}")]
    SelectorError { selector: String, message: String },

    /// The host page could not be obtained for a run.
    #[error("Page source error: {0}")]
    PageSourceError(String),

    /// Writing or reading tabular export data failed.
    #[error("Export error: {0}")]
    ExportError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The coordinator task is gone; no further commands can be served.
    #[error("Run coordinator is not running")]
    CoordinatorClosed,

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::ExportError(err.to_string())
    }
}
