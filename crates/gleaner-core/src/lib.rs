pub mod config;
pub mod coordinator;
pub mod discovery;
mod dom;
pub mod error;
pub mod export;
pub mod extract;
pub mod models;
pub mod state;
pub mod traits;
pub mod worker;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use config::{ScrapeConfig, SelectorConfig};
pub use coordinator::{CoordinatorHandle, RunCoordinator};
pub use error::AppError;
pub use models::{HostPage, Locator, NOT_AVAILABLE, Record, RunState, RunStatus};
pub use traits::{Fetcher, ItemHighlighter, NoHighlight, PageSource};
pub use worker::{ScrapeReporter, ScrapeWorker, TracingScrapeReporter};
