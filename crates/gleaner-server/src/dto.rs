use serde::{Deserialize, Serialize};

use gleaner_core::models::{Record, RunState};

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct StartRunRequest {
    /// Listing page to scrape.
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct RecordResponse {
    pub brand: String,
    pub model: String,
    pub condition: String,
    pub location: String,
    pub seller: String,
    pub year: String,
    pub price: String,
    pub url: String,
    pub title: String,
}

impl From<Record> for RecordResponse {
    fn from(record: Record) -> Self {
        Self {
            brand: record.brand,
            model: record.model,
            condition: record.condition,
            location: record.location,
            seller: record.seller,
            year: record.year,
            price: record.price,
            url: record.url,
            title: record.title,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct RunStateResponse {
    /// One of `idle`, `running`, `complete`, `error`.
    pub status: String,
    pub progress: u8,
    pub records: Vec<RecordResponse>,
    pub error_message: Option<String>,
    pub target: Option<String>,
}

impl From<RunState> for RunStateResponse {
    fn from(state: RunState) -> Self {
        Self {
            status: state.status.to_string(),
            progress: state.progress,
            records: state.records.into_iter().map(RecordResponse::from).collect(),
            error_message: (!state.error_message.is_empty()).then_some(state.error_message),
            target: state.target,
        }
    }
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ExportQuery {
    /// Download filename; derived from the listing address and today's date if omitted.
    pub filename: Option<String>,
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
