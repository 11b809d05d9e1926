//! Delimited-text export of scraped records.
//!
//! The header row is written plain; every data value is quoted with embedded
//! quotes doubled, and lines end in CRLF.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use chrono::NaiveDate;
use csv::{QuoteStyle, ReaderBuilder, Terminator, WriterBuilder};
use url::Url;

use crate::error::AppError;
use crate::models::Record;

const FALLBACK_STEM: &str = "listing-scrape";

/// Write `records` as CSV to `out`.
pub fn write_csv<W: Write>(mut out: W, records: &[Record]) -> Result<(), AppError> {
    out.write_all(Record::FIELD_NAMES.join(",").as_bytes())
        .and_then(|()| out.write_all(b"\r\n"))
        .map_err(|e| AppError::ExportError(e.to_string()))?;

    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::CRLF)
        .from_writer(out);
    for record in records {
        writer.write_record(record.values())?;
    }
    writer
        .flush()
        .map_err(|e| AppError::ExportError(e.to_string()))
}

pub fn to_csv_string(records: &[Record]) -> Result<String, AppError> {
    let mut buf = Vec::new();
    write_csv(&mut buf, records)?;
    String::from_utf8(buf).map_err(|e| AppError::ExportError(e.to_string()))
}

/// Write `records` to a new file at `path`, replacing any existing one.
pub fn write_csv_file(path: &Path, records: &[Record]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::ExportError(format!("{}: {e}", path.display())))?;
    write_csv(BufWriter::new(file), records)
}

/// Parse CSV produced by [`write_csv`] back into records.
pub fn read_csv<R: Read>(input: R) -> Result<Vec<Record>, AppError> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(input);
    reader
        .deserialize::<Record>()
        .map(|row| row.map_err(AppError::from))
        .collect()
}

/// Default export filename for a run against `page_url`.
///
/// Uses the last two path segments of the address, e.g.
/// `/machinery/excavators` on 2024-03-05 gives
/// `machinery-excavators-2024-03-05.csv`.
pub fn default_filename(page_url: Option<&str>, date: NaiveDate) -> String {
    let date = date.format("%Y-%m-%d");
    let segments: Vec<String> = page_url
        .and_then(|raw| Url::parse(raw).ok())
        .and_then(|url| {
            url.path_segments()
                .map(|segments| segments.filter(|s| !s.is_empty()).map(String::from).collect())
        })
        .unwrap_or_default();

    let stem = match segments.as_slice() {
        [] => FALLBACK_STEM.to_string(),
        [only] => only.clone(),
        [.., second_last, last] => format!("{second_last}-{last}"),
    };
    format!("{stem}-{date}.csv")
}
