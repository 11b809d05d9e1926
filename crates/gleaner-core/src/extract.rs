//! Field extraction from a single detail page.
//!
//! Every rule is independent and tolerant: a missing element leaves its field
//! at [`NOT_AVAILABLE`] and never fails the record.

use scraper::{Html, Selector};

use crate::config::SelectorConfig;
use crate::dom;
use crate::error::AppError;
use crate::models::{Locator, NOT_AVAILABLE, Record};

/// Label/value pairs recognised in the details table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailKey {
    Condition,
    Category,
    Make,
    Model,
    Year,
    SaleType,
}

impl DetailKey {
    const ALL: [DetailKey; 6] = [
        DetailKey::Condition,
        DetailKey::Category,
        DetailKey::Make,
        DetailKey::Model,
        DetailKey::Year,
        DetailKey::SaleType,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            DetailKey::Condition => "Condition",
            DetailKey::Category => "Category",
            DetailKey::Make => "Make",
            DetailKey::Model => "Model",
            DetailKey::Year => "Year",
            DetailKey::SaleType => "Type of Sale",
        }
    }

    /// Match a raw label such as `"  Make: "`. Unknown labels give `None`.
    pub fn from_label(raw: &str) -> Option<Self> {
        let label = raw.trim().trim_end_matches(':').trim_end();
        Self::ALL.into_iter().find(|key| key.label() == label)
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// Values collected from the details table, keyed by [`DetailKey`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Details {
    values: [Option<String>; 6],
}

impl Details {
    pub fn set(&mut self, key: DetailKey, value: String) {
        self.values[key.slot()] = Some(value);
    }

    /// The value for `key`, or [`NOT_AVAILABLE`] if it was never matched.
    pub fn get(&self, key: DetailKey) -> &str {
        self.values[key.slot()].as_deref().unwrap_or(NOT_AVAILABLE)
    }
}

/// Compiled selectors for the detail page.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    title: Selector,
    price: Selector,
    seller: Selector,
    location: Selector,
    detail_label: Selector,
}

impl FieldExtractor {
    pub fn new(config: &SelectorConfig) -> Result<Self, AppError> {
        Ok(Self {
            title: dom::compile(&config.title)?,
            price: dom::compile(&config.price)?,
            seller: dom::compile(&config.seller)?,
            location: dom::compile(&config.location)?,
            detail_label: dom::compile(&config.detail_label)?,
        })
    }

    /// Build the record for one fetched detail page.
    pub fn extract(&self, html: &str, locator: &Locator) -> Record {
        let document = Html::parse_document(html);
        let details = self.details(&document);

        Record {
            brand: details.get(DetailKey::Make).to_string(),
            model: details.get(DetailKey::Model).to_string(),
            condition: details.get(DetailKey::Condition).to_string(),
            location: self
                .first_text(&document, &self.location)
                .map(|text| parse_location(&text))
                .map_or_else(unavailable, or_unavailable),
            seller: self
                .first_text(&document, &self.seller)
                .map_or_else(unavailable, or_unavailable),
            year: details.get(DetailKey::Year).to_string(),
            price: self
                .first_text(&document, &self.price)
                .map(|text| parse_price(&text))
                .map_or_else(unavailable, or_unavailable),
            url: locator.to_string(),
            title: self
                .first_text(&document, &self.title)
                .map_or_else(unavailable, or_unavailable),
        }
    }

    fn first_text(&self, document: &Html, selector: &Selector) -> Option<String> {
        document.select(selector).next().map(dom::text_of)
    }

    fn details(&self, document: &Html) -> Details {
        let mut details = Details::default();
        for label in document.select(&self.detail_label) {
            let Some(key) = DetailKey::from_label(&dom::text_of(label)) else {
                continue;
            };
            let Some(value) = dom::next_element_sibling(label) else {
                continue;
            };
            let text = dom::text_of(value);
            if !text.is_empty() {
                details.set(key, text);
            }
        }
        details
    }
}

/// Normalise a displayed price.
///
/// A range keeps its upper bound, then everything but digits is dropped. Text
/// without any digits ("Ask For Price") is returned as displayed.
pub fn parse_price(raw: &str) -> String {
    let raw = raw.trim();
    let selected = match raw.rfind('-') {
        Some(pos) => &raw[pos + 1..],
        None => raw,
    };
    let digits: String = selected.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        raw.to_string()
    } else {
        digits
    }
}

/// Reduce an address to its last comma-separated component (the state).
pub fn parse_location(raw: &str) -> String {
    let raw = raw.trim();
    match raw.rsplit_once(',') {
        Some((_, last)) => last.trim().to_string(),
        None => raw.to_string(),
    }
}

fn unavailable() -> String {
    NOT_AVAILABLE.to_string()
}

fn or_unavailable(value: String) -> String {
    if value.is_empty() { unavailable() } else { value }
}
