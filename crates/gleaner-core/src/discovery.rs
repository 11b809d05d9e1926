//! Item discovery: find the detail-page links of one listings block.
//!
//! A listing page may contain several blocks ("Featured", "Listings", ...),
//! each introduced by a heading element. Only tiles that sit between the
//! wanted heading and the next heading, in document order, belong to the run.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};

use crate::config::SelectorConfig;
use crate::dom;
use crate::error::AppError;
use crate::models::{HostPage, Locator};

/// Compiled selectors and labels for locating listing tiles.
#[derive(Debug, Clone)]
pub struct ItemDiscovery {
    heading: Selector,
    tile: Selector,
    link: Selector,
    primary_label: String,
    secondary_label: String,
}

impl ItemDiscovery {
    pub fn new(config: &SelectorConfig) -> Result<Self, AppError> {
        Ok(Self {
            heading: dom::compile(&config.section_heading)?,
            tile: dom::compile(&config.tile)?,
            link: dom::compile(&config.tile_link)?,
            primary_label: config.primary_label.clone(),
            secondary_label: config.secondary_label.clone(),
        })
    }

    /// Detail-page locators of the target section, in first-seen order.
    pub fn discover(&self, page: &HostPage) -> Result<Vec<Locator>, AppError> {
        let document = Html::parse_document(&page.html);

        // One pre-order walk gives every element its document-order index.
        let mut headings: Vec<(usize, String)> = Vec::new();
        let mut tiles: Vec<(usize, ElementRef<'_>)> = Vec::new();
        for (index, element) in document
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .enumerate()
        {
            if self.heading.matches(&element) {
                headings.push((index, dom::text_of(element)));
            }
            if self.tile.matches(&element) {
                tiles.push((index, element));
            }
        }

        let section = self
            .find_section(&headings)
            .ok_or_else(|| AppError::DiscoveryError("section not found".into()))?;
        let start = headings[section].0;
        let end = headings
            .get(section + 1)
            .map_or(usize::MAX, |(index, _)| *index);

        let in_section: Vec<ElementRef<'_>> = tiles
            .into_iter()
            .filter(|(index, _)| *index > start && *index < end)
            .map(|(_, tile)| tile)
            .collect();

        if in_section.is_empty() {
            return Err(AppError::DiscoveryError("no tiles in section".into()));
        }

        let mut seen = HashSet::new();
        let locators: Vec<Locator> = in_section
            .into_iter()
            .filter_map(|tile| self.tile_locator(tile, page))
            .filter(|locator| seen.insert(locator.clone()))
            .collect();

        tracing::debug!(
            headings = headings.len(),
            locators = locators.len(),
            "Discovered listing tiles"
        );

        Ok(locators)
    }

    /// Exact heading text wins over a substring match anywhere on the page.
    fn find_section(&self, headings: &[(usize, String)]) -> Option<usize> {
        headings
            .iter()
            .position(|(_, text)| *text == self.primary_label)
            .or_else(|| {
                headings
                    .iter()
                    .position(|(_, text)| text.contains(&self.secondary_label))
            })
    }

    fn tile_locator(&self, tile: ElementRef<'_>, page: &HostPage) -> Option<Locator> {
        let href = tile
            .select(&self.link)
            .find_map(|link| link.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty())?;

        match page.url.join(href) {
            Ok(url) => Some(Locator::new(url)),
            Err(e) => {
                tracing::debug!(%href, error = %e, "Skipping tile with unresolvable link");
                None
            }
        }
    }
}
