//! Extractors turning raw listings markup into candidate [`Event`]s.
//!
//! Two strategies exist for the one source we scrape. The structured-data
//! path reads the embedded `application/ld+json` islands and is preferred.
//! The markup fallback scans anchors for inline date ranges and exists for
//! the days the source ships pages without structured data. The caller
//! picks one; they are not chained.

pub mod markup;
pub mod structured;

use crate::types::Event;

/// Which extractor a sync run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Strategy {
    /// Embedded JSON-LD structured-data blocks (preferred).
    Structured,
    /// Anchor text + inline "(M/D - M/D)" date ranges.
    Markup,
}

impl Strategy {
    pub fn extract(self, html: &str) -> Vec<Event> {
        match self {
            Strategy::Structured => structured::extract_events(html),
            Strategy::Markup => markup::extract_events(html),
        }
    }
}
