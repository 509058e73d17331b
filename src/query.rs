//! The filter/sort engine the browser applies to a loaded snapshot.
//!
//! Kept as a pure library function so the semantics are testable and
//! usable from the CLI as well: given the full event list and a set of
//! criteria, compute the visible subset and its order without touching
//! the input.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::pipeline::MAX_DATE_SENTINEL;
use crate::types::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SortMode {
    /// Ascending by start date; undated events last.
    #[default]
    Soonest,
    /// Descending by start date.
    Latest,
    /// Ascending by title.
    Title,
}

/// One round of user-specified criteria, rebuilt from UI state on every
/// filter action and never persisted. Unset fields mean "no constraint".
#[derive(Debug, Clone, Default)]
pub struct FilterCriteria {
    pub query: Option<String>,
    pub range_start: Option<String>,
    pub range_end: Option<String>,
    pub source: Option<String>,
    pub category: Option<String>,
    pub city: Option<String>,
    pub sort: SortMode,
}

/// Computes the visible, ordered subset for the given criteria. Pure:
/// the source list is never mutated and identical inputs always produce
/// the identical output (all sorts are stable).
pub fn apply(events: &[Event], criteria: &FilterCriteria) -> Vec<Event> {
    let needle = criteria
        .query
        .as_deref()
        .map(|q| q.trim().to_lowercase())
        .filter(|q| !q.is_empty());

    let mut visible: Vec<Event> = events
        .iter()
        .filter(|event| {
            matches_field(&criteria.source, &event.source)
                && matches_field(&criteria.category, &event.category)
                && matches_optional_field(&criteria.city, event.city.as_deref())
                && overlaps_range(event, criteria)
                && matches_query(event, needle.as_deref())
        })
        .cloned()
        .collect();

    match criteria.sort {
        SortMode::Soonest => visible.sort_by(|a, b| {
            let a_key = a.start_date.as_deref().unwrap_or(MAX_DATE_SENTINEL);
            let b_key = b.start_date.as_deref().unwrap_or(MAX_DATE_SENTINEL);
            a_key.cmp(b_key)
        }),
        // Undated events use the minimal sentinel here, not the maximal
        // one, so they still land at the tail under descending order.
        // Mirrors the shipped client behavior; see DESIGN.md before
        // changing this asymmetry.
        SortMode::Latest => visible.sort_by(|a, b| {
            let a_key = a.start_date.as_deref().unwrap_or("");
            let b_key = b.start_date.as_deref().unwrap_or("");
            b_key.cmp(a_key)
        }),
        SortMode::Title => visible.sort_by(|a, b| a.title.cmp(&b.title)),
    }

    visible
}

fn matches_field(criterion: &Option<String>, value: &str) -> bool {
    match criterion.as_deref() {
        None | Some("") => true,
        Some(wanted) => wanted == value,
    }
}

fn matches_optional_field(criterion: &Option<String>, value: Option<&str>) -> bool {
    match criterion.as_deref() {
        None | Some("") => true,
        Some(wanted) => value == Some(wanted),
    }
}

/// Inclusive date-range overlap. An event with no start date always
/// passes: "TBA" listings are never excluded by a date filter. The
/// event's interval runs from start-of-day on its start date to
/// end-of-day on its end date (or start date when end is absent); the
/// criteria's interval is open on whichever bound is unset. Values that
/// fail to parse as dates behave as if unset.
fn overlaps_range(event: &Event, criteria: &FilterCriteria) -> bool {
    let start = match event.start_date.as_deref().and_then(parse_date) {
        Some(d) => d,
        None => return true,
    };
    let end = event
        .end_date
        .as_deref()
        .and_then(parse_date)
        .unwrap_or(start);

    let event_start = start.and_time(NaiveTime::MIN);
    let event_end = end_of_day(end);

    if let Some(range_start) = criteria.range_start.as_deref().and_then(parse_date) {
        if event_end < range_start.and_time(NaiveTime::MIN) {
            return false;
        }
    }
    if let Some(range_end) = criteria.range_end.as_deref().and_then(parse_date) {
        if event_start > end_of_day(range_end) {
            return false;
        }
    }
    true
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap())
}

/// Case-insensitive substring search over the event's text fields.
fn matches_query(event: &Event, needle: Option<&str>) -> bool {
    let needle = match needle {
        Some(n) => n,
        None => return true,
    };
    let haystack = format!(
        "{} {} {} {} {}",
        event.title,
        event.venue.as_deref().unwrap_or(""),
        event.city.as_deref().unwrap_or(""),
        event.source,
        event.category
    )
    .to_lowercase();
    haystack.contains(needle)
}
