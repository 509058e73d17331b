//! The sync pipeline: extractor output -> normalize -> dedupe -> locality
//! filter -> snapshot. All stages are synchronous transforms over in-memory
//! collections; the only awaits are the upstream fetch and the store write.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use reqwest::header::USER_AGENT;
use tracing::{info, instrument};

use crate::constants::{LOCALITY_ALLOW_LIST, UPSTREAM_USER_AGENT};
use crate::error::{Result, ScraperError};
use crate::extract::Strategy;
use crate::storage::SnapshotStore;
use crate::types::{Event, Snapshot};

/// Events with no start date sort after everything real. The same
/// sentinel backs the query engine's "soonest" mode.
pub const MAX_DATE_SENTINEL: &str = "9999-99-99";

/// Reduces arbitrary date text to a `YYYY-MM-DD` string. Accepts plain
/// ISO dates, RFC3339 date-times (the date is taken in the instant's own
/// offset), and offset-less date-times. Anything else is absent, never
/// an error.
pub fn normalize_date(raw: &str) -> Option<String> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.to_string());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive().to_string());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.date().to_string());
    }
    None
}

fn canonical_text(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Puts every field in canonical form: strings trimmed, empty optionals
/// absent, dates normalized, end date defaulted to start date. Events
/// carrying neither a title nor a start date are dropped; nothing that
/// half-formed may reach a persisted snapshot. The structured-data
/// extractor already emits canonical records, so for that path this is a
/// no-op pass; it is the safety net for the markup fallback and any
/// extractor added later.
pub fn normalize_events(events: Vec<Event>) -> Vec<Event> {
    events
        .into_iter()
        .filter_map(|mut event| {
            event.title = event.title.trim().to_string();
            event.venue = event.venue.and_then(canonical_text);
            event.city = event.city.and_then(canonical_text);
            event.url = event.url.and_then(canonical_text);
            event.image = event.image.and_then(canonical_text);
            event.start_date = event.start_date.as_deref().and_then(normalize_date);
            event.end_date = event
                .end_date
                .as_deref()
                .and_then(normalize_date)
                .or_else(|| event.start_date.clone());
            if event.title.is_empty() && event.start_date.is_none() {
                None
            } else {
                Some(event)
            }
        })
        .collect()
}

/// Collapses records describing the same real-world listing. A listing
/// can appear in more than one structured-data block on the page; the
/// first occurrence of each identity key wins and discovery order is
/// preserved among survivors.
pub fn dedupe_events(events: Vec<Event>) -> Vec<Event> {
    let mut seen: HashSet<(String, String, String)> = HashSet::new();
    events
        .into_iter()
        .filter(|event| seen.insert(event.identity_key()))
        .collect()
}

/// Keeps events whose city is on the locality allow-list, plus events
/// with no city at all: unknown locality is retained, preferring
/// completeness over precision.
pub fn filter_by_locality(events: Vec<Event>) -> Vec<Event> {
    events
        .into_iter()
        .filter(|event| match event.city.as_deref() {
            None => true,
            Some(city) => LOCALITY_ALLOW_LIST.contains(&city),
        })
        .collect()
}

/// Sorts ascending by start date and stamps generation metadata. ISO
/// date strings compare lexicographically in chronological order, so
/// plain string comparison is sufficient.
pub fn build_snapshot(mut events: Vec<Event>) -> Snapshot {
    events.sort_by(|a, b| {
        let a_key = a.start_date.as_deref().unwrap_or(MAX_DATE_SENTINEL);
        let b_key = b.start_date.as_deref().unwrap_or(MAX_DATE_SENTINEL);
        a_key.cmp(b_key)
    });
    Snapshot::new(events)
}

/// Runs the full in-memory pipeline over one page of markup.
pub fn build_from_markup(html: &str, strategy: Strategy) -> Snapshot {
    let candidates = strategy.extract(html);
    let events = filter_by_locality(dedupe_events(normalize_events(candidates)));
    build_snapshot(events)
}

/// One-shot fetch of the upstream listings page. A non-success status is
/// an upstream failure; there is no retry here.
pub async fn fetch_listings(url: &str) -> Result<String> {
    let client = reqwest::Client::new();
    let response = client
        .get(url)
        .header(USER_AGENT, UPSTREAM_USER_AGENT)
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(ScraperError::Upstream(format!(
            "{} returned status {}",
            url,
            response.status()
        )));
    }
    Ok(response.text().await?)
}

/// Fetches, rebuilds, and persists the snapshot. Overlapping syncs are
/// not coordinated; the last write wins, and every write is a complete
/// recomputation from source.
#[instrument(skip(store))]
pub async fn run_sync(
    store: Arc<dyn SnapshotStore>,
    url: &str,
    strategy: Strategy,
) -> Result<Snapshot> {
    info!("Starting sync from {}", url);
    let html = fetch_listings(url).await?;
    let snapshot = build_from_markup(&html, strategy);
    store.save(&snapshot).await?;
    info!("Sync complete: {} events persisted", snapshot.count);
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::BROADWAY_WORLD_SOURCE;

    fn event(title: &str, start: Option<&str>, venue: Option<&str>, city: Option<&str>) -> Event {
        Event {
            title: title.to_string(),
            venue: venue.map(str::to_string),
            city: city.map(str::to_string),
            start_date: start.map(str::to_string),
            end_date: None,
            times: Vec::new(),
            url: None,
            image: None,
            source: BROADWAY_WORLD_SOURCE.to_string(),
            category: "Theatre".to_string(),
        }
    }

    #[test]
    fn normalize_date_handles_common_shapes() {
        assert_eq!(normalize_date("2025-03-01"), Some("2025-03-01".to_string()));
        assert_eq!(
            normalize_date(" 2025-03-01T19:30:00-05:00 "),
            Some("2025-03-01".to_string())
        );
        assert_eq!(
            normalize_date("2025-03-01T19:30:00"),
            Some("2025-03-01".to_string())
        );
        assert_eq!(normalize_date("next Tuesday"), None);
        assert_eq!(normalize_date(""), None);
    }

    #[test]
    fn normalize_blanks_empty_strings_and_defaults_end_date() {
        let mut e = event("  Hamilton  ", Some("2025-03-01"), Some("   "), None);
        e.url = Some(String::new());
        let out = normalize_events(vec![e]);
        assert_eq!(out[0].title, "Hamilton");
        assert!(out[0].venue.is_none());
        assert!(out[0].url.is_none());
        assert_eq!(out[0].end_date.as_deref(), Some("2025-03-01"));
    }

    #[test]
    fn normalize_drops_events_with_neither_title_nor_start() {
        let out = normalize_events(vec![event("   ", None, None, None)]);
        assert!(out.is_empty());
    }

    #[test]
    fn normalize_keeps_titled_event_without_start_date() {
        let out = normalize_events(vec![event("TBA Gala", None, None, None)]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn inverted_date_range_passes_through() {
        let mut e = event("Backwards", Some("2025-05-10"), None, None);
        e.end_date = Some("2025-05-03".to_string());
        let out = normalize_events(vec![e]);
        assert_eq!(out[0].start_date.as_deref(), Some("2025-05-10"));
        assert_eq!(out[0].end_date.as_deref(), Some("2025-05-03"));
    }

    #[test]
    fn dedupe_keeps_first_seen_and_preserves_order() {
        let first = event("Hamilton", Some("2025-03-01"), None, Some("Dallas"));
        let duplicate = event("Hamilton", Some("2025-03-01"), None, Some("Plano"));
        let other = event("Wicked", Some("2025-03-01"), None, None);
        let out = dedupe_events(vec![first.clone(), duplicate, other.clone()]);
        assert_eq!(out, vec![first, other]);
    }

    #[test]
    fn dedupe_is_idempotent() {
        let input = vec![
            event("A", Some("2025-01-01"), Some("V"), None),
            event("A", Some("2025-01-01"), Some("V"), None),
            event("B", None, None, None),
        ];
        let once = dedupe_events(input);
        let twice = dedupe_events(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn dedupe_distinguishes_same_title_different_venue() {
        let out = dedupe_events(vec![
            event("Annie", Some("2025-02-01"), Some("Winspear"), None),
            event("Annie", Some("2025-02-01"), Some("Bass Hall"), None),
        ]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn locality_filter_keeps_unknown_city() {
        let out = filter_by_locality(vec![
            event("A", None, None, None),
            event("B", None, None, Some("Dallas")),
            event("C", None, None, Some("Houston")),
        ]);
        let titles: Vec<&str> = out.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B"]);
    }

    #[test]
    fn locality_filter_is_case_sensitive() {
        let out = filter_by_locality(vec![event("A", None, None, Some("dallas"))]);
        assert!(out.is_empty());
    }

    #[test]
    fn snapshot_sorts_by_start_date_with_absent_last() {
        let snap = build_snapshot(vec![
            event("Late", Some("2025-08-01"), None, None),
            event("TBA", None, None, None),
            event("Early", Some("2025-01-01"), None, None),
        ]);
        let titles: Vec<&str> = snap.events.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Early", "Late", "TBA"]);
        assert_eq!(snap.count, 3);
    }
}
