use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Canonical event record as served to the browser client. Field names
/// serialize in camelCase because that is the shape the client consumes.
///
/// Dates are plain `YYYY-MM-DD` strings; keeping them as ISO date text
/// means lexicographic order is chronological order, which the snapshot
/// builder and the query engine both rely on. `end_date`, when present,
/// is not guaranteed to be >= `start_date` — inverted ranges pass through
/// as a data quality issue, and consumers must tolerate them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub title: String,
    pub venue: Option<String>,
    pub city: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default)]
    pub times: Vec<String>,
    pub url: Option<String>,
    pub image: Option<String>,
    pub source: String,
    pub category: String,
}

impl Event {
    /// Composite key identifying one real-world listing. Venue and start
    /// date fall back to the empty string so equality is well-defined
    /// even for partial records.
    pub fn identity_key(&self) -> (String, String, String) {
        (
            self.title.clone(),
            self.start_date.clone().unwrap_or_default(),
            self.venue.clone().unwrap_or_default(),
        )
    }
}

/// The complete, immutable result of one sync run. A new sync replaces
/// the stored snapshot wholesale; there is no merge and no history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub generated_at: Option<String>,
    pub count: usize,
    pub events: Vec<Event>,
}

impl Snapshot {
    /// Stamps the current instant and wraps the given events. `count` is
    /// derived, never supplied by the caller.
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            generated_at: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
            count: events.len(),
            events,
        }
    }

    /// The storage-miss value served before any sync has run:
    /// `{"generatedAt": null, "count": 0, "events": []}`.
    pub fn empty() -> Self {
        Self {
            generated_at: None,
            count: 0,
            events: Vec::new(),
        }
    }
}
