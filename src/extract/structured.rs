use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::constants::{BROADWAY_WORLD_SOURCE, STRUCTURED_CATEGORY};
use crate::pipeline::normalize_date;
use crate::types::Event;

static LD_JSON_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());

/// A JSON-LD document is a single node, an array of nodes, or a named
/// graph wrapping an array. Variant order matters: the graph shape is an
/// object too and must be tried before the catch-all.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LdDocument {
    Graph {
        #[serde(rename = "@graph")]
        graph: Vec<Value>,
    },
    Many(Vec<Value>),
    One(Value),
}

impl LdDocument {
    fn into_nodes(self) -> Vec<Value> {
        match self {
            LdDocument::Graph { graph } => graph,
            LdDocument::Many(nodes) => nodes,
            LdDocument::One(node) => vec![node],
        }
    }
}

/// JSON-LD values are frequently scalar-or-list; anything else collapses
/// to `Other` rather than failing the whole node.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
    Other(Value),
}

impl<T> OneOrMany<T> {
    fn first(&self) -> Option<&T> {
        match self {
            OneOrMany::One(v) => Some(v),
            OneOrMany::Many(vs) => vs.first(),
            OneOrMany::Other(_) => None,
        }
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        match self {
            OneOrMany::One(v) => Box::new(std::iter::once(v)),
            OneOrMany::Many(vs) => Box::new(vs.iter()),
            OneOrMany::Other(_) => Box::new(std::iter::empty()),
        }
    }
}

/// The subset of schema.org event markup we read, every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct LdNode {
    #[serde(rename = "@type")]
    node_type: Option<OneOrMany<String>>,
    name: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    location: Option<LdLocation>,
    url: Option<String>,
    image: Option<OneOrMany<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct LdLocation {
    name: Option<String>,
    address: Option<LdAddressField>,
}

/// A postal address may itself be structured or just free text.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LdAddressField {
    Structured(LdAddress),
    Text(String),
    Other(Value),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct LdAddress {
    address_locality: Option<String>,
    address_region: Option<String>,
}

impl LdNode {
    /// A node is event-shaped if any `@type` token contains "event"
    /// (case-insensitive), or if it carries a start or end date even
    /// without a recognizable type.
    fn is_event_like(&self) -> bool {
        let typed = self
            .node_type
            .as_ref()
            .map(|t| t.iter().any(|s| s.to_lowercase().contains("event")))
            .unwrap_or(false);
        typed || self.start_date.is_some() || self.end_date.is_some()
    }

    fn city(&self) -> Option<String> {
        let address = self.location.as_ref()?.address.as_ref()?;
        match address {
            LdAddressField::Structured(addr) => [&addr.address_locality, &addr.address_region]
                .into_iter()
                .find_map(|field| non_empty(field.as_deref())),
            LdAddressField::Text(_) | LdAddressField::Other(_) => None,
        }
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Extracts candidate events from the page's JSON-LD islands. Blocks that
/// fail to parse and nodes that fail to deserialize are skipped, never
/// fatal: a page with no usable blocks yields an empty list.
pub fn extract_events(html: &str) -> Vec<Event> {
    let document = Html::parse_document(html);
    let mut events = Vec::new();
    let mut blocks = 0usize;

    for script in document.select(&LD_JSON_SELECTOR) {
        blocks += 1;
        let text = script.text().collect::<String>();
        let parsed: LdDocument = match serde_json::from_str(&text) {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Skipping malformed structured-data block: {}", e);
                continue;
            }
        };

        for node_value in parsed.into_nodes() {
            let node: LdNode = match serde_json::from_value(node_value) {
                Ok(node) => node,
                Err(_) => continue,
            };
            if !node.is_event_like() {
                continue;
            }
            if let Some(event) = event_from_node(&node) {
                events.push(event);
            }
        }
    }

    debug!(
        "Structured-data pass: {} blocks, {} candidate events",
        blocks,
        events.len()
    );
    events
}

/// Maps one event-shaped node to the canonical schema. Nodes lacking a
/// resolvable title or start date are discarded here rather than allowed
/// to reach the snapshot half-formed.
fn event_from_node(node: &LdNode) -> Option<Event> {
    let title = non_empty(node.name.as_deref())?;
    let start_date = node.start_date.as_deref().and_then(normalize_date)?;
    let end_date = node
        .end_date
        .as_deref()
        .and_then(normalize_date)
        .unwrap_or_else(|| start_date.clone());

    let venue = node
        .location
        .as_ref()
        .and_then(|loc| non_empty(loc.name.as_deref()));

    Some(Event {
        title,
        venue,
        city: node.city(),
        start_date: Some(start_date),
        end_date: Some(end_date),
        times: Vec::new(),
        url: non_empty(node.url.as_deref()),
        image: node
            .image
            .as_ref()
            .and_then(|i| non_empty(i.first().map(String::as_str))),
        source: BROADWAY_WORLD_SOURCE.to_string(),
        category: STRUCTURED_CATEGORY.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(blocks: &[&str]) -> String {
        let scripts: String = blocks
            .iter()
            .map(|b| format!(r#"<script type="application/ld+json">{}</script>"#, b))
            .collect();
        format!("<html><head>{}</head><body></body></html>", scripts)
    }

    #[test]
    fn extracts_single_event_object() {
        let html = page(&[r#"{
            "@context": "https://schema.org",
            "@type": "TheaterEvent",
            "name": "Hamilton",
            "startDate": "2025-03-01",
            "endDate": "2025-03-15",
            "url": "https://example.com/hamilton",
            "image": ["https://example.com/h.jpg"],
            "location": {
                "@type": "PerformingArtsTheater",
                "name": "Music Hall at Fair Park",
                "address": {
                    "addressLocality": "Dallas",
                    "addressRegion": "TX"
                }
            }
        }"#]);

        let events = extract_events(&html);
        assert_eq!(events.len(), 1);
        let e = &events[0];
        assert_eq!(e.title, "Hamilton");
        assert_eq!(e.start_date.as_deref(), Some("2025-03-01"));
        assert_eq!(e.end_date.as_deref(), Some("2025-03-15"));
        assert_eq!(e.venue.as_deref(), Some("Music Hall at Fair Park"));
        assert_eq!(e.city.as_deref(), Some("Dallas"));
        assert_eq!(e.image.as_deref(), Some("https://example.com/h.jpg"));
        assert_eq!(e.source, "BroadwayWorld Dallas");
    }

    #[test]
    fn flattens_arrays_and_graphs() {
        let html = page(&[
            r#"[{"@type": "Event", "name": "A", "startDate": "2025-01-01"},
                {"@type": "Event", "name": "B", "startDate": "2025-02-01"}]"#,
            r#"{"@graph": [{"@type": "Event", "name": "C", "startDate": "2025-03-01"}]}"#,
        ]);

        let titles: Vec<String> = extract_events(&html).into_iter().map(|e| e.title).collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
    }

    #[test]
    fn untyped_node_with_start_date_qualifies() {
        let html = page(&[r#"{"name": "Mystery Show", "startDate": "2025-05-10"}"#]);
        assert_eq!(extract_events(&html).len(), 1);
    }

    #[test]
    fn node_missing_title_or_start_date_is_dropped() {
        let html = page(&[
            r#"{"@type": "Event", "startDate": "2025-05-10"}"#,
            r#"{"@type": "Event", "name": "No Date Yet"}"#,
        ]);
        assert!(extract_events(&html).is_empty());
    }

    #[test]
    fn malformed_block_does_not_poison_others() {
        let html = page(&[
            r#"{"this is": not valid json"#,
            r#"{"@type": "Event", "name": "Survivor", "startDate": "2025-04-04"}"#,
        ]);
        let events = extract_events(&html);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Survivor");
    }

    #[test]
    fn end_date_falls_back_to_start_date() {
        let html = page(&[r#"{"@type": "Event", "name": "One Night", "startDate": "2025-07-04"}"#]);
        let events = extract_events(&html);
        assert_eq!(events[0].end_date.as_deref(), Some("2025-07-04"));
    }

    #[test]
    fn city_falls_back_to_address_region() {
        let html = page(&[r#"{
            "@type": "Event",
            "name": "Roadshow",
            "startDate": "2025-09-01",
            "location": {"name": "Somewhere", "address": {"addressRegion": "Fort Worth"}}
        }"#]);
        let events = extract_events(&html);
        assert_eq!(events[0].city.as_deref(), Some("Fort Worth"));
    }

    #[test]
    fn datetime_start_is_normalized_to_date() {
        let html = page(&[r#"{
            "@type": "Event",
            "name": "Evening Show",
            "startDate": "2025-03-01T19:30:00-05:00"
        }"#]);
        let events = extract_events(&html);
        assert_eq!(events[0].start_date.as_deref(), Some("2025-03-01"));
    }

    #[test]
    fn non_event_nodes_are_ignored() {
        let html = page(&[r#"{"@type": "BreadcrumbList", "name": "crumbs"}"#]);
        assert!(extract_events(&html).is_empty());
    }

    #[test]
    fn scalar_image_is_accepted() {
        let html = page(&[r#"{
            "@type": ["Thing", "TheaterEvent"],
            "name": "Poster Show",
            "startDate": "2025-10-01",
            "image": "https://example.com/poster.png"
        }"#]);
        let events = extract_events(&html);
        assert_eq!(events[0].image.as_deref(), Some("https://example.com/poster.png"));
    }

    #[test]
    fn page_without_blocks_yields_empty_list() {
        assert!(extract_events("<html><body><p>nothing here</p></body></html>").is_empty());
    }
}
