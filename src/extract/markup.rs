use chrono::{Datelike, Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::constants::{
    BROADWAY_WORLD_BASE_URL, BROADWAY_WORLD_SOURCE, FALLBACK_CATEGORY, FALLBACK_CITY,
};
use crate::types::Event;

static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());

/// Inline date ranges look like "(6/12 - 6/29)": month/day pairs with no
/// year. A range spanning a calendar year boundary is misread as lying
/// within the current year; the source markup gives us nothing better.
static DATE_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\((\d{1,2})/(\d{1,2})\s*-\s*(\d{1,2})/(\d{1,2})\)").unwrap());

static BASE_URL: Lazy<Url> = Lazy::new(|| Url::parse(BROADWAY_WORLD_BASE_URL).unwrap());

/// Heuristic extractor for pages that ship no structured data: every
/// anchor whose surrounding row/list/block text carries a date range
/// becomes one candidate event. No deduplication happens here.
pub fn extract_events(html: &str) -> Vec<Event> {
    let document = Html::parse_document(html);
    let year = Local::now().year();
    let mut events = Vec::new();

    for anchor in document.select(&ANCHOR_SELECTOR) {
        let title = anchor.text().collect::<String>().trim().to_string();
        if title.chars().count() < 4 {
            continue;
        }

        let context = match enclosing_context(&anchor) {
            Some(text) => text,
            None => continue,
        };
        let captures = match DATE_RANGE.captures(&context) {
            Some(c) => c,
            None => continue,
        };

        let (start, end) = match range_dates(&captures, year) {
            Some(dates) => dates,
            None => continue,
        };

        events.push(Event {
            title,
            venue: None,
            city: Some(FALLBACK_CITY.to_string()),
            start_date: Some(start.to_string()),
            end_date: Some(end.to_string()),
            times: Vec::new(),
            url: resolve_href(anchor.value().attr("href")),
            image: None,
            source: BROADWAY_WORLD_SOURCE.to_string(),
            category: FALLBACK_CATEGORY.to_string(),
        });
    }

    debug!("Markup fallback pass: {} candidate events", events.len());
    events
}

/// Text of the nearest enclosing `tr`, `li`, or `div`, which is where the
/// source prints the run dates next to the show link.
fn enclosing_context(anchor: &ElementRef) -> Option<String> {
    for ancestor in anchor.ancestors() {
        if let Some(element) = ancestor.value().as_element() {
            if matches!(element.name(), "tr" | "li" | "div") {
                return ElementRef::wrap(ancestor).map(|e| e.text().collect::<String>());
            }
        }
    }
    None
}

/// Builds the start/end dates in the current calendar year. Month/day
/// pairs that do not form a real date (e.g. 2/30) drop the candidate.
fn range_dates(captures: &regex::Captures<'_>, year: i32) -> Option<(NaiveDate, NaiveDate)> {
    let num = |i: usize| captures[i].parse::<u32>().ok();
    let start = NaiveDate::from_ymd_opt(year, num(1)?, num(2)?)?;
    let end = NaiveDate::from_ymd_opt(year, num(3)?, num(4)?)?;
    Some((start, end))
}

fn resolve_href(href: Option<&str>) -> Option<String> {
    href.and_then(|h| BASE_URL.join(h).ok()).map(|u| u.to_string())
}
