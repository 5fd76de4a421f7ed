use time::Date;

use crate::records::{format_iso_date, DailySummary, Incident, IncidentStatus};

mod normalize;

pub use normalize::{normalize, parse_search_token, SearchDate};

/// Transient search-bar state; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub term: String,
    pub start: Option<Date>,
    pub end: Option<Date>,
    pub status: Option<IncidentStatus>,
}

impl FilterState {
    /// True when the term or a date bound narrows the view. The status filter
    /// is tracked separately because it belongs to the dashboard.
    pub fn is_active(&self) -> bool {
        !self.term.trim().is_empty() || self.start.is_some() || self.end.is_some()
    }

    pub fn has_any(&self) -> bool {
        self.is_active() || self.status.is_some()
    }

    pub fn clear(&mut self) {
        *self = FilterState::default();
    }

    fn range(&self) -> DayRange {
        DayRange {
            start: self.start.map(format_iso_date),
            end: self.end.map(format_iso_date),
        }
    }

    fn text_query(&self) -> Option<TextQuery> {
        let raw = self.term.trim().to_lowercase();
        if raw.is_empty() {
            return None;
        }
        Some(TextQuery {
            needle: normalize(raw.as_str()),
            date: parse_search_token(&raw),
            raw,
        })
    }
}

struct TextQuery {
    raw: String,
    needle: String,
    date: Option<SearchDate>,
}

struct DayRange {
    start: Option<String>,
    end: Option<String>,
}

impl DayRange {
    fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    // Both sides are zero-padded YYYY-MM-DD, so string order is date order.
    fn contains(&self, day: &str) -> bool {
        if let Some(start) = self.start.as_deref() {
            if day < start {
                return false;
            }
        }
        if let Some(end) = self.end.as_deref() {
            if day > end {
                return false;
            }
        }
        true
    }
}

/// Status, then free text, then date range. Input order is preserved.
pub fn filter_incidents<'a>(incidents: &'a [Incident], filter: &FilterState) -> Vec<&'a Incident> {
    let mut result: Vec<&Incident> = incidents.iter().collect();

    if let Some(status) = filter.status {
        result.retain(|incident| incident.status == status);
    }

    if let Some(query) = filter.text_query() {
        result.retain(|incident| incident_matches_text(incident, &query));
    }

    let range = filter.range();
    if !range.is_unbounded() {
        result.retain(|incident| range.contains(incident.day_key()));
    }

    result
}

pub fn filter_summaries<'a>(
    summaries: &'a [DailySummary],
    filter: &FilterState,
) -> Vec<&'a DailySummary> {
    let mut result: Vec<&DailySummary> = summaries.iter().collect();

    if let Some(query) = filter.text_query() {
        result.retain(|summary| summary_matches_text(summary, &query));
    }

    let range = filter.range();
    if !range.is_unbounded() {
        result.retain(|summary| range.contains(&summary.date));
    }

    result
}

fn incident_matches_text(incident: &Incident, query: &TextQuery) -> bool {
    let utc_date = incident.utc_date();

    if let (Some(token), Some(date)) = (query.date, utc_date) {
        if token.matches(date.year(), u32::from(u8::from(date.month())), u32::from(date.day())) {
            return true;
        }
    }

    if incident
        .searchable_fields()
        .into_iter()
        .any(|field| normalize(field).contains(&query.needle))
    {
        return true;
    }

    incident
        .display_date()
        .map_or(false, |formatted| formatted.contains(&query.raw))
}

fn summary_matches_text(summary: &DailySummary, query: &TextQuery) -> bool {
    if let (Some(token), Some((year, month, day))) = (query.date, summary.date_parts()) {
        if token.matches(year, month, day) {
            return true;
        }
    }

    if summary
        .natures_with_records()
        .any(|label| normalize(label).contains(&query.needle))
    {
        return true;
    }

    summary.display_date().contains(&query.raw)
}
