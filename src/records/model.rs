use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumIter, EnumString};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::error::{StoreError, StoreResult};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum IncidentStatus {
    #[serde(rename = "Aberto", alias = "ABERTO", alias = "open")]
    #[strum(serialize = "open", serialize = "aberto", to_string = "Aberto")]
    Open,
    #[serde(rename = "Concluído", alias = "CONCLUIDO", alias = "concluded")]
    #[strum(serialize = "concluded", serialize = "concluido", to_string = "Concluído")]
    Concluded,
}

impl Default for IncidentStatus {
    fn default() -> Self {
        IncidentStatus::Open
    }
}

impl IncidentStatus {
    pub fn toggled(self) -> Self {
        match self {
            IncidentStatus::Open => IncidentStatus::Concluded,
            IncidentStatus::Concluded => IncidentStatus::Open,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
}

impl Location {
    pub fn from_address(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            lat: None,
            lng: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub id: String,
    pub incident_number: String,
    pub sigma: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub description: String,
    pub location: Location,
    pub date: String,
    pub status: IncidentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub victim: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub garrison: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stolen_details: Option<String>,
    #[serde(default)]
    pub reported_by: String,
    #[serde(default)]
    pub created_at: String,
    /// Fields written by other tools; kept so a save never drops them.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Incident {
    pub fn timestamp(&self) -> Option<OffsetDateTime> {
        parse_incident_date(&self.date)
    }

    /// Calendar date of the incident evaluated in UTC.
    pub fn utc_date(&self) -> Option<Date> {
        self.timestamp().map(|ts| ts.date())
    }

    /// The `YYYY-MM-DD` prefix of the stored date, used for range comparisons.
    pub fn day_key(&self) -> &str {
        self.date.split('T').next().unwrap_or(&self.date)
    }

    /// Day/month/year rendering of the UTC calendar date.
    pub fn display_date(&self) -> Option<String> {
        self.utc_date().map(format_day_month_year)
    }

    pub fn display_datetime(&self) -> String {
        match self.timestamp() {
            Some(ts) => format!(
                "{} {:02}:{:02}",
                format_day_month_year(ts.date()),
                ts.hour(),
                ts.minute()
            ),
            None => self.date.clone(),
        }
    }

    /// Every free-text field the search bar looks at, absent ones included.
    pub fn searchable_fields(&self) -> [Option<&str>; 9] {
        [
            Some(self.incident_number.as_str()),
            Some(self.sigma.as_str()),
            Some(self.location.address.as_str()),
            Some(self.kind.as_str()),
            Some(self.description.as_str()),
            self.victim.as_deref(),
            self.garrison.as_deref(),
            self.vehicle_details.as_deref(),
            self.stolen_details.as_deref(),
        ]
    }
}

/// The partial incident produced by a form submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IncidentDraft {
    pub id: Option<String>,
    pub incident_number: Option<String>,
    pub sigma: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub description: Option<String>,
    pub location: Option<Location>,
    pub date: Option<String>,
    pub status: Option<IncidentStatus>,
    pub victim: Option<String>,
    pub garrison: Option<String>,
    pub vehicle_details: Option<String>,
    pub stolen_details: Option<String>,
    pub reported_by: Option<String>,
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySummary {
    pub id: String,
    pub date: String,
    #[serde(default)]
    pub counts: IndexMap<String, u32>,
}

impl DailySummary {
    pub fn for_date(date: impl Into<String>, counts: IndexMap<String, u32>) -> Self {
        let date = date.into();
        Self {
            id: format!("summary-{date}"),
            date,
            counts,
        }
    }

    /// Reads a `YYYY-MM-DD LABEL=COUNT, LABEL=COUNT` entry line.
    pub fn parse_entry(line: &str) -> StoreResult<Self> {
        let line = line.trim();
        let (date, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        if parse_iso_date(date).is_none() {
            return Err(StoreError::InvalidSummaryDate(date.to_string()));
        }
        let counts = parse_counts(
            rest.split(',')
                .map(str::trim)
                .filter(|pair| !pair.is_empty()),
        )?;
        Ok(Self::for_date(date, counts))
    }

    /// The entry line `parse_entry` reads back into an equal summary.
    pub fn entry_line(&self) -> String {
        let pairs: Vec<String> = self
            .counts
            .iter()
            .map(|(label, count)| format!("{label}={count}"))
            .collect();
        format!("{} {}", self.date, pairs.join(", "))
    }

    /// Nature labels that recorded at least one occurrence.
    pub fn natures_with_records(&self) -> impl Iterator<Item = &str> {
        self.counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(label, _)| label.as_str())
    }

    pub fn total(&self) -> u64 {
        self.counts.values().map(|count| u64::from(*count)).sum()
    }

    /// Year, month and day read straight from the `YYYY-MM-DD` string.
    pub fn date_parts(&self) -> Option<(i32, u32, u32)> {
        let mut parts = self.date.split('-');
        let year = parts.next()?.parse().ok()?;
        let month = parts.next()?.parse().ok()?;
        let day = parts.next()?.parse().ok()?;
        Some((year, month, day))
    }

    pub fn display_date(&self) -> String {
        self.date.split('-').rev().collect::<Vec<_>>().join("/")
    }
}

/// Parses `LABEL=COUNT` pairs. The split is on the last `=`, so a label may contain one.
pub fn parse_counts<'a>(
    pairs: impl IntoIterator<Item = &'a str>,
) -> StoreResult<IndexMap<String, u32>> {
    let mut counts = IndexMap::new();
    for pair in pairs {
        let invalid = || StoreError::InvalidCount(pair.to_string());
        let (label, count) = pair.rsplit_once('=').ok_or_else(invalid)?;
        let label = label.trim();
        if label.is_empty() {
            return Err(invalid());
        }
        let count: u32 = count.trim().parse().map_err(|_| invalid())?;
        counts.insert(label.to_string(), count);
    }
    Ok(counts)
}

pub fn parse_incident_date(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(ts.to_offset(UtcOffset::UTC));
    }
    let fractional =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]");
    if let Ok(dt) = PrimitiveDateTime::parse(raw, fractional) {
        return Some(dt.assume_utc());
    }
    let with_seconds = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    if let Ok(dt) = PrimitiveDateTime::parse(raw, with_seconds) {
        return Some(dt.assume_utc());
    }
    let minutes = format_description!("[year]-[month]-[day]T[hour]:[minute]");
    if let Ok(dt) = PrimitiveDateTime::parse(raw, minutes) {
        return Some(dt.assume_utc());
    }
    parse_iso_date(raw).map(|date| date.with_time(Time::MIDNIGHT).assume_utc())
}

pub fn parse_iso_date(raw: &str) -> Option<Date> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]")).ok()
}

pub fn format_iso_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

pub fn format_day_month_year(date: Date) -> String {
    format!(
        "{:02}/{:02}/{:04}",
        date.day(),
        u8::from(date.month()),
        date.year()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::str::FromStr;
    use time::macros::{date, datetime};

    #[test]
    fn incident_dates_accept_form_and_iso_shapes() {
        assert_eq!(
            parse_incident_date("2024-01-05T14:30:00.000Z"),
            Some(datetime!(2024-01-05 14:30 UTC))
        );
        assert_eq!(
            parse_incident_date("2024-01-05T14:30:00.000"),
            Some(datetime!(2024-01-05 14:30 UTC))
        );
        assert_eq!(
            parse_incident_date("2024-01-05T14:30:15.25"),
            Some(datetime!(2024-01-05 14:30:15.25 UTC))
        );
        assert_eq!(
            parse_incident_date("2024-01-05T14:30:15"),
            Some(datetime!(2024-01-05 14:30:15 UTC))
        );
        assert_eq!(
            parse_incident_date("2024-01-05T14:30"),
            Some(datetime!(2024-01-05 14:30 UTC))
        );
        assert_eq!(
            parse_incident_date("2024-01-05"),
            Some(datetime!(2024-01-05 0:00 UTC))
        );
        assert_eq!(parse_incident_date("05/01/2024"), None);
    }

    #[test]
    fn offset_dates_resolve_to_utc_calendar_day() {
        let ts = parse_incident_date("2024-01-05T22:30:00-03:00").expect("parse");
        assert_eq!(ts.date(), date!(2024 - 01 - 06));
        assert_eq!(ts.hour(), 1);
    }

    #[test]
    fn summary_entry_lines_parse_counts_in_order() -> anyhow::Result<()> {
        let summary = DailySummary::parse_entry("  2024-03-09 Roubo=2, Furto de veículo = 1,Lesão=0 ")?;
        assert_eq!(summary.id, "summary-2024-03-09");
        let labels: Vec<&str> = summary.counts.keys().map(String::as_str).collect();
        assert_eq!(labels, vec!["Roubo", "Furto de veículo", "Lesão"]);
        assert_eq!(summary.total(), 3);
        assert_eq!(DailySummary::parse_entry(&summary.entry_line())?, summary);

        let bare = DailySummary::parse_entry("2024-03-10")?;
        assert!(bare.counts.is_empty());

        assert_matches!(
            DailySummary::parse_entry("09/03/2024 Roubo=2"),
            Err(StoreError::InvalidSummaryDate(_))
        );
        assert_matches!(
            DailySummary::parse_entry("2024-03-09 Roubo=two"),
            Err(StoreError::InvalidCount(ref pair)) if pair == "Roubo=two"
        );
        assert_matches!(
            DailySummary::parse_entry("2024-03-09 =4"),
            Err(StoreError::InvalidCount(_))
        );
        Ok(())
    }

    #[test]
    fn count_labels_may_contain_equals_signs() -> anyhow::Result<()> {
        let counts = parse_counts(["a=b=3"])?;
        assert_eq!(counts.get("a=b"), Some(&3));
        Ok(())
    }

    #[test]
    fn status_parses_english_and_portuguese_names() {
        assert_eq!(
            IncidentStatus::from_str("open").ok(),
            Some(IncidentStatus::Open)
        );
        assert_eq!(
            IncidentStatus::from_str("CONCLUDED").ok(),
            Some(IncidentStatus::Concluded)
        );
        assert_eq!(
            IncidentStatus::from_str("aberto").ok(),
            Some(IncidentStatus::Open)
        );
        assert_eq!(IncidentStatus::Concluded.to_string(), "Concluído");
        assert!(IncidentStatus::from_str("pending").is_err());
    }

    #[test]
    fn incident_json_uses_camel_case_and_keeps_unknown_fields() -> anyhow::Result<()> {
        let raw = r#"{
            "id": "1",
            "incidentNumber": "2024/1",
            "sigma": "A01",
            "type": "Roubo",
            "description": "",
            "location": {"address": "Rua A", "lat": -2.5},
            "date": "2024-01-05T10:00:00.000Z",
            "status": "Aberto",
            "vehicleDetails": "Moto",
            "reportedBy": "P/3",
            "createdAt": "2024-01-05T10:05:00.000Z",
            "photos": ["a.jpg"]
        }"#;
        let incident: Incident = serde_json::from_str(raw)?;
        assert_eq!(incident.kind, "Roubo");
        assert_eq!(incident.vehicle_details.as_deref(), Some("Moto"));
        assert_eq!(incident.location.lat, Some(-2.5));
        assert!(incident.extra.contains_key("photos"));

        let back = serde_json::to_value(&incident)?;
        assert_eq!(back["incidentNumber"], "2024/1");
        assert_eq!(back["photos"][0], "a.jpg");
        assert!(back.get("victim").is_none());
        Ok(())
    }

    #[test]
    fn summary_helpers_read_the_iso_date() {
        let mut counts = IndexMap::new();
        counts.insert("Roubo".to_string(), 2);
        counts.insert("Furto".to_string(), 0);
        let summary = DailySummary::for_date("2024-03-09", counts);
        assert_eq!(summary.id, "summary-2024-03-09");
        assert_eq!(summary.date_parts(), Some((2024, 3, 9)));
        assert_eq!(summary.display_date(), "09/03/2024");
        assert_eq!(summary.natures_with_records().collect::<Vec<_>>(), vec!["Roubo"]);
        assert_eq!(summary.total(), 2);
    }
}
