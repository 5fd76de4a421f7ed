use std::collections::HashMap;
use std::fmt::Write as _;

use indexmap::IndexMap;
use time::Date;

use crate::records::{format_day_month_year, DailySummary, Incident, IncidentStatus};
use crate::search::{filter_incidents, filter_summaries, FilterState};

/// Incident counts by status and by nature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncidentBreakdown {
    pub total: usize,
    pub open: usize,
    pub concluded: usize,
    /// Most frequent first; ties ordered by name.
    pub by_type: Vec<(String, usize)>,
}

impl IncidentBreakdown {
    pub fn from_incidents<'a>(incidents: impl IntoIterator<Item = &'a Incident>) -> Self {
        let mut breakdown = Self::default();
        let mut by_type: HashMap<&str, usize> = HashMap::new();
        for incident in incidents {
            breakdown.total += 1;
            match incident.status {
                IncidentStatus::Open => breakdown.open += 1,
                IncidentStatus::Concluded => breakdown.concluded += 1,
            }
            *by_type.entry(incident.kind.as_str()).or_default() += 1;
        }
        let mut by_type: Vec<(String, usize)> = by_type
            .into_iter()
            .map(|(kind, count)| (kind.to_string(), count))
            .collect();
        by_type.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        breakdown.by_type = by_type;
        breakdown
    }
}

/// Per-label totals across a set of daily summaries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryTotals {
    pub days: usize,
    pub total: u64,
    pub by_label: Vec<(String, u64)>,
}

impl SummaryTotals {
    pub fn from_summaries<'a>(summaries: impl IntoIterator<Item = &'a DailySummary>) -> Self {
        let mut totals = Self::default();
        let mut by_label: IndexMap<&str, u64> = IndexMap::new();
        for summary in summaries {
            totals.days += 1;
            totals.total += summary.total();
            for (label, count) in &summary.counts {
                *by_label.entry(label.as_str()).or_default() += u64::from(*count);
            }
        }
        let mut by_label: Vec<(String, u64)> = by_label
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(label, count)| (label.to_string(), count))
            .collect();
        by_label.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        totals.by_label = by_label;
        totals
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub start: Option<Date>,
    pub end: Option<Date>,
    pub incidents: IncidentBreakdown,
    pub summaries: SummaryTotals,
}

impl Report {
    /// Aggregates both collections, restricted to the inclusive day range when given.
    pub fn build(
        incidents: &[Incident],
        summaries: &[DailySummary],
        start: Option<Date>,
        end: Option<Date>,
    ) -> Self {
        let period = FilterState {
            start,
            end,
            ..FilterState::default()
        };
        Self {
            start,
            end,
            incidents: IncidentBreakdown::from_incidents(filter_incidents(incidents, &period)),
            summaries: SummaryTotals::from_summaries(filter_summaries(summaries, &period)),
        }
    }

    pub fn period_label(&self) -> String {
        match (self.start, self.end) {
            (Some(start), Some(end)) => format!(
                "{} to {}",
                format_day_month_year(start),
                format_day_month_year(end)
            ),
            (Some(start), None) => format!("from {}", format_day_month_year(start)),
            (None, Some(end)) => format!("until {}", format_day_month_year(end)),
            (None, None) => "all records".to_string(),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Period: {}", self.period_label());
        let _ = writeln!(
            out,
            "Incidents: {} (open {}, concluded {})",
            self.incidents.total, self.incidents.open, self.incidents.concluded
        );
        let _ = writeln!(out, "By nature:");
        if self.incidents.by_type.is_empty() {
            let _ = writeln!(out, "  (none)");
        }
        for (kind, count) in &self.incidents.by_type {
            let _ = writeln!(out, "  {kind}: {count}");
        }
        let _ = writeln!(
            out,
            "Daily summaries: {} day(s), {} occurrence(s)",
            self.summaries.days, self.summaries.total
        );
        for (label, count) in &self.summaries.by_label {
            let _ = writeln!(out, "  {label}: {count}");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::seed;
    use time::macros::date;

    fn summary(date: &str, counts: &[(&str, u32)]) -> DailySummary {
        DailySummary::for_date(
            date,
            counts
                .iter()
                .map(|(label, count)| (label.to_string(), *count))
                .collect(),
        )
    }

    #[test]
    fn period_report_renders_both_collections() {
        let incidents = seed::incidents();
        let summaries = vec![
            summary("2024-03-09", &[("Furto", 3)]),
            summary("2024-03-08", &[("Roubo", 2), ("Furto", 1), ("Ameaça", 0)]),
            summary("2024-03-01", &[("Roubo", 9)]),
        ];
        let report = Report::build(
            &incidents,
            &summaries,
            Some(date!(2024 - 03 - 08)),
            Some(date!(2024 - 03 - 10)),
        );

        insta::assert_snapshot!(report.render(), @r###"
        Period: 08/03/2024 to 10/03/2024
        Incidents: 3 (open 1, concluded 2)
        By nature:
          Furto de veículo: 1
          Perturbação do sossego: 1
          Roubo a transeunte: 1
        Daily summaries: 2 day(s), 6 occurrence(s)
          Furto: 4
          Roubo: 2
        "###);
    }

    #[test]
    fn breakdown_orders_by_frequency_then_name() {
        let mut incidents = seed::incidents();
        incidents[1].kind = "Roubo a transeunte".into();
        let breakdown = IncidentBreakdown::from_incidents(&incidents);
        assert_eq!(breakdown.total, 4);
        assert_eq!(breakdown.open, 2);
        assert_eq!(
            breakdown.by_type,
            vec![
                ("Roubo a transeunte".to_string(), 2),
                ("Perturbação do sossego".to_string(), 1),
                ("Tráfico de drogas".to_string(), 1),
            ]
        );
    }

    #[test]
    fn empty_collections_render_placeholders() {
        let report = Report::build(&[], &[], None, Some(date!(2024 - 01 - 31)));
        assert_eq!(report.period_label(), "until 31/01/2024");
        assert!(report.render().contains("  (none)"));
        assert_eq!(report.summaries, SummaryTotals::default());
    }
}
