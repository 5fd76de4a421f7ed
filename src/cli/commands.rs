use std::fmt::Write as _;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use time::Date;

use crate::app::{ActionDispatcher, App, AppState, View};
use crate::config::AppConfig;
use crate::records::{
    parse_counts, parse_iso_date, DailySummary, Incident, IncidentDraft, IncidentStatus,
    RecordStore, UpsertOutcome,
};
use crate::report::Report;
use crate::search::{filter_incidents, filter_summaries, FilterState};

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Search terms: text, or a day like 25/12 or 25/12/2024
    #[arg()]
    pub term: Vec<String>,
    /// First day to include (YYYY-MM-DD)
    #[arg(long, value_parser = parse_day)]
    pub from: Option<Date>,
    /// Last day to include (YYYY-MM-DD)
    #[arg(long, value_parser = parse_day)]
    pub to: Option<Date>,
    /// Only incidents with this status (open, concluded)
    #[arg(long)]
    pub status: Option<IncidentStatus>,
    /// Limit the number of results printed (defaults to search.max_results)
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SummariesArgs {
    /// Search terms: nature label, or a day like 25/12
    #[arg()]
    pub term: Vec<String>,
    #[arg(long, value_parser = parse_day)]
    pub from: Option<Date>,
    #[arg(long, value_parser = parse_day)]
    pub to: Option<Date>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct AddArgs {
    /// Read the incident draft from this JSON file instead of stdin
    #[arg(long)]
    pub json: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct DeleteArgs {
    /// Identifier of the incident to delete
    pub id: String,
    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SummaryArgs {
    /// Day the counts refer to (YYYY-MM-DD)
    pub date: String,
    /// Occurrence counts as LABEL=COUNT
    #[arg(required = true)]
    pub counts: Vec<String>,
    /// Explicit identifier; defaults to summary-DATE so a day is replaced on re-entry
    #[arg(long)]
    pub id: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ReportArgs {
    #[arg(long, value_parser = parse_day)]
    pub from: Option<Date>,
    #[arg(long, value_parser = parse_day)]
    pub to: Option<Date>,
}

pub fn run_tui(app: &mut App) -> Result<()> {
    app.run()
}

pub fn list_incidents(store: &RecordStore, config: &AppConfig, args: &ListArgs) -> Result<String> {
    let filter = FilterState {
        term: args.term.join(" "),
        start: args.from,
        end: args.to,
        status: args.status,
    };
    let matches = filter_incidents(store.incidents(), &filter);
    let limit = args.limit.unwrap_or(config.search.max_results);
    Ok(format_incidents(&matches, limit))
}

pub fn list_summaries(store: &RecordStore, args: &SummariesArgs) -> Result<String> {
    let filter = FilterState {
        term: args.term.join(" "),
        start: args.from,
        end: args.to,
        status: None,
    };
    let matches = filter_summaries(store.summaries(), &filter);
    if matches.is_empty() {
        return Ok("No matches found.\n".to_string());
    }
    let mut out = String::new();
    for summary in matches {
        let _ = writeln!(
            &mut out,
            "{}  total {}  [{}]",
            summary.display_date(),
            summary.total(),
            summary.id
        );
        for (label, count) in summary.counts.iter().filter(|(_, count)| **count > 0) {
            let _ = writeln!(&mut out, "    {label}: {count}");
        }
    }
    Ok(out)
}

pub fn add_incident(store: &mut RecordStore, args: AddArgs) -> Result<()> {
    let raw = match &args.json {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
        }
        None => match read_stdin()? {
            Some(raw) => raw,
            None => bail!("pipe an incident JSON document on stdin or pass --json FILE"),
        },
    };
    let message = save_draft(store, &raw)?;
    println!("{message}");
    Ok(())
}

fn save_draft(store: &mut RecordStore, raw: &str) -> Result<String> {
    let draft: IncidentDraft = serde_json::from_str(raw).context("parsing incident JSON")?;
    let mut state = AppState::new(View::List);
    let outcome = ActionDispatcher::new(store)
        .save_incident(&mut state, draft)
        .context("saving incident")?;
    Ok(match outcome {
        UpsertOutcome::Created(id) => format!("Registered incident {id}"),
        UpsertOutcome::Updated(id) => format!("Updated incident {id}"),
    })
}

pub fn delete_incident(store: &mut RecordStore, args: DeleteArgs) -> Result<()> {
    let yes = args.yes;
    let message = delete_with(store, &args.id, |incident| {
        if yes {
            return Ok(true);
        }
        let answer = prompt(&format!(
            "Delete incident {} ({}, {})? [y/N]",
            incident.incident_number,
            incident.kind,
            incident.display_datetime()
        ))?;
        Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "s" | "sim"))
    })?;
    println!("{message}");
    Ok(())
}

/// Runs the request/confirm flow; `confirm` decides whether the pending delete proceeds.
fn delete_with<F>(store: &mut RecordStore, id: &str, confirm: F) -> Result<String>
where
    F: FnOnce(&Incident) -> Result<bool>,
{
    let Some(incident) = store.incident(id).cloned() else {
        bail!("no incident with id {id}");
    };
    let mut state = AppState::new(View::List);
    state.request_delete(&incident);
    if !confirm(&incident)? {
        state.cancel_delete();
        return Ok("Delete canceled".to_string());
    }
    let removed = ActionDispatcher::new(store)
        .confirm_delete(&mut state)
        .context("deleting incident")?;
    Ok(if removed {
        format!("Deleted incident {}", incident.incident_number)
    } else {
        "Incident was already removed".to_string()
    })
}

pub fn record_summary(store: &mut RecordStore, args: SummaryArgs) -> Result<()> {
    let message = save_summary(store, &args)?;
    println!("{message}");
    Ok(())
}

fn save_summary(store: &mut RecordStore, args: &SummaryArgs) -> Result<String> {
    let counts = parse_counts(args.counts.iter().map(String::as_str))?;
    let mut summary = DailySummary::for_date(args.date.trim(), counts);
    if let Some(id) = args.id.as_deref().filter(|id| !id.trim().is_empty()) {
        summary.id = id.trim().to_string();
    }
    let outcome = ActionDispatcher::new(store)
        .save_daily_summary(summary)
        .context("saving daily summary")?;
    Ok(match outcome {
        UpsertOutcome::Created(id) => format!("Recorded summary {id}"),
        UpsertOutcome::Updated(id) => format!("Replaced summary {id}"),
    })
}

pub fn report(store: &RecordStore, args: &ReportArgs) -> String {
    Report::build(store.incidents(), store.summaries(), args.from, args.to).render()
}

fn parse_day(raw: &str) -> Result<Date, String> {
    parse_iso_date(raw).ok_or_else(|| format!("'{raw}' is not a YYYY-MM-DD date"))
}

fn format_incidents(incidents: &[&Incident], limit: usize) -> String {
    if incidents.is_empty() {
        return "No matches found.\n".to_string();
    }
    let mut out = String::new();
    for incident in incidents.iter().take(limit) {
        let _ = writeln!(
            &mut out,
            "{}  {}  {}  {}  [{}]",
            incident.display_datetime(),
            incident.incident_number,
            incident.sigma,
            incident.kind,
            incident.status
        );
        let _ = writeln!(&mut out, "    {}  ({})", incident.location.address, incident.id);
    }
    if incidents.len() > limit {
        let _ = writeln!(&mut out, "... {} more", incidents.len() - limit);
    }
    out
}

fn prompt(label: &str) -> Result<String> {
    use std::io::Write;
    let mut stdout = io::stdout();
    write!(stdout, "{}: ", label)?;
    stdout.flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end().to_owned())
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(Some(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::tests::{draft, empty_store};
    use time::macros::date;

    type TestResult<T = ()> = Result<T>;

    #[test]
    fn cli_list_applies_term_range_and_limit() -> TestResult {
        let (_temp, _storage, mut store) = empty_store()?;
        store.upsert_incident(draft("0001/2024", "A01", "2024-03-01T10:00"))?;
        store.upsert_incident(draft("0002/2024", "A02", "2024-03-05T10:00"))?;
        store.upsert_incident(draft("0003/2024", "B01", "2024-03-09T10:00"))?;
        let config = AppConfig::default();

        let args = ListArgs {
            term: vec!["a0".into()],
            from: Some(date!(2024 - 03 - 02)),
            ..ListArgs::default()
        };
        let output = list_incidents(&store, &config, &args)?;
        assert!(output.contains("0002/2024"));
        assert!(!output.contains("0001/2024"));
        assert!(!output.contains("0003/2024"));

        let by_day = ListArgs {
            term: vec!["9/3".into()],
            ..ListArgs::default()
        };
        assert!(list_incidents(&store, &config, &by_day)?.contains("0003/2024"));

        let limited = ListArgs {
            limit: Some(1),
            ..ListArgs::default()
        };
        let output = list_incidents(&store, &config, &limited)?;
        assert!(output.starts_with("09/03/2024 10:00  0003/2024"));
        assert!(output.contains("... 2 more"));
        Ok(())
    }

    #[test]
    fn cli_list_reports_no_matches() -> TestResult {
        let (_temp, _storage, store) = empty_store()?;
        let args = ListArgs {
            status: Some(IncidentStatus::Concluded),
            ..ListArgs::default()
        };
        assert_eq!(
            list_incidents(&store, &AppConfig::default(), &args)?,
            "No matches found.\n"
        );
        Ok(())
    }

    #[test]
    fn cli_add_parses_camel_case_drafts() -> TestResult {
        let (_temp, _storage, mut store) = empty_store()?;
        let raw = r#"{
            "incidentNumber": "0100/2024",
            "sigma": "C03.2024.0001",
            "type": "Ameaça",
            "location": {"address": "Rua da Paz, Centro"},
            "date": "2024-04-02T09:30",
            "status": "Concluído"
        }"#;
        let message = save_draft(&mut store, raw)?;
        assert!(message.starts_with("Registered incident "));
        let stored = &store.incidents()[0];
        assert_eq!(stored.kind, "Ameaça");
        assert_eq!(stored.status, IncidentStatus::Concluded);

        let update = format!(r#"{{"id": "{}", "victim": "A. B."}}"#, stored.id);
        let message = save_draft(&mut store, &update)?;
        assert!(message.starts_with("Updated incident "));
        assert_eq!(store.incidents()[0].victim.as_deref(), Some("A. B."));
        Ok(())
    }

    #[test]
    fn cli_delete_requires_confirmation() -> TestResult {
        let (_temp, _storage, mut store) = empty_store()?;
        let outcome = store.upsert_incident(draft("0001/2024", "A01", "2024-03-01"))?;
        let id = outcome.id().to_string();

        let message = delete_with(&mut store, &id, |_| Ok(false))?;
        assert_eq!(message, "Delete canceled");
        assert_eq!(store.incidents().len(), 1);

        let message = delete_with(&mut store, &id, |_| Ok(true))?;
        assert_eq!(message, "Deleted incident 0001/2024");
        assert!(store.incidents().is_empty());

        assert!(delete_with(&mut store, &id, |_| Ok(true)).is_err());
        Ok(())
    }

    #[test]
    fn cli_summary_replaces_the_same_day() -> TestResult {
        let (_temp, _storage, mut store) = empty_store()?;
        let args = SummaryArgs {
            date: "2024-03-04".into(),
            counts: vec!["Roubo=2".into(), "Furto=0".into()],
            id: None,
        };
        assert_eq!(save_summary(&mut store, &args)?, "Recorded summary summary-2024-03-04");
        let again = SummaryArgs {
            counts: vec!["Roubo=5".into()],
            ..args.clone()
        };
        assert_eq!(save_summary(&mut store, &again)?, "Replaced summary summary-2024-03-04");
        assert_eq!(store.summaries().len(), 1);
        assert_eq!(store.summaries()[0].total(), 5);

        let output = list_summaries(&store, &SummariesArgs::default())?;
        assert!(output.contains("04/03/2024  total 5"));

        let bad = SummaryArgs {
            counts: vec!["Roubo".into()],
            ..args
        };
        assert!(save_summary(&mut store, &bad).is_err());
        Ok(())
    }

    #[test]
    fn cli_report_honours_period() -> TestResult {
        let (_temp, _storage, mut store) = empty_store()?;
        store.upsert_incident(draft("0001/2024", "A01", "2024-03-01"))?;
        store.upsert_incident(draft("0002/2024", "A02", "2024-04-01"))?;
        let args = ReportArgs {
            from: Some(date!(2024 - 04 - 01)),
            to: None,
        };
        let output = report(&store, &args);
        assert!(output.contains("Period: from 01/04/2024"));
        assert!(output.contains("Incidents: 1 (open 1, concluded 0)"));
        Ok(())
    }

    #[test]
    fn day_arguments_must_be_iso() {
        assert!(parse_day("2024-02-29").is_ok());
        assert!(parse_day("29/02/2024").is_err());
    }
}
