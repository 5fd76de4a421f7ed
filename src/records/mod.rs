use std::cmp::Reverse;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::storage::StorageHandle;

mod model;
pub mod seed;

pub use model::{
    format_day_month_year, format_iso_date, parse_counts, parse_incident_date, parse_iso_date,
    DailySummary, Incident, IncidentDraft, IncidentStatus, Location,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created(String),
    Updated(String),
}

impl UpsertOutcome {
    pub fn id(&self) -> &str {
        match self {
            UpsertOutcome::Created(id) | UpsertOutcome::Updated(id) => id,
        }
    }
}

/// Proof that the user confirmed a delete; only the confirmation flow hands these out.
#[derive(Debug, PartialEq, Eq)]
pub struct ConfirmedDelete {
    id: String,
}

impl ConfirmedDelete {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Owns both collections and persists each one after every mutation.
pub struct RecordStore {
    storage: StorageHandle,
    reporter: String,
    incidents: Vec<Incident>,
    summaries: Vec<DailySummary>,
    recovered: Vec<&'static str>,
}

impl RecordStore {
    pub fn open(storage: StorageHandle, reporter: impl Into<String>) -> StoreResult<Self> {
        let snapshot = storage.load()?;
        Ok(Self {
            storage,
            reporter: reporter.into(),
            incidents: snapshot.incidents,
            summaries: snapshot.summaries,
            recovered: snapshot.recovered,
        })
    }

    pub fn incidents(&self) -> &[Incident] {
        &self.incidents
    }

    pub fn summaries(&self) -> &[DailySummary] {
        &self.summaries
    }

    pub fn incident(&self, id: &str) -> Option<&Incident> {
        self.incidents.iter().find(|incident| incident.id == id)
    }

    /// Storage keys that were unreadable at load time and reset to defaults.
    pub fn recovered_keys(&self) -> &[&'static str] {
        &self.recovered
    }

    pub fn upsert_incident(&mut self, draft: IncidentDraft) -> StoreResult<UpsertOutcome> {
        if let Some(date) = draft.date.as_deref() {
            if parse_incident_date(date).is_none() {
                return Err(StoreError::InvalidDate(date.to_string()));
            }
        }

        let existing = draft
            .id
            .as_deref()
            .and_then(|id| self.incidents.iter().position(|incident| incident.id == id));

        let outcome = match existing {
            Some(idx) => {
                let incident = &mut self.incidents[idx];
                merge_draft(incident, draft);
                tracing::info!(id = %incident.id, "updated incident");
                UpsertOutcome::Updated(incident.id.clone())
            }
            None => {
                let incident = self.complete_draft(draft)?;
                let id = incident.id.clone();
                tracing::info!(id = %id, number = %incident.incident_number, "registered incident");
                self.incidents.insert(0, incident);
                UpsertOutcome::Created(id)
            }
        };

        sort_incidents(&mut self.incidents);
        self.storage.save_incidents(&self.incidents)?;
        Ok(outcome)
    }

    /// Removes the confirmed incident; returns `false` when it no longer exists.
    pub fn delete_incident(&mut self, confirmed: ConfirmedDelete) -> StoreResult<bool> {
        let before = self.incidents.len();
        self.incidents.retain(|incident| incident.id != confirmed.id);
        if self.incidents.len() == before {
            tracing::debug!(id = %confirmed.id, "delete ignored, incident not found");
            return Ok(false);
        }
        self.storage.save_incidents(&self.incidents)?;
        tracing::info!(id = %confirmed.id, "deleted incident");
        Ok(true)
    }

    pub fn upsert_daily_summary(&mut self, summary: DailySummary) -> StoreResult<UpsertOutcome> {
        if parse_iso_date(&summary.date).is_none() {
            return Err(StoreError::InvalidSummaryDate(summary.date));
        }
        let outcome = match self
            .summaries
            .iter()
            .position(|existing| existing.id == summary.id)
        {
            Some(idx) => {
                let id = summary.id.clone();
                self.summaries[idx] = summary;
                UpsertOutcome::Updated(id)
            }
            None => {
                let id = summary.id.clone();
                self.summaries.insert(0, summary);
                UpsertOutcome::Created(id)
            }
        };
        sort_summaries(&mut self.summaries);
        self.storage.save_summaries(&self.summaries)?;
        tracing::info!(id = %outcome.id(), "saved daily summary");
        Ok(outcome)
    }

    fn complete_draft(&self, draft: IncidentDraft) -> StoreResult<Incident> {
        let IncidentDraft {
            id,
            incident_number,
            sigma,
            kind,
            description,
            location,
            date,
            status,
            victim,
            garrison,
            vehicle_details,
            stolen_details,
            reported_by: _,
            created_at: _,
            extra,
        } = draft;

        let created_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();

        Ok(Incident {
            id: id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            incident_number: required(incident_number, "incidentNumber")?,
            sigma: required(sigma, "sigma")?,
            kind: required(kind, "type")?,
            description: description.unwrap_or_default(),
            location: location
                .filter(|location| !location.address.trim().is_empty())
                .ok_or(StoreError::MissingField("location"))?,
            date: required(date, "date")?,
            status: status.unwrap_or_default(),
            victim: optional(victim),
            garrison: optional(garrison),
            vehicle_details: optional(vehicle_details),
            stolen_details: optional(stolen_details),
            reported_by: self.reporter.clone(),
            created_at,
            extra,
        })
    }
}

/// Most recent first; undated records sink to the end.
pub fn sort_incidents(incidents: &mut [Incident]) {
    incidents.sort_by_cached_key(|incident| Reverse(incident.timestamp()));
}

pub fn sort_summaries(summaries: &mut [DailySummary]) {
    summaries.sort_by(|a, b| b.date.cmp(&a.date));
}

fn merge_draft(incident: &mut Incident, draft: IncidentDraft) {
    if let Some(value) = draft.incident_number {
        incident.incident_number = value;
    }
    if let Some(value) = draft.sigma {
        incident.sigma = value;
    }
    if let Some(value) = draft.kind {
        incident.kind = value;
    }
    if let Some(value) = draft.description {
        incident.description = value;
    }
    if let Some(value) = draft.location {
        incident.location = value;
    }
    if let Some(value) = draft.date {
        incident.date = value;
    }
    if let Some(value) = draft.status {
        incident.status = value;
    }
    merge_optional(&mut incident.victim, draft.victim);
    merge_optional(&mut incident.garrison, draft.garrison);
    merge_optional(&mut incident.vehicle_details, draft.vehicle_details);
    merge_optional(&mut incident.stolen_details, draft.stolen_details);
    if let Some(value) = draft.reported_by {
        incident.reported_by = value;
    }
    if let Some(value) = draft.created_at {
        incident.created_at = value;
    }
    incident.extra.extend(draft.extra);
}

// An empty submitted value clears the field.
fn merge_optional(slot: &mut Option<String>, value: Option<String>) {
    if let Some(value) = value {
        *slot = optional(Some(value));
    }
}

fn optional(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn required(value: Option<String>, field: &'static str) -> StoreResult<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(StoreError::MissingField(field))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::tests::init_storage;
    use crate::storage::{StorageHandle, INCIDENTS_KEY};
    use assert_matches::assert_matches;
    use indexmap::IndexMap;
    use tempfile::TempDir;

    pub(crate) fn draft(number: &str, sigma: &str, date: &str) -> IncidentDraft {
        IncidentDraft {
            incident_number: Some(number.into()),
            sigma: Some(sigma.into()),
            kind: Some("Roubo".into()),
            location: Some(Location::from_address("Rua A, Centro")),
            date: Some(date.into()),
            ..IncidentDraft::default()
        }
    }

    pub(crate) fn empty_store() -> anyhow::Result<(TempDir, StorageHandle, RecordStore)> {
        let (temp, storage) = init_storage()?;
        storage.save_incidents(&[])?;
        let store = RecordStore::open(storage.clone(), "P/3 - 43° BPM")?;
        Ok((temp, storage, store))
    }

    fn assert_sorted_desc(store: &RecordStore) {
        let stamps: Vec<_> = store.incidents().iter().map(Incident::timestamp).collect();
        assert!(stamps.windows(2).all(|pair| pair[0] >= pair[1]), "{stamps:?}");
    }

    #[test]
    fn new_incidents_get_audit_fields_and_stay_sorted() -> anyhow::Result<()> {
        let (_temp, _storage, mut store) = empty_store()?;
        store.upsert_incident(draft("1", "A01", "2024-01-05T10:00:00.000Z"))?;
        store.upsert_incident(draft("2", "A02", "2024-03-05T10:00:00.000Z"))?;
        let outcome = store.upsert_incident(draft("3", "A03", "2024-02-05T10:00"))?;

        assert_matches!(outcome, UpsertOutcome::Created(_));
        assert_sorted_desc(&store);
        let numbers: Vec<_> = store
            .incidents()
            .iter()
            .map(|i| i.incident_number.as_str())
            .collect();
        assert_eq!(numbers, vec!["2", "3", "1"]);

        let created = store.incident(outcome.id()).expect("created incident");
        assert_eq!(created.reported_by, "P/3 - 43° BPM");
        assert!(parse_incident_date(&created.created_at).is_some());
        assert_eq!(created.status, IncidentStatus::Open);
        Ok(())
    }

    #[test]
    fn editing_merges_fields_and_resorts() -> anyhow::Result<()> {
        let (_temp, _storage, mut store) = empty_store()?;
        let first = store.upsert_incident(draft("1", "A01", "2024-01-05T10:00:00.000Z"))?;
        store.upsert_incident(draft("2", "A02", "2024-02-05T10:00:00.000Z"))?;
        let first_id = first.id().to_string();
        let original = store.incident(&first_id).cloned().expect("first");

        let outcome = store.upsert_incident(IncidentDraft {
            id: Some(first_id.clone()),
            date: Some("2024-04-01T08:00:00.000Z".into()),
            status: Some(IncidentStatus::Concluded),
            victim: Some("Fulano".into()),
            ..IncidentDraft::default()
        })?;

        assert_eq!(outcome, UpsertOutcome::Updated(first_id.clone()));
        assert_eq!(store.incidents()[0].id, first_id);
        assert_sorted_desc(&store);
        let updated = store.incident(&first_id).expect("updated");
        assert_eq!(updated.status, IncidentStatus::Concluded);
        assert_eq!(updated.victim.as_deref(), Some("Fulano"));
        assert_eq!(updated.sigma, original.sigma);
        assert_eq!(updated.created_at, original.created_at);
        assert_eq!(store.incidents().len(), 2);
        Ok(())
    }

    #[test]
    fn empty_optional_values_clear_on_edit() -> anyhow::Result<()> {
        let (_temp, _storage, mut store) = empty_store()?;
        let mut initial = draft("1", "A01", "2024-01-05");
        initial.garrison = Some("VTR 1".into());
        let id = store.upsert_incident(initial)?.id().to_string();
        store.upsert_incident(IncidentDraft {
            id: Some(id.clone()),
            garrison: Some("  ".into()),
            ..IncidentDraft::default()
        })?;
        assert_eq!(store.incident(&id).and_then(|i| i.garrison.clone()), None);
        Ok(())
    }

    #[test]
    fn new_incident_requires_core_fields() -> anyhow::Result<()> {
        let (_temp, _storage, mut store) = empty_store()?;
        let mut incomplete = draft("1", "A01", "2024-01-05");
        incomplete.sigma = None;
        assert_matches!(
            store.upsert_incident(incomplete),
            Err(StoreError::MissingField("sigma"))
        );
        assert_matches!(
            store.upsert_incident(draft("1", "A01", "ontem")),
            Err(StoreError::InvalidDate(_))
        );
        assert!(store.incidents().is_empty());
        Ok(())
    }

    #[test]
    fn unknown_id_in_draft_creates_with_that_id() -> anyhow::Result<()> {
        let (_temp, _storage, mut store) = empty_store()?;
        let mut with_id = draft("1", "A01", "2024-01-05");
        with_id.id = Some("1712345678901".into());
        let outcome = store.upsert_incident(with_id)?;
        assert_eq!(outcome, UpsertOutcome::Created("1712345678901".into()));
        Ok(())
    }

    #[test]
    fn delete_removes_only_the_confirmed_id() -> anyhow::Result<()> {
        let (_temp, storage, mut store) = empty_store()?;
        let keep = store.upsert_incident(draft("1", "A01", "2024-01-05"))?;
        let removed = store.upsert_incident(draft("2", "A02", "2024-01-06"))?;

        assert!(store.delete_incident(ConfirmedDelete::new(removed.id()))?);
        assert!(!store.delete_incident(ConfirmedDelete::new(removed.id()))?);

        let ids: Vec<_> = store.incidents().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec![keep.id()]);
        let persisted: Vec<Incident> = storage.read(INCIDENTS_KEY)?.expect("persisted");
        assert_eq!(persisted.len(), 1);
        Ok(())
    }

    #[test]
    fn summaries_replace_by_id_and_sort_by_date() -> anyhow::Result<()> {
        let (_temp, storage, mut store) = empty_store()?;
        let mut counts = IndexMap::new();
        counts.insert("Roubo".to_string(), 1);
        store.upsert_daily_summary(DailySummary::for_date("2024-03-01", counts.clone()))?;
        store.upsert_daily_summary(DailySummary::for_date("2024-03-03", counts.clone()))?;
        store.upsert_daily_summary(DailySummary::for_date("2024-03-02", counts.clone()))?;

        counts.insert("Furto".to_string(), 4);
        let outcome =
            store.upsert_daily_summary(DailySummary::for_date("2024-03-01", counts.clone()))?;
        assert_eq!(outcome, UpsertOutcome::Updated("summary-2024-03-01".into()));

        let dates: Vec<_> = store.summaries().iter().map(|s| s.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-03-03", "2024-03-02", "2024-03-01"]);
        assert_eq!(store.summaries()[2].counts, counts);

        let reopened = RecordStore::open(storage, "x")?;
        assert_eq!(reopened.summaries(), store.summaries());
        Ok(())
    }

    #[test]
    fn summary_dates_must_be_iso() -> anyhow::Result<()> {
        let (_temp, _storage, mut store) = empty_store()?;
        let result = store.upsert_daily_summary(DailySummary::for_date("03/01/2024", IndexMap::new()));
        assert_matches!(result, Err(StoreError::InvalidSummaryDate(_)));
        Ok(())
    }
}
