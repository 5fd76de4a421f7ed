use crate::app::state::AppState;
use crate::error::StoreResult;
use crate::records::{DailySummary, IncidentDraft, RecordStore, UpsertOutcome};

/// Applies user intents that touch persisted records, then updates the view state.
pub struct ActionDispatcher<'a> {
    store: &'a mut RecordStore,
}

impl<'a> ActionDispatcher<'a> {
    pub fn new(store: &'a mut RecordStore) -> Self {
        Self { store }
    }

    pub fn save_incident(
        &mut self,
        state: &mut AppState,
        draft: IncidentDraft,
    ) -> StoreResult<UpsertOutcome> {
        let outcome = self.store.upsert_incident(draft)?;
        state.on_incident_saved(outcome.id());
        state.normalize_selection(&*self.store);
        Ok(outcome)
    }

    /// Performs the pending delete, if the user confirmed one.
    pub fn confirm_delete(&mut self, state: &mut AppState) -> StoreResult<bool> {
        let Some(confirmed) = state.confirm_delete() else {
            return Ok(false);
        };
        let removed = self.store.delete_incident(confirmed)?;
        state.normalize_selection(&*self.store);
        Ok(removed)
    }

    pub fn save_daily_summary(&mut self, summary: DailySummary) -> StoreResult<UpsertOutcome> {
        self.store.upsert_daily_summary(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::state::View;
    use crate::records::tests::{draft, empty_store};
    use crate::records::IncidentStatus;

    #[test]
    fn saving_returns_to_the_list_with_filters_reset() -> anyhow::Result<()> {
        let (_temp, _storage, mut store) = empty_store()?;
        let mut state = AppState::new(View::Dashboard);
        state.start_new();
        state.set_term("nothing matches this");

        let outcome =
            ActionDispatcher::new(&mut store).save_incident(&mut state, draft("7", "A7", "2024-05-01"))?;

        assert_eq!(state.view(), View::List);
        assert!(state.filter().term.is_empty());
        assert_eq!(
            state.selected_incident(&store).map(|i| i.id.as_str()),
            Some(outcome.id())
        );
        Ok(())
    }

    #[test]
    fn failed_save_keeps_the_form_open() -> anyhow::Result<()> {
        let (_temp, _storage, mut store) = empty_store()?;
        let mut state = AppState::new(View::Dashboard);
        state.start_new();
        let mut incomplete = draft("7", "A7", "2024-05-01");
        incomplete.kind = None;

        let result = ActionDispatcher::new(&mut store).save_incident(&mut state, incomplete);
        assert!(result.is_err());
        assert_eq!(state.view(), View::Form);
        assert!(store.incidents().is_empty());
        Ok(())
    }

    #[test]
    fn delete_only_happens_after_confirmation() -> anyhow::Result<()> {
        let (_temp, _storage, mut store) = empty_store()?;
        let first = store.upsert_incident(draft("1", "A1", "2024-05-01"))?;
        let second = store.upsert_incident(draft("2", "A2", "2024-05-02"))?;
        let mut state = AppState::new(View::List);

        assert!(!ActionDispatcher::new(&mut store).confirm_delete(&mut state)?);
        assert_eq!(store.incidents().len(), 2);

        let target = store.incident(first.id()).cloned().expect("first");
        state.request_delete(&target);
        assert!(ActionDispatcher::new(&mut store).confirm_delete(&mut state)?);

        let ids: Vec<_> = store.incidents().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec![second.id()]);
        assert_eq!(store.incidents()[0].status, IncidentStatus::Open);
        Ok(())
    }
}
