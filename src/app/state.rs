use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use time::Date;
use unicode_segmentation::UnicodeSegmentation;

use crate::app::form::IncidentForm;
use crate::records::{
    parse_iso_date, ConfirmedDelete, DailySummary, Incident, IncidentStatus, RecordStore,
};
use crate::search::{filter_incidents, filter_summaries, FilterState};

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
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum View {
    Dashboard,
    List,
    Daily,
    Reports,
    Analysis,
    Form,
}

impl Default for View {
    fn default() -> Self {
        View::Dashboard
    }
}

impl View {
    pub fn label(self) -> &'static str {
        match self {
            View::Dashboard => "Dashboard",
            View::List => "Incidents",
            View::Daily => "Daily summary",
            View::Reports => "Reports",
            View::Analysis => "Analysis",
            View::Form => "Register",
        }
    }

    pub fn title(self, editing: bool) -> &'static str {
        match self {
            View::Dashboard => "Control panel",
            View::List => "Incident management",
            View::Daily => "Operational summary",
            View::Reports => "Reports",
            View::Analysis => "Incident analysis",
            View::Form if editing => "Update record",
            View::Form => "New incident",
        }
    }

    /// The search bar only applies to views that list records.
    pub fn shows_search_bar(self) -> bool {
        matches!(self, View::Dashboard | View::List | View::Daily)
    }

    pub fn position(self) -> usize {
        View::iter().position(|view| view == self).unwrap_or(0)
    }

    pub fn from_position(idx: usize) -> Option<Self> {
        View::iter().nth(idx)
    }

    fn cycle(self, delta: isize) -> Self {
        let count = View::iter().count() as isize;
        let next = (self.position() as isize + delta).rem_euclid(count);
        View::from_position(next as usize).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteConfirmation {
    Idle,
    Pending { id: String, label: String },
}

impl Default for DeleteConfirmation {
    fn default() -> Self {
        DeleteConfirmation::Idle
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBound {
    Start,
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Term,
    Date { bound: DateBound, buffer: String },
    /// Daily summary entry line: `YYYY-MM-DD LABEL=COUNT, ...`.
    Summary { buffer: String },
}

impl Default for InputMode {
    fn default() -> Self {
        InputMode::Normal
    }
}

/// Navigation, selection, and filter state; every transition is synchronous.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    view: View,
    filter: FilterState,
    viewing: Option<Incident>,
    editing: Option<Incident>,
    form: Option<IncidentForm>,
    delete: DeleteConfirmation,
    input: InputMode,
    pub selected: usize,
    pending_select: Option<String>,
    status_message: Option<String>,
}

impl AppState {
    pub fn new(initial_view: View) -> Self {
        let mut state = Self::default();
        state.switch_view(initial_view);
        state
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn title(&self) -> &'static str {
        self.view.title(self.editing.is_some())
    }

    pub fn switch_view(&mut self, view: View) {
        if view != View::Form {
            self.editing = None;
            self.form = None;
        } else if self.form.is_none() {
            self.form = Some(IncidentForm::blank());
        }
        if self.view != view {
            self.selected = 0;
        }
        self.view = view;
        self.input = InputMode::Normal;
    }

    pub fn next_view(&mut self) {
        self.switch_view(self.view.cycle(1));
    }

    pub fn previous_view(&mut self) {
        self.switch_view(self.view.cycle(-1));
    }

    pub fn start_new(&mut self) {
        self.editing = None;
        self.form = Some(IncidentForm::blank());
        self.switch_view(View::Form);
    }

    pub fn start_edit(&mut self, incident: Incident) {
        self.form = Some(IncidentForm::from_incident(&incident));
        self.editing = Some(incident);
        self.viewing = None;
        self.switch_view(View::Form);
    }

    pub fn editing(&self) -> Option<&Incident> {
        self.editing.as_ref()
    }

    pub fn form(&self) -> Option<&IncidentForm> {
        self.form.as_ref()
    }

    pub fn form_mut(&mut self) -> Option<&mut IncidentForm> {
        self.form.as_mut()
    }

    pub fn start_view(&mut self, incident: Incident) {
        self.viewing = Some(incident);
    }

    pub fn close_view(&mut self) {
        self.viewing = None;
    }

    pub fn viewing(&self) -> Option<&Incident> {
        self.viewing.as_ref()
    }

    /// A second request replaces the pending one; nothing is removed until confirmed.
    pub fn request_delete(&mut self, incident: &Incident) {
        self.delete = DeleteConfirmation::Pending {
            id: incident.id.clone(),
            label: incident.incident_number.clone(),
        };
    }

    pub fn confirm_delete(&mut self) -> Option<ConfirmedDelete> {
        match std::mem::take(&mut self.delete) {
            DeleteConfirmation::Pending { id, .. } => {
                if self.viewing.as_ref().map_or(false, |incident| incident.id == id) {
                    self.viewing = None;
                }
                Some(ConfirmedDelete::new(id))
            }
            DeleteConfirmation::Idle => None,
        }
    }

    pub fn cancel_delete(&mut self) {
        self.delete = DeleteConfirmation::Idle;
    }

    pub fn delete_confirmation(&self) -> &DeleteConfirmation {
        &self.delete
    }

    pub fn is_delete_pending(&self) -> bool {
        matches!(self.delete, DeleteConfirmation::Pending { .. })
    }

    /// Called after the form was saved: filters reset so the record is visible.
    pub fn on_incident_saved(&mut self, id: &str) {
        self.filter.term.clear();
        self.filter.start = None;
        self.filter.end = None;
        self.editing = None;
        self.form = None;
        self.switch_view(View::List);
        self.pending_select = Some(id.to_string());
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn is_searching(&self) -> bool {
        self.filter.is_active()
    }

    pub fn set_term(&mut self, term: impl Into<String>) {
        self.filter.term = term.into();
        self.selected = 0;
    }

    pub fn push_term_char(&mut self, ch: char) {
        self.filter.term.push(ch);
        self.selected = 0;
    }

    pub fn pop_term_char(&mut self) {
        pop_grapheme(&mut self.filter.term);
        self.selected = 0;
    }

    /// Picking a start day with no end day set also sets the end day.
    pub fn set_start_date(&mut self, date: Option<Date>) {
        self.filter.start = date;
        if self.filter.end.is_none() {
            self.filter.end = date;
        }
        self.selected = 0;
    }

    pub fn set_end_date(&mut self, date: Option<Date>) {
        self.filter.end = date;
        self.selected = 0;
    }

    /// Selecting the active status again clears the status filter.
    pub fn toggle_status_filter(&mut self, status: IncidentStatus) {
        self.filter.status = if self.filter.status == Some(status) {
            None
        } else {
            Some(status)
        };
        self.selected = 0;
    }

    pub fn clear_filters(&mut self) {
        self.filter.clear();
        self.selected = 0;
    }

    pub fn input_mode(&self) -> &InputMode {
        &self.input
    }

    pub fn begin_term_input(&mut self) {
        if self.view.shows_search_bar() {
            self.input = InputMode::Term;
        }
    }

    pub fn begin_date_input(&mut self, bound: DateBound) {
        if !self.view.shows_search_bar() {
            return;
        }
        let current = match bound {
            DateBound::Start => self.filter.start,
            DateBound::End => self.filter.end,
        };
        self.input = InputMode::Date {
            bound,
            buffer: current.map(crate::records::format_iso_date).unwrap_or_default(),
        };
    }

    pub fn push_date_char(&mut self, ch: char) {
        if let InputMode::Date { buffer, .. } = &mut self.input {
            if ch.is_ascii_digit() || ch == '-' {
                buffer.push(ch);
            }
        }
    }

    pub fn pop_date_char(&mut self) {
        if let InputMode::Date { buffer, .. } = &mut self.input {
            buffer.pop();
        }
    }

    /// Applies the typed date; an empty buffer clears the bound.
    pub fn commit_date_input(&mut self) -> Result<(), String> {
        let InputMode::Date { bound, buffer } = std::mem::take(&mut self.input) else {
            return Ok(());
        };
        let date = if buffer.trim().is_empty() {
            None
        } else {
            match parse_iso_date(&buffer) {
                Some(date) => Some(date),
                None => {
                    self.input = InputMode::Date { bound, buffer };
                    return Err("dates must be typed as YYYY-MM-DD".to_string());
                }
            }
        };
        match bound {
            DateBound::Start => self.set_start_date(date),
            DateBound::End => self.set_end_date(date),
        }
        Ok(())
    }

    /// Only the daily view takes summary entries; `existing` prefills the line.
    pub fn begin_summary_input(&mut self, existing: Option<&DailySummary>) {
        if self.view != View::Daily {
            return;
        }
        self.input = InputMode::Summary {
            buffer: existing.map(DailySummary::entry_line).unwrap_or_default(),
        };
    }

    pub fn push_summary_char(&mut self, ch: char) {
        if let InputMode::Summary { buffer } = &mut self.input {
            buffer.push(ch);
        }
    }

    pub fn pop_summary_char(&mut self) {
        if let InputMode::Summary { buffer } = &mut self.input {
            pop_grapheme(buffer);
        }
    }

    pub fn finish_input(&mut self) {
        self.input = InputMode::Normal;
    }

    pub fn visible_incidents<'a>(&self, store: &'a RecordStore) -> Vec<&'a Incident> {
        filter_incidents(store.incidents(), &self.filter)
    }

    pub fn visible_summaries<'a>(&self, store: &'a RecordStore) -> Vec<&'a DailySummary> {
        filter_summaries(store.summaries(), &self.filter)
    }

    pub fn selected_summary<'a>(&self, store: &'a RecordStore) -> Option<&'a DailySummary> {
        self.visible_summaries(store).get(self.selected).copied()
    }

    pub fn selected_incident<'a>(&self, store: &'a RecordStore) -> Option<&'a Incident> {
        self.visible_incidents(store).get(self.selected).copied()
    }

    pub fn move_selection(&mut self, delta: isize, len: usize) {
        if len == 0 {
            self.selected = 0;
            return;
        }
        let next = (self.selected as isize + delta).clamp(0, len as isize - 1);
        self.selected = next as usize;
    }

    /// Keeps the selection inside the visible list, following a saved record if one is pending.
    pub fn normalize_selection(&mut self, store: &RecordStore) {
        let visible = match self.view {
            View::Daily => self.visible_summaries(store).len(),
            _ => {
                let incidents = self.visible_incidents(store);
                if let Some(id) = self.pending_select.take() {
                    if let Some(idx) = incidents.iter().position(|incident| incident.id == id) {
                        self.selected = idx;
                    }
                }
                incidents.len()
            }
        };
        if visible == 0 {
            self.selected = 0;
        } else if self.selected >= visible {
            self.selected = visible - 1;
        }
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn set_status_message<S: Into<String>>(&mut self, message: Option<S>) {
        self.status_message = message.map(Into::into);
    }
}

fn pop_grapheme(text: &mut String) {
    if let Some((idx, _)) = text.grapheme_indices(true).next_back() {
        text.truncate(idx);
    }
}
