use std::io::Stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::TableState;
use ratatui::Terminal;

use crate::config::AppConfig;
use crate::records::{DailySummary, IncidentStatus, RecordStore, UpsertOutcome};
use crate::ui;

mod actions;
pub mod form;
pub mod state;

pub use actions::ActionDispatcher;
pub use form::{FormField, IncidentForm};
pub use state::{AppState, DateBound, DeleteConfirmation, InputMode, View};

enum Action {
    Quit,
    NextView,
    PreviousView,
    SelectNext,
    SelectPrevious,
    OpenSelected,
    NewIncident,
    EditSelected,
    DeleteSelected,
    EnterSummary,
    StartSearch,
    StartDate(DateBound),
    ClearFilters,
    ToggleStatus(IncidentStatus),
}

pub struct App {
    pub config: Arc<AppConfig>,
    store: RecordStore,
    state: AppState,
    table_state: TableState,
    should_quit: bool,
    tick_rate: Duration,
}

impl App {
    pub fn new(config: Arc<AppConfig>, store: RecordStore) -> Self {
        let mut state = AppState::new(config.ui.initial_view);
        if !store.recovered_keys().is_empty() {
            state.set_status_message(Some(format!(
                "Unreadable data reset: {} (backup kept, see logs)",
                store.recovered_keys().join(", ")
            )));
        }
        let tick_rate = config.ui.tick_rate();
        Self {
            config,
            store,
            state,
            table_state: TableState::default(),
            should_quit: false,
            tick_rate,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        loop {
            self.state.normalize_selection(&self.store);
            let has_rows = match self.state.view() {
                View::Daily => !self.state.visible_summaries(&self.store).is_empty(),
                View::Dashboard | View::List => {
                    !self.state.visible_incidents(&self.store).is_empty()
                }
                _ => false,
            };
            self.table_state
                .select(has_rows.then_some(self.state.selected));

            let max_results = self.config.search.max_results;
            terminal
                .draw(|frame| {
                    ui::draw_app(
                        frame,
                        &self.state,
                        &self.store,
                        &mut self.table_state,
                        max_results,
                    )
                })
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(0));

            if event::poll(timeout).context("polling for terminal events")? {
                if let Event::Key(key) = event::read().context("reading terminal event")? {
                    self.handle_key(key);
                }
            }

            if last_tick.elapsed() >= self.tick_rate {
                last_tick = Instant::now();
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        if self.handle_overlay_key(key) {
            return;
        }
        if self.handle_input_key(key) {
            return;
        }
        if self.state.view() == View::Form {
            self.handle_form_key(key);
            return;
        }

        let plain = !key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER);
        let on_listing = self.state.view().shows_search_bar();
        let action = match key.code {
            KeyCode::Char('q') if plain => Some(Action::Quit),
            KeyCode::Right | KeyCode::Tab => Some(Action::NextView),
            KeyCode::Left | KeyCode::BackTab => Some(Action::PreviousView),
            KeyCode::Char(digit @ '1'..='6') if plain => {
                let idx = digit as usize - '1' as usize;
                if let Some(view) = View::from_position(idx) {
                    self.state.switch_view(view);
                }
                None
            }
            KeyCode::Char('j') | KeyCode::Down => Some(Action::SelectNext),
            KeyCode::Char('k') | KeyCode::Up => Some(Action::SelectPrevious),
            KeyCode::Enter => Some(Action::OpenSelected),
            KeyCode::Char('n') if plain => Some(Action::NewIncident),
            KeyCode::Char('e') if plain => Some(Action::EditSelected),
            KeyCode::Char('d') if plain => Some(Action::DeleteSelected),
            KeyCode::Char('a') if plain && self.state.view() == View::Daily => {
                Some(Action::EnterSummary)
            }
            KeyCode::Char('/') if plain && on_listing => Some(Action::StartSearch),
            KeyCode::Char('f') if plain && on_listing => Some(Action::StartDate(DateBound::Start)),
            KeyCode::Char('t') if plain && on_listing => Some(Action::StartDate(DateBound::End)),
            KeyCode::Char('x') if plain && on_listing => Some(Action::ClearFilters),
            KeyCode::Char('o') if plain && self.state.view() == View::Dashboard => {
                Some(Action::ToggleStatus(IncidentStatus::Open))
            }
            KeyCode::Char('c') if plain && self.state.view() == View::Dashboard => {
                Some(Action::ToggleStatus(IncidentStatus::Concluded))
            }
            _ => None,
        };

        if let Some(action) = action {
            self.handle_action(action);
        }
    }

    fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::NextView => self.state.next_view(),
            Action::PreviousView => self.state.previous_view(),
            Action::SelectNext => self.move_selection(1),
            Action::SelectPrevious => self.move_selection(-1),
            Action::OpenSelected => {
                if let Some(incident) = self.selected_incident() {
                    self.state.start_view(incident);
                }
            }
            Action::NewIncident => {
                self.state.start_new();
                self.state
                    .set_status_message(Some("Fill the required (*) fields, Ctrl-s to save"));
            }
            Action::EditSelected if self.state.view() == View::Daily => {
                match self.state.selected_summary(&self.store).cloned() {
                    Some(summary) => self.state.begin_summary_input(Some(&summary)),
                    None => self.state.set_status_message(Some("No summary selected")),
                }
            }
            Action::EditSelected => match self.selected_incident() {
                Some(incident) => self.state.start_edit(incident),
                None => self.state.set_status_message(Some("No incident selected")),
            },
            Action::EnterSummary => self.state.begin_summary_input(None),
            Action::DeleteSelected => match self.selected_incident() {
                Some(incident) => self.state.request_delete(&incident),
                None => self.state.set_status_message(Some("No incident selected")),
            },
            Action::StartSearch => self.state.begin_term_input(),
            Action::StartDate(bound) => self.state.begin_date_input(bound),
            Action::ClearFilters => {
                self.state.clear_filters();
                self.state.set_status_message(Some("Filters cleared"));
            }
            Action::ToggleStatus(status) => self.state.toggle_status_filter(status),
        }
    }

    fn selected_incident(&self) -> Option<crate::records::Incident> {
        match self.state.view() {
            View::Dashboard | View::List => self.state.selected_incident(&self.store).cloned(),
            _ => None,
        }
    }

    fn move_selection(&mut self, delta: isize) {
        let len = match self.state.view() {
            View::Daily => self.state.visible_summaries(&self.store).len(),
            View::Dashboard | View::List => self.state.visible_incidents(&self.store).len(),
            _ => 0,
        };
        let len = len.min(self.config.search.max_results);
        self.state.move_selection(delta, len);
    }

    fn handle_overlay_key(&mut self, key: KeyEvent) -> bool {
        if self.state.is_delete_pending() {
            match key.code {
                KeyCode::Enter | KeyCode::Char('y') => self.submit_delete(),
                KeyCode::Esc | KeyCode::Char('n') => {
                    self.state.cancel_delete();
                    self.state.set_status_message(Some("Delete canceled"));
                }
                _ => {}
            }
            return true;
        }

        let Some(incident) = self.state.viewing().cloned() else {
            return false;
        };
        match key.code {
            KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => self.state.close_view(),
            KeyCode::Char('e') => self.state.start_edit(incident),
            KeyCode::Char('d') => self.state.request_delete(&incident),
            _ => {}
        }
        true
    }

    fn handle_input_key(&mut self, key: KeyEvent) -> bool {
        let plain = !key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER);
        match self.state.input_mode() {
            InputMode::Normal => false,
            InputMode::Term => {
                match key.code {
                    KeyCode::Esc => {
                        self.state.set_term("");
                        self.state.finish_input();
                    }
                    KeyCode::Enter => self.state.finish_input(),
                    KeyCode::Backspace => self.state.pop_term_char(),
                    KeyCode::Char(ch) if plain => self.state.push_term_char(ch),
                    _ => {}
                }
                true
            }
            InputMode::Date { .. } => {
                match key.code {
                    KeyCode::Esc => self.state.finish_input(),
                    KeyCode::Enter => {
                        if let Err(message) = self.state.commit_date_input() {
                            self.state.set_status_message(Some(message));
                        }
                    }
                    KeyCode::Backspace => self.state.pop_date_char(),
                    KeyCode::Char(ch) if plain => self.state.push_date_char(ch),
                    _ => {}
                }
                true
            }
            InputMode::Summary { .. } => {
                match key.code {
                    KeyCode::Esc => {
                        self.state.finish_input();
                        self.state.set_status_message(Some("Summary entry canceled"));
                    }
                    KeyCode::Enter => self.submit_summary(),
                    KeyCode::Backspace => self.state.pop_summary_char(),
                    KeyCode::Char(ch) if plain => self.state.push_summary_char(ch),
                    _ => {}
                }
                true
            }
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('s') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.submit_form();
            return;
        }
        if key.code == KeyCode::Esc {
            self.state.switch_view(View::List);
            self.state.set_status_message(Some("Form discarded"));
            return;
        }
        let plain = !key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER);
        let Some(form) = self.state.form_mut() else {
            return;
        };
        match key.code {
            KeyCode::Tab | KeyCode::Down => form.focus_next(),
            KeyCode::BackTab | KeyCode::Up => form.focus_previous(),
            KeyCode::Backspace => form.pop_char(),
            KeyCode::Char(ch) if plain => form.push_char(ch),
            _ => {}
        }
    }

    fn submit_form(&mut self) {
        let Some(form) = self.state.form() else {
            return;
        };
        if let Some(field) = form.missing_field() {
            self.state
                .set_status_message(Some(format!("{} is required", field.label())));
            return;
        }
        let draft = form.to_draft();
        let mut dispatcher = ActionDispatcher::new(&mut self.store);
        match dispatcher.save_incident(&mut self.state, draft) {
            Ok(outcome) => {
                let message = match outcome {
                    UpsertOutcome::Created(_) => "Incident registered",
                    UpsertOutcome::Updated(_) => "Incident updated",
                };
                self.state.set_status_message(Some(message));
            }
            Err(err) => {
                tracing::error!(?err, "failed to save incident");
                self.state
                    .set_status_message(Some(format!("Could not save: {err}")));
            }
        }
    }

    /// Saves the entry line; on a bad line the entry stays open for correction.
    fn submit_summary(&mut self) {
        let InputMode::Summary { buffer } = self.state.input_mode() else {
            return;
        };
        let summary = match DailySummary::parse_entry(buffer) {
            Ok(summary) => summary,
            Err(err) => {
                self.state.set_status_message(Some(err.to_string()));
                return;
            }
        };
        let mut dispatcher = ActionDispatcher::new(&mut self.store);
        match dispatcher.save_daily_summary(summary) {
            Ok(outcome) => {
                self.state.finish_input();
                let message = match outcome {
                    UpsertOutcome::Created(id) => format!("Recorded {id}"),
                    UpsertOutcome::Updated(id) => format!("Replaced {id}"),
                };
                self.state.set_status_message(Some(message));
            }
            Err(err) => {
                tracing::error!(?err, "failed to save daily summary");
                self.state
                    .set_status_message(Some(format!("Could not save: {err}")));
            }
        }
    }

    fn submit_delete(&mut self) {
        let mut dispatcher = ActionDispatcher::new(&mut self.store);
        match dispatcher.confirm_delete(&mut self.state) {
            Ok(true) => self.state.set_status_message(Some("Incident deleted")),
            Ok(false) => self
                .state
                .set_status_message(Some("Incident was already removed")),
            Err(err) => {
                tracing::error!(?err, "failed to delete incident");
                self.state
                    .set_status_message(Some("Failed to delete incident; see logs"));
            }
        }
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen).context("entering alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal backend")?;
    terminal.hide_cursor().context("hiding cursor")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode().context("disabling raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("leaving alternate screen")?;
    terminal.show_cursor().context("showing cursor")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::tests::{draft, empty_store};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app() -> anyhow::Result<(tempfile::TempDir, App)> {
        let (temp, _storage, mut store) = empty_store()?;
        store.upsert_incident(draft("0001/2024", "A01", "2024-03-01T10:00"))?;
        store.upsert_incident(draft("0002/2024", "A02", "2024-03-02T10:00"))?;
        Ok((temp, App::new(Arc::new(AppConfig::default()), store)))
    }

    #[test]
    fn delete_flow_asks_before_removing() -> anyhow::Result<()> {
        let (_temp, mut app) = app()?;
        app.handle_key(key(KeyCode::Char('2')));
        assert_eq!(app.state.view(), View::List);

        app.handle_key(key(KeyCode::Char('d')));
        assert!(app.state.is_delete_pending());
        app.handle_key(key(KeyCode::Char('q')));
        assert!(!app.should_quit);
        app.handle_key(key(KeyCode::Esc));
        assert_eq!(app.store.incidents().len(), 2);

        app.handle_key(key(KeyCode::Char('d')));
        app.handle_key(key(KeyCode::Enter));
        let numbers: Vec<_> = app
            .store
            .incidents()
            .iter()
            .map(|i| i.incident_number.as_str())
            .collect();
        assert_eq!(numbers, vec!["0001/2024"]);
        Ok(())
    }

    #[test]
    fn typing_in_the_search_bar_filters() -> anyhow::Result<()> {
        let (_temp, mut app) = app()?;
        app.handle_key(key(KeyCode::Char('/')));
        for ch in "a02".chars() {
            app.handle_key(key(KeyCode::Char(ch)));
        }
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.state.filter().term, "a02");
        assert_eq!(app.state.visible_incidents(&app.store).len(), 1);

        app.handle_key(key(KeyCode::Char('x')));
        assert!(!app.state.is_searching());
        Ok(())
    }

    #[test]
    fn form_requires_fields_before_saving() -> anyhow::Result<()> {
        let (_temp, mut app) = app()?;
        app.handle_key(key(KeyCode::Char('n')));
        assert_eq!(app.state.view(), View::Form);
        app.handle_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL));
        assert_eq!(app.state.view(), View::Form);
        assert_eq!(app.state.status_message(), Some("Incident number is required"));
        assert_eq!(app.store.incidents().len(), 2);
        Ok(())
    }

    fn type_line(app: &mut App, line: &str) {
        for ch in line.chars() {
            app.handle_key(key(KeyCode::Char(ch)));
        }
    }

    #[test]
    fn daily_view_records_and_replaces_a_day() -> anyhow::Result<()> {
        let (_temp, mut app) = app()?;
        app.handle_key(key(KeyCode::Char('3')));
        assert_eq!(app.state.view(), View::Daily);

        app.handle_key(key(KeyCode::Char('a')));
        type_line(&mut app, "2024-03-09 Roubo=2, Furto=1");
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.state.input_mode(), &InputMode::Normal);
        assert_eq!(app.state.status_message(), Some("Recorded summary-2024-03-09"));
        assert_eq!(app.store.summaries().len(), 1);
        assert_eq!(app.store.summaries()[0].total(), 3);

        // Same day again replaces the stored summary.
        app.handle_key(key(KeyCode::Char('a')));
        type_line(&mut app, "2024-03-09 Roubo=4");
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.state.status_message(), Some("Replaced summary-2024-03-09"));
        assert_eq!(app.store.summaries().len(), 1);
        assert_eq!(app.store.summaries()[0].total(), 4);

        // Editing the selected day starts from its current counts.
        app.handle_key(key(KeyCode::Char('e')));
        type_line(&mut app, "0, Lesão=1");
        app.handle_key(key(KeyCode::Enter));
        let summary = &app.store.summaries()[0];
        assert_eq!(summary.counts.get("Roubo"), Some(&40));
        assert_eq!(summary.counts.get("Lesão"), Some(&1));
        Ok(())
    }

    #[test]
    fn bad_summary_line_keeps_the_entry_open() -> anyhow::Result<()> {
        let (_temp, mut app) = app()?;
        app.handle_key(key(KeyCode::Char('3')));
        app.handle_key(key(KeyCode::Char('a')));
        type_line(&mut app, "2024-03-09 Roubo");
        app.handle_key(key(KeyCode::Enter));
        assert_matches::assert_matches!(app.state.input_mode(), InputMode::Summary { .. });
        assert!(app
            .state
            .status_message()
            .is_some_and(|message| message.contains("LABEL=COUNT")));
        assert!(app.store.summaries().is_empty());

        // Keys typed into the entry are not view shortcuts.
        app.handle_key(key(KeyCode::Char('q')));
        assert!(!app.should_quit);
        app.handle_key(key(KeyCode::Esc));
        assert_eq!(app.state.input_mode(), &InputMode::Normal);
        assert!(app.store.summaries().is_empty());
        Ok(())
    }

    #[test]
    fn editing_from_detail_saves_and_returns_to_list() -> anyhow::Result<()> {
        let (_temp, mut app) = app()?;
        app.handle_key(key(KeyCode::Enter));
        assert!(app.state.viewing().is_some());
        app.handle_key(key(KeyCode::Char('e')));
        assert_eq!(app.state.view(), View::Form);
        assert!(app.state.viewing().is_none());

        while app.state.form().map(|f| f.focus()) != Some(FormField::Status) {
            app.handle_key(key(KeyCode::Tab));
        }
        app.handle_key(key(KeyCode::Char(' ')));
        app.handle_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL));

        assert_eq!(app.state.view(), View::List);
        assert_eq!(app.store.incidents()[0].status, IncidentStatus::Concluded);
        assert_eq!(app.store.incidents().len(), 2);
        Ok(())
    }
}
