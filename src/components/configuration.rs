use std::path::Path;

use async_channel::Sender;
use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use eeg2bids::session::{AppMode, Change, Session};
use ratatui::{prelude::*, widgets::*};
use serde_json::{json, Value};

use super::{
    converter::NOT_CONNECTED,
    form::{Field, Form},
    Component,
};
use crate::styles::{ERROR_COLOR, MUTED_COLOR, SUCCESS_COLOR};
use crate::{
    action::{Action, LorisList},
    tui::Frame,
};

pub const EDF_FILE: &str = "edfFile";
pub const METADATA_FILE: &str = "metadataFile";

const SEXES: [&str; 3] = ["Male", "Female", "Other"];

/// The form field offering the entries of a LORIS list.
fn choice_field(kind: LorisList) -> &'static str {
    match kind {
        LorisList::Sites => "siteID",
        LorisList::Projects => "project",
        LorisList::Subprojects => "subproject",
        LorisList::Visits => "session",
    }
}

/// Names out of a LORIS list reply. Objects list their keys, entries that
/// are objects give their `name`.
fn option_names(payload: &Value) -> Vec<String> {
    match payload {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(name) => Some(name.clone()),
                Value::Object(entry) => entry.get("name").and_then(Value::as_str).map(str::to_string),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Value::Object(map) => map.keys().cloned().collect(),
        _ => Vec::new(),
    }
}

fn task_str(session: &Session, key: &str) -> String {
    session.task().get_str(key).unwrap_or_default().to_string()
}

/// The `create_candidate_and_visit` request built from the current task.
pub fn candidate_request(session: &Session) -> Value {
    let date = session
        .get_task("edfData")
        .and_then(|edf| edf.get("date"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    json!({
        "project": task_str(session, "project"),
        "dob": task_str(session, "dob"),
        "sex": task_str(session, "sex"),
        "site": task_str(session, "siteID"),
        "visit": task_str(session, "session"),
        "subproject": task_str(session, "subproject"),
        "date": date,
    })
}

/// Recording, output and LORIS settings, written into the task record as
/// they are committed.
pub struct Configuration {
    command_tx: Option<Sender<Action>>,
    visible: bool,
    form: Form,
    status: Option<Result<String, String>>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}

impl Configuration {
    pub fn new() -> Self {
        let mut form = Form::new(vec![
            Field::new(EDF_FILE, "EDF recording", "/path/to/recording.edf"),
            Field::new(METADATA_FILE, "BIDS metadata file", "/path/to/metadata.tsv"),
            Field::new("bidsDirectory", "BIDS output directory", "/path/to/bids"),
            Field::new("lineFreq", "Line frequency (Hz)", "60"),
            Field::new("siteID", "Site", "sign in to list sites"),
            Field::new("project", "Project", "sign in to list projects"),
            Field::new("subproject", "Subproject", "pick a project first"),
            Field::new("session", "LORIS visit label", "V1"),
            Field::new("dob", "Candidate date of birth", "YYYY-MM-DD"),
            Field::new("sex", "Candidate sex", ""),
        ]);
        if let Some(sex) = form.field_mut("sex") {
            sex.set_choices(SEXES.iter().map(|s| s.to_string()).collect());
        }
        Self {
            command_tx: None,
            visible: false,
            form,
            status: None,
        }
    }

    fn emit(&mut self, session: &Session, event: &str, payload: Value, pending: &str) {
        self.status = Some(if session.emit(event, payload) {
            Ok(pending.to_string())
        } else {
            Err(NOT_CONNECTED.to_string())
        });
    }

    /// Writes the focused field into the task record if it changed, then
    /// asks the backend for whatever depends on it.
    fn commit(&mut self, session: &mut Session) {
        let field = self.form.focused();
        let (key, value) = (field.key, field.value());
        match session.get_task(key) {
            None if value.is_empty() => return,
            Some(current) if current.as_str() == Some(value.as_str()) => return,
            _ => {}
        }
        session.set_task(key, value.clone());
        if value.is_empty() {
            return;
        }

        match key {
            EDF_FILE => {
                let name = Path::new(&value)
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| value.clone());
                let request = json!({ "files": [{ "path": value, "name": name }] });
                self.emit(session, "get_edf_data", request, "Reading EDF header...");
            }
            METADATA_FILE => {
                let request = json!({ "file_path": value, "modality": "ieeg" });
                self.emit(session, "get_bids_metadata", request, "Reading metadata...");
            }
            "project" => {
                self.emit(session, "get_loris_subprojects", json!(value), "Listing subprojects...");
            }
            "subproject" => {
                self.emit(session, "get_loris_visits", json!(value), "Listing visits...");
            }
            _ => {}
        }
    }

    fn apply_edf_data(&mut self, payload: Value, session: &mut Session) {
        if let Some(error) = payload.get("error").and_then(Value::as_str) {
            self.status = Some(Err(error.to_string()));
            return;
        }
        let files = payload
            .get("files")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        let subject = payload
            .get("subjectID")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        session.set_task("edfData", payload);
        self.status = Some(Ok(format!("{files} file(s) read, subject {subject}")));
    }

    fn apply_options(&mut self, kind: LorisList, payload: &Value, session: &mut Session) {
        let names = option_names(payload);
        session.set_task(kind.task_key(), names.clone());
        if let Some(field) = self.form.field_mut(choice_field(kind)) {
            field.set_choices(names);
        }
    }

    fn apply_metadata(&mut self, payload: Value, session: &mut Session) {
        if let Some(error) = payload.get("error").and_then(Value::as_str) {
            self.status = Some(Err(error.to_string()));
            return;
        }
        let metadata = payload.get("metadata").cloned().unwrap_or(Value::Null);
        let fields = metadata.as_object().map_or(0, |m| m.len());
        let invalid: Vec<&str> = payload
            .get("invalid_keys")
            .and_then(Value::as_array)
            .map(|keys| keys.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        self.status = Some(if invalid.is_empty() {
            Ok(format!("{fields} metadata field(s) read"))
        } else {
            Err(format!("Unknown metadata fields: {}", invalid.join(", ")))
        });
        session.set_task("bidsMetadata", metadata);
    }

    fn apply_candidate(&mut self, payload: &Value, session: &mut Session) {
        match payload.get("PSCID").and_then(Value::as_str) {
            Some(pscid) => {
                session.set_task("PSCID", pscid);
                self.status = Some(Ok(format!("Candidate {pscid} created.")));
            }
            None => self.status = Some(Err("LORIS did not create the candidate.".to_string())),
        }
    }
}

impl Component for Configuration {
    fn register_action_handler(&mut self, tx: Sender<Action>) -> Result<()> {
        self.command_tx = Some(tx);
        Ok(())
    }

    fn register_session_handler(&mut self, session: &mut Session) -> Result<()> {
        let Some(tx) = self.command_tx.clone() else {
            return Ok(());
        };
        let edf_tx = tx.clone();
        session.on("edf_data", move |payload| {
            edf_tx.try_send(Action::EdfData(payload.clone())).ok();
        });
        let metadata_tx = tx.clone();
        session.on("bids_metadata", move |payload| {
            metadata_tx.try_send(Action::BidsMetadata(payload.clone())).ok();
        });
        let candidate_tx = tx.clone();
        session.on("new_candidate_created", move |payload| {
            candidate_tx.try_send(Action::CandidateCreated(payload.clone())).ok();
        });
        for kind in LorisList::ALL {
            let tx = tx.clone();
            session.on(kind.event(), move |payload| {
                tx.try_send(Action::LorisOptions(kind, payload.clone())).ok();
            });
        }
        Ok(())
    }

    fn screen(&self) -> Option<AppMode> {
        Some(AppMode::Configuration)
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn handle_key_events(&mut self, key: KeyEvent, session: &mut Session) -> Result<Option<Action>> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Tab | KeyCode::Down => {
                self.commit(session);
                self.form.focus_next();
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.commit(session);
                self.form.focus_previous();
            }
            KeyCode::Enter => self.commit(session),
            KeyCode::Char('r') if ctrl => {
                self.emit(session, "get_loris_projects", Value::Null, "Listing projects...");
            }
            KeyCode::Char('n') if ctrl => {
                self.commit(session);
                let request = candidate_request(session);
                self.emit(session, "create_candidate_and_visit", request, "Creating candidate...");
            }
            _ => {
                self.form.input(key);
            }
        }
        Ok(None)
    }

    fn update(&mut self, action: Action, session: &mut Session) -> Result<Option<Action>> {
        match action {
            Action::EdfData(payload) => self.apply_edf_data(payload, session),
            Action::LorisOptions(kind, payload) => self.apply_options(kind, &payload, session),
            Action::BidsMetadata(payload) => self.apply_metadata(payload, session),
            Action::CandidateCreated(payload) => self.apply_candidate(&payload, session),
            // keep the form in sync with writes made elsewhere
            Action::Changed(Change::Task { key }) => {
                if let Some(value) = session.get_task(&key).and_then(Value::as_str) {
                    if self.form.value(&key).is_some_and(|current| current != value) {
                        self.form.set_value(&key, value);
                    }
                }
            }
            _ => {}
        }
        Ok(None)
    }

    fn draw(&mut self, f: &mut Frame<'_>, rect: Rect, _session: &Session) -> Result<()> {
        if !self.visible {
            return Ok(());
        }

        let block = Block::default()
            .title(" Configuration ")
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded);
        let inner = block.inner(rect);
        f.render_widget(block, rect);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints(vec![
                Constraint::Max(self.form.height()),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(inner);
        self.form.draw(f, layout[0]);

        let status = match &self.status {
            Some(Ok(message)) => Span::styled(message.clone(), Style::default().fg(SUCCESS_COLOR)),
            Some(Err(message)) => Span::styled(message.clone(), Style::default().fg(ERROR_COLOR)),
            None => Span::styled(
                "Tab/Up/Down move between fields, Enter saves the field.",
                Style::default().fg(MUTED_COLOR).italic(),
            ),
        };
        f.render_widget(Paragraph::new(Line::from(status)), layout[1]);
        f.render_widget(
            Paragraph::new(Line::from(Span::styled(
                "Ctrl-r lists LORIS projects, Ctrl-n creates the candidate and visit.",
                Style::default().fg(MUTED_COLOR).italic(),
            ))),
            layout[2],
        );
        Ok(())
    }
}
