use async_channel::Sender;
use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use eeg2bids::session::{AppMode, Change, ConnectionState, Session, TaskRecord};
use ratatui::{prelude::*, widgets::*};
use serde_json::{json, Value};

use super::Component;
use crate::styles::{ERROR_COLOR, MUTED_COLOR, SUCCESS_COLOR};
use crate::{action::Action, tui::Frame};

pub const NOT_CONNECTED: &str = "The backend is not connected.";
pub const CONNECTION_LOST: &str = "Lost the backend before it replied.";

const SUMMARY: [(&str, &str); 10] = [
    ("edfFile", "EDF recording"),
    ("edfData", "EDF header"),
    ("bidsDirectory", "BIDS output directory"),
    ("lineFreq", "Line frequency"),
    ("siteID", "Site"),
    ("project", "Project"),
    ("subproject", "Subproject"),
    ("session", "Visit label"),
    ("PSCID", "LORIS candidate"),
    ("output_time", "Last output"),
];

/// How a task value reads in the summary.
fn describe(task: &TaskRecord, key: &str) -> String {
    match task.get(key) {
        None => "not set".to_string(),
        Some(Value::String(s)) if s.is_empty() => "(empty)".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(map)) => match map.get("files").and_then(Value::as_array) {
            Some(files) => format!("{} file(s)", files.len()),
            None => Value::Object(map.clone()).to_string(),
        },
        Some(other) => other.to_string(),
    }
}

fn task_str(task: &TaskRecord, key: &str) -> String {
    task.get_str(key).unwrap_or_default().to_string()
}

/// The `edf_to_bids` request built from the current task. A candidate
/// created in LORIS names the subject, otherwise the EDF header does.
pub fn conversion_request(task: &TaskRecord) -> Value {
    let edf_data = task.get("edfData").cloned().unwrap_or(Value::Null);
    let subject_id = task
        .get_str("PSCID")
        .or_else(|| edf_data.get("subjectID").and_then(Value::as_str))
        .unwrap_or_default()
        .to_string();
    json!({
        "edfData": edf_data,
        "bids_directory": task_str(task, "bidsDirectory"),
        "read_only": false,
        "line_freq": task_str(task, "lineFreq"),
        "site_id": task_str(task, "siteID"),
        "project_id": task_str(task, "project"),
        "sub_project_id": task_str(task, "subproject"),
        "session": task_str(task, "session"),
        "subject_id": subject_id,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Run {
    Idle,
    Pending,
    Done(String),
    Failed(Vec<String>),
}

pub struct Converter {
    command_tx: Option<Sender<Action>>,
    visible: bool,
    run: Run,
}

impl Default for Converter {
    fn default() -> Self {
        Self {
            command_tx: None,
            visible: false,
            run: Run::Idle,
        }
    }
}

impl Converter {
    pub fn new() -> Self {
        Self::default()
    }

    fn apply_reply(&mut self, payload: &Value, session: &mut Session) {
        if let Some(output_time) = payload.get("output_time").and_then(Value::as_str) {
            session.set_task("output_time", output_time);
            self.run = Run::Done(output_time.to_string());
            return;
        }
        let errors = match payload.get("error") {
            Some(Value::Array(errors)) => errors
                .iter()
                .map(|e| e.as_str().map_or_else(|| e.to_string(), str::to_string))
                .collect(),
            Some(Value::String(error)) => vec![error.clone()],
            _ => vec!["Conversion failed.".to_string()],
        };
        self.run = Run::Failed(errors);
    }
}

impl Component for Converter {
    fn register_action_handler(&mut self, tx: Sender<Action>) -> Result<()> {
        self.command_tx = Some(tx);
        Ok(())
    }

    fn register_session_handler(&mut self, session: &mut Session) -> Result<()> {
        if let Some(tx) = self.command_tx.clone() {
            session.on("bids", move |payload| {
                tx.try_send(Action::BidsCreated(payload.clone())).ok();
            });
        }
        Ok(())
    }

    fn screen(&self) -> Option<AppMode> {
        Some(AppMode::Converter)
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn handle_key_events(&mut self, key: KeyEvent, session: &mut Session) -> Result<Option<Action>> {
        if key.code == KeyCode::Enter && self.run != Run::Pending {
            self.run = if session.emit("edf_to_bids", conversion_request(session.task())) {
                Run::Pending
            } else {
                Run::Failed(vec![NOT_CONNECTED.to_string()])
            };
        }
        Ok(None)
    }

    fn update(&mut self, action: Action, session: &mut Session) -> Result<Option<Action>> {
        match action {
            Action::BidsCreated(payload) => self.apply_reply(&payload, session),
            Action::Changed(Change::Connection(
                ConnectionState::Errored | ConnectionState::Disconnected,
            )) if self.run == Run::Pending => {
                self.run = Run::Failed(vec![CONNECTION_LOST.to_string()]);
            }
            _ => {}
        }
        Ok(None)
    }

    fn draw(&mut self, f: &mut Frame<'_>, rect: Rect, session: &Session) -> Result<()> {
        if !self.visible {
            return Ok(());
        }

        let mut lines: Vec<Line> = SUMMARY
            .iter()
            .map(|(key, label)| {
                let value = describe(session.task(), key);
                let style = if session.task().contains(key) {
                    Style::default()
                } else {
                    Style::default().fg(MUTED_COLOR)
                };
                Line::from(vec![
                    Span::raw(format!("{label:<22} ")),
                    Span::styled(value, style),
                ])
            })
            .collect();
        lines.push(Line::from(""));

        match &self.run {
            Run::Idle => lines.push(Line::from(Span::styled(
                "Press Enter to convert the recording to BIDS.",
                Style::default().fg(MUTED_COLOR).italic(),
            ))),
            Run::Pending => lines.push(Line::from("Converting...")),
            Run::Done(output_time) => lines.push(Line::from(Span::styled(
                format!("Success! BIDS written to {output_time}."),
                Style::default().fg(SUCCESS_COLOR),
            ))),
            Run::Failed(errors) => lines.extend(errors.iter().map(|error| {
                Line::from(Span::styled(
                    format!("- {error}"),
                    Style::default().fg(ERROR_COLOR),
                ))
            })),
        }

        let paragraph = Paragraph::new(lines)
            .block(
                Block::default()
                    .title(" iEEG to BIDS ")
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded),
            )
            .wrap(Wrap { trim: false });
        f.render_widget(paragraph, rect);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;
    use eeg2bids::session::{ConnectionConfig, SessionOptions};
    use pretty_assertions::{assert_eq, assert_ne};

    #[test]
    fn summary_tells_absent_from_empty() {
        let mut task = TaskRecord::new();
        task.set("session", "");
        task.set("lineFreq", "60");
        task.set("edfData", json!({"files": [{"path": "a.edf"}, {"path": "b.edf"}]}));

        assert_eq!(describe(&task, "siteID"), "not set");
        assert_eq!(describe(&task, "session"), "(empty)");
        assert_eq!(describe(&task, "lineFreq"), "60");
        assert_eq!(describe(&task, "edfData"), "2 file(s)");
    }

    #[test]
    fn request_always_carries_the_session() {
        let mut task = TaskRecord::new();
        task.set("bidsDirectory", "/tmp/bids");
        task.set("edfData", json!({"files": [], "subjectID": "X"}));

        let request = conversion_request(&task);
        assert_eq!(request["session"], json!(""));
        assert_eq!(request["bids_directory"], json!("/tmp/bids"));
        assert_eq!(request["subject_id"], json!("X"));
        assert_eq!(request["read_only"], json!(false));

        task.set("PSCID", "MTL0001");
        assert_eq!(conversion_request(&task)["subject_id"], json!("MTL0001"));
    }

    fn enter(converter: &mut Converter, session: &mut Session) {
        converter
            .handle_key_events(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE), session)
            .unwrap();
    }

    #[test]
    fn enter_without_a_backend_fails_and_can_retry() {
        let mut converter = Converter::new();
        let mut session = Session::new();

        enter(&mut converter, &mut session);
        assert_eq!(converter.run, Run::Failed(vec![NOT_CONNECTED.to_string()]));
        enter(&mut converter, &mut session);
        assert_ne!(converter.run, Run::Pending);
    }

    #[tokio::test]
    async fn losing_the_backend_releases_a_pending_run() {
        let (events, _rx) = tokio::sync::mpsc::unbounded_channel();
        let options = SessionOptions {
            backend: Some(ConnectionConfig::with_uri("http://127.0.0.1:9")),
            ..SessionOptions::default()
        };
        let mut session = Session::start(&options, events);
        let mut converter = Converter::new();

        enter(&mut converter, &mut session);
        assert_eq!(converter.run, Run::Pending);

        converter
            .update(
                Action::Changed(Change::Connection(ConnectionState::Errored)),
                &mut session,
            )
            .unwrap();
        assert_eq!(converter.run, Run::Failed(vec![CONNECTION_LOST.to_string()]));
    }

    #[test]
    fn replies_store_the_output_or_list_errors() {
        let mut converter = Converter::new();
        let mut session = Session::new();

        converter
            .update(
                Action::BidsCreated(json!({"error": [
                    "No .edf file(s) to convert.",
                    "The LORIS Visit Label is missing.",
                ]})),
                &mut session,
            )
            .unwrap();
        assert_eq!(
            converter.run,
            Run::Failed(vec![
                "No .edf file(s) to convert.".to_string(),
                "The LORIS Visit Label is missing.".to_string(),
            ])
        );
        assert_eq!(session.get_task("output_time"), None);

        converter
            .update(
                Action::BidsCreated(json!({"output_time": "output-2021-06-01"})),
                &mut session,
            )
            .unwrap();
        assert_eq!(session.get_task("output_time"), Some(&json!("output-2021-06-01")));
        assert_eq!(converter.run, Run::Done("output-2021-06-01".to_string()));
    }
}
