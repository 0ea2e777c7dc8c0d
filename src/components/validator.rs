use async_channel::Sender;
use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use eeg2bids::session::{AppMode, Change, ConnectionState, Session, TaskRecord};
use ratatui::{prelude::*, widgets::*};
use serde_json::{json, Value};

use super::converter::{CONNECTION_LOST, NOT_CONNECTED};
use super::Component;
use crate::styles::{ERROR_COLOR, MUTED_COLOR, SUCCESS_COLOR};
use crate::{action::Action, tui::Frame};

/// Payload shared by `validate_bids` and `tarfile_bids`.
pub fn output_request(task: &TaskRecord) -> Value {
    json!({
        "bids_directory": task.get_str("bidsDirectory").unwrap_or_default(),
        "output_time": task.get_str("output_time").unwrap_or_default(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Outcome {
    Idle,
    Pending,
    Checked(Vec<(String, bool)>),
    Compressed(String),
    Failed(Vec<String>),
}

/// Runs the BIDS validator on the last conversion output and packs it into
/// an archive. Both replies arrive as `response`.
pub struct Validator {
    command_tx: Option<Sender<Action>>,
    visible: bool,
    outcome: Outcome,
    scroll: u16,
}

impl Default for Validator {
    fn default() -> Self {
        Self {
            command_tx: None,
            visible: false,
            outcome: Outcome::Idle,
            scroll: 0,
        }
    }
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    fn request(&mut self, event: &str, session: &Session) {
        self.scroll = 0;
        self.outcome = if session.emit(event, output_request(session.task())) {
            Outcome::Pending
        } else {
            Outcome::Failed(vec![NOT_CONNECTED.to_string()])
        };
    }

    fn apply_reply(&mut self, payload: &Value) {
        self.scroll = 0;
        if let Some(error) = payload.get("error") {
            let errors = match error {
                Value::Array(errors) => errors
                    .iter()
                    .map(|e| e.as_str().map_or_else(|| e.to_string(), str::to_string))
                    .collect(),
                other => vec![other.as_str().map_or_else(|| other.to_string(), str::to_string)],
            };
            self.outcome = Outcome::Failed(errors);
            return;
        }
        if let Some(time) = payload.get("compression_time").and_then(Value::as_str) {
            self.outcome = Outcome::Compressed(time.to_string());
            return;
        }

        let paths = payload
            .get("file_paths")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let results = payload
            .get("result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let checked = paths
            .iter()
            .enumerate()
            .map(|(i, path)| {
                let path = path.as_str().map_or_else(|| path.to_string(), str::to_string);
                let valid = results.get(i).and_then(Value::as_bool).unwrap_or(false);
                (path, valid)
            })
            .collect();
        self.outcome = Outcome::Checked(checked);
    }
}

impl Component for Validator {
    fn register_action_handler(&mut self, tx: Sender<Action>) -> Result<()> {
        self.command_tx = Some(tx);
        Ok(())
    }

    fn register_session_handler(&mut self, session: &mut Session) -> Result<()> {
        if let Some(tx) = self.command_tx.clone() {
            session.on("response", move |payload| {
                tx.try_send(Action::ValidationResult(payload.clone())).ok();
            });
        }
        Ok(())
    }

    fn screen(&self) -> Option<AppMode> {
        Some(AppMode::Validator)
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn handle_key_events(&mut self, key: KeyEvent, session: &mut Session) -> Result<Option<Action>> {
        let idle = self.outcome != Outcome::Pending;
        match key.code {
            KeyCode::Enter if idle => self.request("validate_bids", session),
            KeyCode::Char('c') if idle => self.request("tarfile_bids", session),
            KeyCode::Down => self.scroll = self.scroll.saturating_add(1),
            KeyCode::Up => self.scroll = self.scroll.saturating_sub(1),
            _ => {}
        }
        Ok(None)
    }

    fn update(&mut self, action: Action, _session: &mut Session) -> Result<Option<Action>> {
        match action {
            Action::ValidationResult(payload) => self.apply_reply(&payload),
            Action::Changed(Change::Connection(
                ConnectionState::Errored | ConnectionState::Disconnected,
            )) if self.outcome == Outcome::Pending => {
                self.outcome = Outcome::Failed(vec![CONNECTION_LOST.to_string()]);
            }
            _ => {}
        }
        Ok(None)
    }

    fn draw(&mut self, f: &mut Frame<'_>, rect: Rect, session: &Session) -> Result<()> {
        if !self.visible {
            return Ok(());
        }

        let target = match session.task().get_str("output_time") {
            Some(output_time) => format!("Output {output_time}"),
            None => "No conversion output yet.".to_string(),
        };
        let mut lines = vec![Line::from(target), Line::from("")];

        match &self.outcome {
            Outcome::Idle => lines.push(Line::from(Span::styled(
                "Press Enter to validate the BIDS output, c to compress it.",
                Style::default().fg(MUTED_COLOR).italic(),
            ))),
            Outcome::Pending => lines.push(Line::from("Waiting for the backend...")),
            Outcome::Checked(files) => lines.extend(files.iter().map(|(path, valid)| {
                let (mark, color) = if *valid {
                    ("\u{2713}", SUCCESS_COLOR)
                } else {
                    ("\u{2717}", ERROR_COLOR)
                };
                Line::from(vec![
                    Span::styled(format!("{mark} "), Style::default().fg(color)),
                    Span::raw(path.clone()),
                ])
            })),
            Outcome::Compressed(time) => lines.push(Line::from(Span::styled(
                format!("Compressed in {time}."),
                Style::default().fg(SUCCESS_COLOR),
            ))),
            Outcome::Failed(errors) => lines.extend(errors.iter().map(|error| {
                Line::from(Span::styled(
                    format!("- {error}"),
                    Style::default().fg(ERROR_COLOR),
                ))
            })),
        }

        let paragraph = Paragraph::new(lines)
            .block(
                Block::default()
                    .title(" Validator ")
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded),
            )
            .scroll((self.scroll, 0));
        f.render_widget(paragraph, rect);
        Ok(())
    }
}
