use async_channel::Sender;
use color_eyre::eyre::Result;
use eeg2bids::session::{AppMode, Session};
use ratatui::{prelude::*, widgets::*};
use serde_json::Value;

use super::Component;
use crate::styles::{ERROR_COLOR, FOCUSED_COLOR, MUTED_COLOR, SUCCESS_COLOR};
use crate::{action::Action, config::Config, tui::Frame};

const STEPS: [&str; 4] = [
    "1) Getting started: sign in to your LORIS account.",
    "2) Configuration: choose the EDF recording and where the BIDS output goes.",
    "3) iEEG to BIDS: convert the recording.",
    "4) Validator: check the BIDS output.",
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Login {
    SignedOut,
    SignedIn(String),
    Failed(String),
}

pub struct Welcome {
    command_tx: Option<Sender<Action>>,
    visible: bool,
    login: Login,
}

impl Default for Welcome {
    fn default() -> Self {
        Self {
            command_tx: None,
            visible: false,
            login: Login::SignedOut,
        }
    }
}

impl Welcome {
    pub fn new() -> Self {
        Self::default()
    }

    fn apply_login(&mut self, payload: &Value) {
        self.login = match payload.get("error").and_then(Value::as_str) {
            Some(error) => Login::Failed(error.to_string()),
            None => Login::SignedIn(
                payload
                    .get("lorisUsername")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            ),
        };
    }
}

impl Component for Welcome {
    fn register_action_handler(&mut self, tx: Sender<Action>) -> Result<()> {
        self.command_tx = Some(tx);
        Ok(())
    }

    fn register_config_handler(&mut self, config: Config) -> Result<()> {
        let loris = config.loris;
        if !loris.url.is_empty() && !loris.username.is_empty() {
            self.login = Login::SignedIn(loris.username);
        }
        Ok(())
    }

    fn register_session_handler(&mut self, session: &mut Session) -> Result<()> {
        if let Some(tx) = self.command_tx.clone() {
            session.on("loris_login_response", move |payload| {
                tx.try_send(Action::LorisLogin(payload.clone())).ok();
            });
        }
        Ok(())
    }

    fn screen(&self) -> Option<AppMode> {
        Some(AppMode::Welcome)
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn update(&mut self, action: Action, _session: &mut Session) -> Result<Option<Action>> {
        if let Action::LorisLogin(payload) = action {
            self.apply_login(&payload);
        }
        Ok(None)
    }

    fn draw(&mut self, f: &mut Frame<'_>, rect: Rect, _session: &Session) -> Result<()> {
        if !self.visible {
            return Ok(());
        }

        let mut lines = vec![
            Line::from("Welcome! This wizard converts iEEG recordings in EDF format to BIDS."),
            Line::from(""),
        ];
        lines.extend(STEPS.iter().map(|step| Line::from(format!("  {step}"))));
        lines.push(Line::from(""));

        let login = match &self.login {
            Login::SignedOut => Span::styled(
                "You are not logged in to a LORIS account.",
                Style::default().fg(MUTED_COLOR),
            ),
            Login::SignedIn(username) => Span::styled(
                format!("LORIS account set as {username}."),
                Style::default().fg(SUCCESS_COLOR),
            ),
            Login::Failed(error) => Span::styled(error.clone(), Style::default().fg(ERROR_COLOR)),
        };
        lines.push(Line::from(login));
        lines.push(Line::from(Span::styled(
            "Press Ctrl-l to sign in, F1..F4 to move between steps.",
            Style::default().fg(MUTED_COLOR).italic(),
        )));

        let paragraph = Paragraph::new(lines)
            .block(
                Block::default()
                    .title(" Getting started ")
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .style(Style::default().fg(FOCUSED_COLOR)),
            )
            .wrap(Wrap { trim: false });
        f.render_widget(paragraph, rect);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn saved_account_is_shown_as_signed_in() {
        let mut welcome = Welcome::new();
        welcome.register_config_handler(Config::default()).unwrap();
        assert_eq!(welcome.login, Login::SignedOut);

        let mut config = Config::default();
        config.loris.url = "https://demo.loris.ca".to_string();
        config.loris.username = "admin".to_string();
        welcome.register_config_handler(config).unwrap();
        assert_eq!(welcome.login, Login::SignedIn("admin".to_string()));
    }

    #[test]
    fn login_responses_update_the_status() {
        let mut welcome = Welcome::new();
        let mut session = Session::new();
        welcome
            .update(
                Action::LorisLogin(json!({"success": 200, "lorisUsername": "admin"})),
                &mut session,
            )
            .unwrap();
        assert_eq!(welcome.login, Login::SignedIn("admin".to_string()));

        welcome
            .update(
                Action::LorisLogin(json!({"error": "Can't login to the LORIS instance."})),
                &mut session,
            )
            .unwrap();
        assert_eq!(
            welcome.login,
            Login::Failed("Can't login to the LORIS instance.".to_string())
        );
    }
}
