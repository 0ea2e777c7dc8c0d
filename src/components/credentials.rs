use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use eeg2bids::session::Session;
use ratatui::{prelude::*, widgets::*};
use serde_json::{json, Value};

use super::{
    form::{Field, Form},
    Component,
};
use crate::styles::{FOCUSED_COLOR, MUTED_COLOR};
use crate::{action::Action, config::Config, tui::Frame};

const LORIS_URL: &str = "lorisURL";
const LORIS_USERNAME: &str = "lorisUsername";
const LORIS_PASSWORD: &str = "lorisPassword";

/// Modal LORIS sign-in dialog. Closing it is always done through
/// [`Action::ToggleCredentials`].
pub struct Credentials {
    visible: bool,
    form: Form,
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new()
    }
}

impl Credentials {
    pub fn new() -> Self {
        let form = Form::new(vec![
            Field::new(LORIS_URL, "LORIS URL", "https://loris.example.org"),
            Field::new(LORIS_USERNAME, "Username", ""),
            Field::new(LORIS_PASSWORD, "Password", "").masked(),
        ]);
        Self {
            visible: false,
            form,
        }
    }

    fn payload(&self) -> Value {
        let value = |key: &str| self.form.value(key).unwrap_or_default();
        json!({
            LORIS_URL: value(LORIS_URL),
            LORIS_USERNAME: value(LORIS_USERNAME),
            LORIS_PASSWORD: value(LORIS_PASSWORD),
        })
    }
}

fn centered(width: u16, height: u16, rect: Rect) -> Rect {
    let width = width.min(rect.width);
    let height = height.min(rect.height);
    Rect::new(
        rect.x + (rect.width - width) / 2,
        rect.y + (rect.height - height) / 2,
        width,
        height,
    )
}

impl Component for Credentials {
    fn register_config_handler(&mut self, config: Config) -> Result<()> {
        self.form.set_value(LORIS_URL, &config.loris.url);
        self.form.set_value(LORIS_USERNAME, &config.loris.username);
        self.form.set_value(LORIS_PASSWORD, &config.loris.password);
        Ok(())
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn handle_key_events(&mut self, key: KeyEvent, session: &mut Session) -> Result<Option<Action>> {
        if !self.visible {
            return Ok(None);
        }
        match key.code {
            KeyCode::Esc => return Ok(Some(Action::ToggleCredentials)),
            KeyCode::Enter => {
                session.emit("set_loris_credentials", self.payload());
                return Ok(Some(Action::ToggleCredentials));
            }
            KeyCode::Tab | KeyCode::Down => self.form.focus_next(),
            KeyCode::BackTab | KeyCode::Up => self.form.focus_previous(),
            _ => {
                self.form.input(key);
            }
        }
        Ok(None)
    }

    fn update(&mut self, action: Action, _session: &mut Session) -> Result<Option<Action>> {
        if action == Action::ToggleCredentials {
            self.visible = !self.visible;
        }
        Ok(None)
    }

    fn draw(&mut self, f: &mut Frame<'_>, rect: Rect, _session: &Session) -> Result<()> {
        if !self.visible {
            return Ok(());
        }

        let area = centered(60, self.form.height() + 3, rect);
        f.render_widget(Clear, area);
        let block = Block::default()
            .title(" LORIS sign in ")
            .borders(Borders::ALL)
            .border_type(BorderType::Double)
            .style(Style::default().fg(FOCUSED_COLOR));
        let inner = block.inner(area);
        f.render_widget(block, area);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints(vec![Constraint::Length(self.form.height()), Constraint::Min(0)])
            .split(inner);
        self.form.draw(f, layout[0]);
        f.render_widget(
            Paragraph::new(Span::styled(
                "Enter to sign in, Esc to close",
                Style::default().fg(MUTED_COLOR).italic(),
            )),
            layout[1],
        );
        Ok(())
    }
}
