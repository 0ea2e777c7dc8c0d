use color_eyre::eyre::Result;
use eeg2bids::session::{AppMode, Session};
use ratatui::{prelude::*, widgets::*};

use super::Component;
use crate::styles::{ACTIVE_COLOR, MUTED_COLOR};
use crate::tui::Frame;

#[derive(Default)]
pub struct Splash {
    visible: bool,
}

impl Splash {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Component for Splash {
    fn screen(&self) -> Option<AppMode> {
        Some(AppMode::Splash)
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn draw(&mut self, f: &mut Frame<'_>, rect: Rect, session: &Session) -> Result<()> {
        if !self.visible {
            return Ok(());
        }

        let lines = vec![
            Line::from(Span::styled(
                "EEG2BIDS Wizard",
                Style::default().fg(ACTIVE_COLOR).bold(),
            )),
            Line::from(format!("v{}", env!("CARGO_PKG_VERSION"))),
            Line::from(""),
            Line::from(Span::styled(
                format!("backend {}", session.connection_state()),
                Style::default().fg(MUTED_COLOR),
            )),
        ];
        let height = lines.len() as u16;
        let area = Layout::default()
            .direction(Direction::Vertical)
            .constraints(vec![
                Constraint::Min(0),
                Constraint::Length(height),
                Constraint::Min(0),
            ])
            .split(rect)[1];

        f.render_widget(Paragraph::new(lines).alignment(Alignment::Center), area);
        Ok(())
    }
}
