use color_eyre::eyre::Result;
use crossterm::event::{MouseButton, MouseEvent, MouseEventKind};
use eeg2bids::session::{Session, MENU_TABS};
use ratatui::{prelude::*, widgets::*};

use super::Component;
use crate::styles::{ACTIVE_COLOR, UNFOCUSED_COLOR};
use crate::{action::Action, tui::Frame};

const DIVIDER: &str = "|";

/// The tab bar. Hidden while the splash screen is up.
#[derive(Default)]
pub struct Menu {
    visible: bool,
    area: Rect,
}

impl Menu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Which tab, if any, is drawn at column `x` of the last rendered bar.
    fn tab_at(&self, x: u16, y: u16) -> Option<usize> {
        let inner = self.area.inner(&Margin::new(1, 1));
        if y < inner.top() || y >= inner.bottom() || x < inner.left() {
            return None;
        }
        let mut start = inner.left();
        for (position, tab) in MENU_TABS.iter().enumerate() {
            // tabs are padded by one column on each side
            let end = start + tab.title.chars().count() as u16 + 2;
            if x >= start && x < end {
                return Some(position);
            }
            start = end + DIVIDER.len() as u16;
        }
        None
    }
}

impl Component for Menu {
    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn handle_mouse_events(&mut self, mouse: MouseEvent) -> Result<Option<Action>> {
        if !self.visible {
            return Ok(None);
        }
        if let MouseEventKind::Down(MouseButton::Left) = mouse.kind {
            return Ok(self.tab_at(mouse.column, mouse.row).map(Action::Navigate));
        }
        Ok(None)
    }

    fn draw(&mut self, f: &mut Frame<'_>, rect: Rect, session: &Session) -> Result<()> {
        self.area = rect;
        if !self.visible {
            return Ok(());
        }

        let tabs = Tabs::new(MENU_TABS.iter().map(|tab| tab.title).collect::<Vec<_>>())
            .block(
                Block::default()
                    .title(" EEG2BIDS Wizard ")
                    .title_alignment(Alignment::Left)
                    .borders(Borders::ALL)
                    .border_type(BorderType::Thick),
            )
            .style(Style::default().fg(UNFOCUSED_COLOR))
            .highlight_style(
                Style::default()
                    .fg(ACTIVE_COLOR)
                    .add_modifier(Modifier::BOLD),
            )
            .divider(DIVIDER)
            .select(session.active_tab());
        f.render_widget(tabs, rect);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;
    use pretty_assertions::assert_eq;

    fn click(column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[test]
    fn clicks_map_to_tab_positions() {
        let mut menu = Menu::new();
        menu.set_visible(true);
        menu.area = Rect::new(0, 0, 100, 3);

        // " 1) Getting started " spans columns 1..=20, the divider sits at 21
        assert_eq!(menu.handle_mouse_events(click(2, 1)).unwrap(), Some(Action::Navigate(0)));
        assert_eq!(menu.handle_mouse_events(click(21, 1)).unwrap(), None);
        assert_eq!(menu.handle_mouse_events(click(23, 1)).unwrap(), Some(Action::Navigate(1)));
        assert_eq!(menu.handle_mouse_events(click(2, 0)).unwrap(), None);
    }

    #[test]
    fn hidden_menu_ignores_clicks() {
        let mut menu = Menu::new();
        menu.area = Rect::new(0, 0, 100, 3);
        assert_eq!(menu.handle_mouse_events(click(2, 1)).unwrap(), None);
    }
}
