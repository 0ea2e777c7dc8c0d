use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{prelude::*, widgets::*};
use tui_textarea::TextArea;

use crate::styles::{ACTIVE_COLOR, UNFOCUSED_COLOR};

/// A labelled single line text input, optionally offering a list of choices.
pub struct Field {
    pub key: &'static str,
    pub label: &'static str,
    placeholder: String,
    masked: bool,
    choices: Vec<String>,
    input: TextArea<'static>,
}

impl Field {
    pub fn new(key: &'static str, label: &'static str, placeholder: &str) -> Self {
        let mut field = Self {
            key,
            label,
            placeholder: placeholder.to_string(),
            masked: false,
            choices: Vec::new(),
            input: TextArea::default(),
        };
        field.set_value("");
        field
    }

    pub fn masked(mut self) -> Self {
        self.masked = true;
        self.input.set_mask_char('\u{2022}');
        self
    }

    pub fn value(&self) -> String {
        self.input.lines().concat()
    }

    pub fn set_value(&mut self, value: &str) {
        let mut input = TextArea::new(vec![value.to_string()]);
        input.set_cursor_line_style(Style::default());
        input.set_placeholder_text(self.placeholder.clone());
        if self.masked {
            input.set_mask_char('\u{2022}');
        }
        input.move_cursor(tui_textarea::CursorMove::End);
        self.input = input;
    }

    pub fn choices(&self) -> &[String] {
        &self.choices
    }

    pub fn set_choices(&mut self, choices: Vec<String>) {
        self.choices = choices;
    }

    /// Steps to the next (or previous) choice after the current value.
    pub fn cycle(&mut self, forward: bool) -> bool {
        let len = self.choices.len();
        if len == 0 {
            return false;
        }
        let current = self.value();
        let next = match self.choices.iter().position(|choice| *choice == current) {
            Some(i) if forward => (i + 1) % len,
            Some(i) => (i + len - 1) % len,
            None if forward => 0,
            None => len - 1,
        };
        let choice = self.choices[next].clone();
        self.set_value(&choice);
        true
    }
}

/// A column of [`Field`]s with one of them focused.
pub struct Form {
    fields: Vec<Field>,
    focus: usize,
}

impl Form {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields, focus: 0 }
    }

    pub fn focused(&self) -> &Field {
        &self.fields[self.focus]
    }

    pub fn focus_next(&mut self) {
        self.focus = (self.focus + 1) % self.fields.len();
    }

    pub fn focus_previous(&mut self) {
        self.focus = (self.focus + self.fields.len() - 1) % self.fields.len();
    }

    pub fn field_mut(&mut self, key: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|field| field.key == key)
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.fields
            .iter()
            .find(|field| field.key == key)
            .map(Field::value)
    }

    pub fn set_value(&mut self, key: &str, value: &str) {
        if let Some(field) = self.field_mut(key) {
            field.set_value(value);
        }
    }

    /// Feeds a key to the focused field. Left and Right pick among its
    /// choices when it has any.
    pub fn input(&mut self, key: KeyEvent) -> bool {
        let field = &mut self.fields[self.focus];
        match key.code {
            KeyCode::Right if !field.choices.is_empty() => field.cycle(true),
            KeyCode::Left if !field.choices.is_empty() => field.cycle(false),
            _ => field.input.input(key),
        }
    }

    pub fn height(&self) -> u16 {
        self.fields.len() as u16 * 3
    }

    /// First field drawn when only `rows` fields fit.
    fn offset(&self, rows: usize) -> usize {
        (self.focus + 1).saturating_sub(rows.max(1))
    }

    pub fn draw(&mut self, f: &mut Frame<'_>, rect: Rect) {
        let rows = (rect.height / 3).max(1) as usize;
        let offset = self.offset(rows);
        let shown = rows.min(self.fields.len() - offset);
        let mut constraints = vec![Constraint::Length(3); shown];
        constraints.push(Constraint::Min(0));
        let areas = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(rect);

        for (row, index) in (offset..offset + shown).enumerate() {
            let focused = index == self.focus;
            let field = &mut self.fields[index];
            let color = if focused { ACTIVE_COLOR } else { UNFOCUSED_COLOR };
            let title = if field.choices.is_empty() {
                format!(" {} ", field.label)
            } else {
                format!(" {} (\u{2190}/\u{2192}: {} choices) ", field.label, field.choices.len())
            };
            field.input.set_block(
                Block::default()
                    .title(title)
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .style(Style::default().fg(color)),
            );
            field.input.set_cursor_style(if focused {
                Style::default().add_modifier(Modifier::REVERSED)
            } else {
                Style::default()
            });
            f.render_widget(field.input.widget(), areas[row]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;
    use pretty_assertions::assert_eq;

    fn form() -> Form {
        Form::new(vec![
            Field::new("bidsDirectory", "BIDS output directory", ""),
            Field::new("session", "Visit label", ""),
        ])
    }

    #[test]
    fn typing_goes_to_the_focused_field() {
        let mut form = form();
        form.focus_next();
        for c in "V1".chars() {
            form.input(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE));
        }
        assert_eq!(form.value("session"), Some("V1".to_string()));
        assert_eq!(form.value("bidsDirectory"), Some(String::new()));
        assert_eq!(form.value("missing"), None);
    }

    #[test]
    fn focus_wraps_around() {
        let mut form = form();
        form.focus_previous();
        assert_eq!(form.focused().key, "session");
        form.focus_next();
        assert_eq!(form.focused().key, "bidsDirectory");
    }

    #[test]
    fn prefilled_values_keep_the_mask_and_placeholder() {
        let mut field = Field::new("lorisPassword", "Password", "secret").masked();
        field.set_value("hunter2");
        assert_eq!(field.value(), "hunter2");
        assert_eq!(field.input.mask_char(), Some('\u{2022}'));

        field.set_value("");
        assert_eq!(field.input.placeholder_text(), "secret");
    }

    #[test]
    fn arrows_cycle_through_choices() {
        let mut form = form();
        form.field_mut("bidsDirectory")
            .unwrap()
            .set_choices(vec!["/a".to_string(), "/b".to_string()]);

        let right = KeyEvent::new(KeyCode::Right, KeyModifiers::NONE);
        let left = KeyEvent::new(KeyCode::Left, KeyModifiers::NONE);
        form.input(right);
        assert_eq!(form.value("bidsDirectory"), Some("/a".to_string()));
        form.input(right);
        form.input(right);
        assert_eq!(form.value("bidsDirectory"), Some("/a".to_string()));
        form.input(left);
        assert_eq!(form.value("bidsDirectory"), Some("/b".to_string()));
    }

    #[test]
    fn window_follows_the_focus() {
        let mut form = form();
        assert_eq!(form.offset(1), 0);
        form.focus_next();
        assert_eq!(form.offset(1), 1);
        assert_eq!(form.offset(2), 0);
    }
}
