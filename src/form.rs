use crossterm::event::KeyCode;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::tui::{ERROR_STYLE, FOOTER_STYLE};
use crate::validation::{message_for, FieldError};
use crate::views::{FieldKind, FormField, FormValues};

pub enum FormAction {
    Continue,
    Cancel,
    Submit,
}

/// Add/edit dialog over an entity's form fields.
pub struct EntityForm {
    title: String,
    fields: Vec<FormField>,
    values: FormValues,
    focused: usize,
    errors: Vec<FieldError>,
    /// Id of the record being edited; `None` when adding.
    editing: Option<i64>,
    saving: bool,
}

impl EntityForm {
    pub fn new(title: String, fields: Vec<FormField>, values: FormValues, editing: Option<i64>) -> Self {
        Self {
            title,
            fields,
            values,
            focused: 0,
            errors: Vec::new(),
            editing,
            saving: false,
        }
    }

    pub fn values(&self) -> &FormValues {
        &self.values
    }

    pub fn editing(&self) -> Option<i64> {
        self.editing
    }

    pub fn set_saving(&mut self, saving: bool) {
        self.saving = saving;
    }

    pub fn set_errors(&mut self, errors: Vec<FieldError>) {
        if let Some(idx) = errors
            .first()
            .and_then(|e| self.fields.iter().position(|f| f.key == e.field))
        {
            self.focused = idx;
        }
        self.errors = errors;
    }

    fn current(&self) -> Option<&FormField> {
        self.fields.get(self.focused)
    }

    fn value_mut(&mut self) -> Option<&mut String> {
        let key = self.current()?.key;
        Some(self.values.entry(key).or_default())
    }

    fn cycle_choice(&mut self, forward: bool) {
        let Some(field) = self.current().copied() else {
            return;
        };
        match field.kind {
            FieldKind::Choice(options) if !options.is_empty() => {
                let value = self.values.entry(field.key).or_default();
                let idx = options.iter().position(|o| *o == value.as_str()).unwrap_or(0);
                let next = if forward {
                    (idx + 1) % options.len()
                } else if idx == 0 {
                    options.len() - 1
                } else {
                    idx - 1
                };
                *value = options[next].to_string();
            }
            FieldKind::Toggle => {
                let value = self.values.entry(field.key).or_default();
                *value = if value.as_str() == "true" { "false" } else { "true" }.to_string();
            }
            _ => {}
        }
    }

    pub fn handle_key(&mut self, code: KeyCode) -> FormAction {
        if self.saving {
            return FormAction::Continue;
        }
        if self.fields.is_empty() {
            return FormAction::Cancel;
        }

        match code {
            KeyCode::Esc => return FormAction::Cancel,
            KeyCode::Enter => return FormAction::Submit,
            KeyCode::Tab | KeyCode::Down => {
                self.focused = (self.focused + 1) % self.fields.len();
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.focused = if self.focused == 0 {
                    self.fields.len() - 1
                } else {
                    self.focused - 1
                };
            }
            KeyCode::Left => self.cycle_choice(false),
            KeyCode::Right => self.cycle_choice(true),
            KeyCode::Char(' ')
                if matches!(
                    self.current().map(|f| f.kind),
                    Some(FieldKind::Toggle | FieldKind::Choice(_))
                ) =>
            {
                self.cycle_choice(true);
            }
            KeyCode::Char(c) => {
                let kind = self.current().map(|f| f.kind);
                let accepted = match kind {
                    Some(FieldKind::Text) => Some(c),
                    Some(FieldKind::Upper) => Some(c.to_ascii_uppercase()),
                    Some(FieldKind::Number) => {
                        (c.is_ascii_digit() || matches!(c, '.' | ',' | '-')).then_some(c)
                    }
                    Some(FieldKind::Integer) => c.is_ascii_digit().then_some(c),
                    Some(FieldKind::Date) => (c.is_ascii_digit() || c == '-').then_some(c),
                    _ => None,
                };
                if let (Some(c), Some(value)) = (accepted, self.value_mut()) {
                    value.push(c);
                }
            }
            KeyCode::Backspace => {
                let editable = !matches!(
                    self.current().map(|f| f.kind),
                    Some(FieldKind::Toggle | FieldKind::Choice(_))
                );
                if editable {
                    if let Some(value) = self.value_mut() {
                        value.pop();
                    }
                }
            }
            _ => {}
        }
        FormAction::Continue
    }

    pub fn draw(&self, frame: &mut Frame, area: Rect) {
        let label_width = self
            .fields
            .iter()
            .map(|f| f.label.chars().count())
            .max()
            .unwrap_or(0)
            + 2;

        let mut lines = vec![Line::from("")];
        for (i, field) in self.fields.iter().enumerate() {
            let is_focused = i == self.focused;
            let label_style = if is_focused {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let value_style = if is_focused {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default()
            };
            let value = self.values.get(field.key).map(String::as_str).unwrap_or("");
            let shown = match field.kind {
                FieldKind::Toggle => {
                    let on = if value == "true" { "[x] sim" } else { "[ ] não" };
                    on.to_string()
                }
                FieldKind::Choice(_) if is_focused => format!("< {value} >"),
                _ if is_focused => format!("{value}_"),
                _ => value.to_string(),
            };
            lines.push(Line::from(vec![
                Span::styled(format!("  {:<label_width$}", field.label), label_style),
                Span::styled(shown, value_style),
            ]));
            if let Some(msg) = message_for(&self.errors, field.key) {
                lines.push(Line::from(Span::styled(
                    format!("  {:<label_width$}{msg}", ""),
                    ERROR_STYLE,
                )));
            }
        }

        lines.push(Line::from(""));
        let hint = if self.saving {
            "  Salvando..."
        } else {
            "  Tab=próximo campo  Enter=salvar  Esc=cancelar"
        };
        lines.push(Line::from(Span::styled(hint, FOOTER_STYLE)));

        let height = (lines.len() as u16 + 2).min(area.height);
        let width = area.width.min(72);
        let popup = Rect {
            x: area.x + (area.width - width) / 2,
            y: area.y + (area.height - height) / 2,
            width,
            height,
        };
        frame.render_widget(Clear, popup);
        frame.render_widget(
            Paragraph::new(lines).block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!(" {} ", self.title)),
            ),
            popup,
        );
    }
}
