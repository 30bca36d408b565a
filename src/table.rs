use std::collections::HashMap;

use chrono::{DateTime, NaiveDate};
use serde_json::Value;

use crate::fmt::{date_br, money, parse_calendar_date, plain_number, DEFAULT_CURRENCY};
use crate::models::Record;

pub const PLACEHOLDER: &str = "-";
pub const EMPTY_MESSAGE: &str = "Nenhum registro encontrado";
pub const LOADING_MESSAGE: &str = "Carregando...";
pub const ACTIONS_LABEL: &str = "Ações";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Dot path into the serialized row, e.g. `client.name`.
    pub key: &'static str,
    pub label: &'static str,
    pub sortable: bool,
}

impl Column {
    pub const fn new(key: &'static str, label: &'static str, sortable: bool) -> Self {
        Self {
            key,
            label,
            sortable,
        }
    }
}

/// Walk a dot-separated path. Stops at the first missing or null segment.
pub fn resolve_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i))?,
            _ => return None,
        };
        if current.is_null() {
            return None;
        }
    }
    Some(current)
}

/// String form of a JSON value, `None` for null.
pub fn coerce_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(match n.as_i64() {
            Some(i) => i.to_string(),
            None => plain_number(n.as_f64().unwrap_or(0.0)),
        }),
        Value::Array(items) => Some(
            items
                .iter()
                .map(|v| coerce_to_string(v).unwrap_or_default())
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Object(_) => Some(value.to_string()),
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn calendar_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::String(s) => parse_calendar_date(s),
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| dt.date_naive()),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStyle {
    Plain,
    Placeholder,
    Positive,
    Negative,
    Badge { active: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedCell {
    pub text: String,
    pub style: CellStyle,
}

impl RenderedCell {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: CellStyle::Plain,
        }
    }

    pub fn styled(text: impl Into<String>, style: CellStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    pub fn placeholder() -> Self {
        Self::styled(PLACEHOLDER, CellStyle::Placeholder)
    }

    pub fn badge(active: bool) -> Self {
        let label = if active { "Ativo" } else { "Inativo" };
        Self::styled(label, CellStyle::Badge { active })
    }
}

/// Fallback formatting by column key, used when no override has an opinion.
pub fn default_cell(key: &str, value: Option<&Value>, currency: &str) -> RenderedCell {
    if key.contains("date") || key.ends_with("_at") {
        return match value.and_then(calendar_date) {
            Some(d) => RenderedCell::text(date_br(d)),
            None => RenderedCell::placeholder(),
        };
    }

    if key.contains("amount") || key.contains("price") || key.contains("value") {
        let amount = value.and_then(numeric).unwrap_or(0.0);
        return RenderedCell::text(money(amount, currency));
    }

    if key == "is_active" {
        return RenderedCell::badge(matches!(value, Some(Value::Bool(true))));
    }

    match value.and_then(coerce_to_string).filter(|s| !s.is_empty()) {
        Some(s) => RenderedCell::text(s),
        None => RenderedCell::placeholder(),
    }
}

/// Override for one column. `None` means "no opinion, use the default rules";
/// `Some` with empty text is a legitimate empty cell.
pub type CellRenderer<T> = Box<dyn Fn(&T) -> Option<RenderedCell>>;
pub type ActionsRenderer<T> = Box<dyn Fn(&T) -> String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Toolbar {
    pub refresh: bool,
    pub add: bool,
    pub export: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub label: String,
    pub sortable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedRow {
    pub id: i64,
    pub cells: Vec<RenderedCell>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableBody {
    Rows(Vec<RenderedRow>),
    /// One placeholder row spanning every column, actions included.
    Empty { colspan: usize, message: &'static str },
}

/// Output of one render pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableView {
    pub title: String,
    pub headers: Vec<Header>,
    pub body: TableBody,
    pub is_loading: bool,
    pub toolbar: Toolbar,
}

impl TableView {
    /// Number of body rows, the placeholder row included.
    pub fn row_count(&self) -> usize {
        match &self.body {
            TableBody::Rows(rows) => rows.len(),
            TableBody::Empty { .. } => 1,
        }
    }

    /// comfy-table rendition for one-shot CLI output.
    pub fn to_comfy(&self) -> comfy_table::Table {
        use comfy_table::{Cell, Color, Table};

        let mut table = Table::new();
        table.set_header(self.headers.iter().map(|h| h.label.clone()).collect::<Vec<_>>());

        if self.is_loading {
            let mut row = vec![Cell::new(LOADING_MESSAGE)];
            row.extend((1..self.headers.len()).map(|_| Cell::new("")));
            table.add_row(row);
            return table;
        }

        match &self.body {
            TableBody::Empty { colspan, message } => {
                let mut row = vec![Cell::new(*message).fg(Color::DarkGrey)];
                row.extend((1..*colspan).map(|_| Cell::new("")));
                table.add_row(row);
            }
            TableBody::Rows(rows) => {
                for row in rows {
                    table.add_row(row.cells.iter().map(|c| {
                        let cell = Cell::new(&c.text);
                        match c.style {
                            CellStyle::Plain => cell,
                            CellStyle::Placeholder => cell.fg(Color::DarkGrey),
                            CellStyle::Positive => cell.fg(Color::Green),
                            CellStyle::Negative => cell.fg(Color::Red),
                            CellStyle::Badge { active: true } => cell.fg(Color::Green),
                            CellStyle::Badge { active: false } => cell.fg(Color::Grey),
                        }
                    }));
                }
            }
        }
        table
    }
}

/// Presentation-only table over already-fetched rows. Row order and paging
/// are left to the caller.
pub struct DataTable<T> {
    title: String,
    columns: Vec<Column>,
    renderers: HashMap<&'static str, CellRenderer<T>>,
    actions: Option<ActionsRenderer<T>>,
    toolbar: Toolbar,
    currency: String,
}

impl<T: Record> DataTable<T> {
    pub fn new(title: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            title: title.into(),
            columns,
            renderers: HashMap::new(),
            actions: None,
            toolbar: Toolbar::default(),
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }

    pub fn with_renderer<F>(mut self, key: &'static str, renderer: F) -> Self
    where
        F: Fn(&T) -> Option<RenderedCell> + 'static,
    {
        self.renderers.insert(key, Box::new(renderer));
        self
    }

    pub fn with_actions<F>(mut self, actions: F) -> Self
    where
        F: Fn(&T) -> String + 'static,
    {
        self.actions = Some(Box::new(actions));
        self
    }

    pub fn with_toolbar(mut self, toolbar: Toolbar) -> Self {
        self.toolbar = toolbar;
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn has_actions(&self) -> bool {
        self.actions.is_some()
    }

    /// Columns on screen, the actions column included.
    pub fn span(&self) -> usize {
        self.columns.len() + usize::from(self.has_actions())
    }

    pub fn headers(&self) -> Vec<Header> {
        let mut headers: Vec<Header> = self
            .columns
            .iter()
            .map(|c| Header {
                label: c.label.to_string(),
                sortable: c.sortable,
            })
            .collect();
        if self.has_actions() {
            headers.push(Header {
                label: ACTIONS_LABEL.to_string(),
                sortable: false,
            });
        }
        headers
    }

    pub fn render_cell(&self, row: &T, row_value: &Value, column: &Column) -> RenderedCell {
        if let Some(renderer) = self.renderers.get(column.key) {
            if let Some(cell) = renderer(row) {
                return cell;
            }
        }
        default_cell(column.key, resolve_path(row_value, column.key), &self.currency)
    }

    pub fn render_row(&self, row: &T) -> RenderedRow {
        let value = match serde_json::to_value(row) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("row #{} could not be serialized for display: {e}", row.id());
                Value::Null
            }
        };

        let mut cells: Vec<RenderedCell> = self
            .columns
            .iter()
            .map(|column| self.render_cell(row, &value, column))
            .collect();
        if let Some(ref actions) = self.actions {
            cells.push(RenderedCell::text(actions(row)));
        }

        RenderedRow {
            id: row.id(),
            cells,
        }
    }

    pub fn render(&self, data: &[T], is_loading: bool) -> TableView {
        let body = if data.is_empty() {
            TableBody::Empty {
                colspan: self.span(),
                message: EMPTY_MESSAGE,
            }
        } else {
            TableBody::Rows(data.iter().map(|row| self.render_row(row)).collect())
        };

        TableView {
            title: self.title.clone(),
            headers: self.headers(),
            body,
            is_loading,
            toolbar: self.toolbar,
        }
    }
}
