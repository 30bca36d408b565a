pub mod allocations;
pub mod assets;
pub mod clients;
pub mod transactions;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::Local;

use crate::api::{ApiClient, Resource};
use crate::error::{CarteiraError, Result};
use crate::export::CsvHeader;
use crate::fmt::iso_date;
use crate::table::{Column, DataTable, Toolbar};
use crate::validation::{FieldError, Validate};

pub const EXPORTED: &str = "Dados exportados com sucesso!";
pub const LOAD_FAILED: &str = "Erro ao carregar dados";

/// Which filter controls a view offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterCaps {
    pub status: bool,
    pub kind: bool,
    pub client: bool,
    pub asset: bool,
    pub exchange: bool,
    pub currency: bool,
    pub date_range: bool,
}

/// Notification texts for flipping a record's active flag.
#[derive(Debug, Clone, Copy)]
pub struct StatusToggle {
    pub success: &'static str,
    pub failure: &'static str,
}

/// Notification texts for one entity.
#[derive(Debug, Clone, Copy)]
pub struct Messages {
    pub created: &'static str,
    pub create_failed: &'static str,
    pub updated: &'static str,
    pub update_failed: &'static str,
    pub deleted: &'static str,
    pub delete_failed: &'static str,
    pub confirm_delete: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    /// Uppercased as it is typed.
    Upper,
    Number,
    Integer,
    /// `YYYY-MM-DD`, today when left empty on a new record.
    Date,
    Toggle,
    Choice(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormField {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub default: &'static str,
}

impl FormField {
    pub const fn new(key: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            key,
            label,
            kind,
            default: "",
        }
    }

    pub const fn with_default(mut self, default: &'static str) -> Self {
        self.default = default;
        self
    }
}

/// Raw form input keyed by field.
pub type FormValues = BTreeMap<&'static str, String>;

/// One entity list view. Implemented on the entity type itself.
pub trait EntityView: Resource + Sized {
    const TITLE: &'static str;
    const SEARCH_PLACEHOLDER: &'static str;
    const EXPORT_NAME: &'static str;
    const FILTERS: FilterCaps;
    /// Label of the date-range filter.
    const DATE_RANGE_LABEL: &'static str = "Selecionar período";
    const MESSAGES: Messages;
    /// Set for entities whose active flag can be flipped remotely.
    const STATUS_TOGGLE: Option<StatusToggle> = None;

    fn columns() -> Vec<Column>;

    fn export_headers() -> Vec<CsvHeader>;

    /// Hook for per-column overrides.
    fn decorate(table: DataTable<Self>, _currency: &str) -> DataTable<Self> {
        table
    }

    fn table(currency: &str) -> DataTable<Self> {
        let table = DataTable::new(Self::TITLE, Self::columns())
            .with_currency(currency)
            .with_toolbar(Toolbar {
                refresh: true,
                add: true,
                export: true,
            })
            .with_actions(|row: &Self| format!("#{}", row.id()));
        Self::decorate(table, currency)
    }

    fn form_fields() -> Vec<FormField>;

    /// Current values of an existing record, for editing.
    fn form_values(&self) -> FormValues;

    fn create_payload(values: &FormValues) -> Result<Self::Create>;

    fn update_payload(values: &FormValues) -> Result<Self::Update>;

    /// One-line description used in confirmations.
    fn summary(&self) -> String;

    /// Flip the active flag of record `id`. Only called when
    /// [`EntityView::STATUS_TOGGLE`] is set.
    fn toggle_active(_api: &ApiClient, _id: i64) -> Result<()> {
        Err(CarteiraError::Other(format!("{} cannot be toggled", Self::TITLE)))
    }

    /// Choices for the exchange filter, taken from the rows on screen.
    fn exchange_options(_items: &[Self]) -> Vec<String> {
        Vec::new()
    }

    /// Choices for the currency filter, taken from the rows on screen.
    fn currency_options(_items: &[Self]) -> Vec<String> {
        Vec::new()
    }
}

/// Defaults for a blank form: declared defaults, today for dates.
pub fn blank_form<V: EntityView>() -> FormValues {
    let today = iso_date(Local::now().date_naive());
    V::form_fields()
        .into_iter()
        .map(|f| {
            let value = match f.kind {
                FieldKind::Date if f.default.is_empty() => today.clone(),
                _ => f.default.to_string(),
            };
            (f.key, value)
        })
        .collect()
}

/// Reads typed values out of a form, collecting parse failures per field.
pub(crate) struct FormReader<'a> {
    values: &'a FormValues,
    errors: Vec<FieldError>,
}

impl<'a> FormReader<'a> {
    pub(crate) fn new(values: &'a FormValues) -> Self {
        Self {
            values,
            errors: Vec::new(),
        }
    }

    fn raw(&self, key: &str) -> &str {
        self.values.get(key).map(|s| s.trim()).unwrap_or("")
    }

    pub(crate) fn text(&self, key: &str) -> String {
        self.raw(key).to_string()
    }

    pub(crate) fn opt_text(&self, key: &str) -> Option<String> {
        Some(self.text(key)).filter(|s| !s.is_empty())
    }

    pub(crate) fn flag(&self, key: &str) -> bool {
        matches!(self.raw(key), "true" | "sim" | "s" | "1" | "yes")
    }

    fn parsed<T: FromStr + Default>(&mut self, field: &'static str, required: bool) -> Option<T> {
        let raw = self.raw(field).replace(',', ".");
        if raw.is_empty() {
            return if required { Some(T::default()) } else { None };
        }
        match raw.parse::<T>() {
            Ok(v) => Some(v),
            Err(_) => {
                self.errors.push(FieldError::new(field, "Informe um número válido"));
                Some(T::default())
            }
        }
    }

    /// Empty input reads as zero so the range rules report it.
    pub(crate) fn number(&mut self, field: &'static str) -> f64 {
        self.parsed(field, true).unwrap_or_default()
    }

    pub(crate) fn opt_number(&mut self, field: &'static str) -> Option<f64> {
        self.parsed(field, false)
    }

    pub(crate) fn integer(&mut self, field: &'static str) -> i64 {
        self.parsed(field, true).unwrap_or_default()
    }

    pub(crate) fn choice<T: FromStr>(&mut self, field: &'static str, message: &str) -> Option<T> {
        match self.raw(field).parse::<T>() {
            Ok(v) => Some(v),
            Err(_) => {
                self.errors.push(FieldError::new(field, message));
                None
            }
        }
    }

    /// Run the payload's own rules and merge them with the parse failures.
    /// A parse failure wins over a rule failure on the same field.
    pub(crate) fn finish<P: Validate>(self, payload: P) -> Result<P> {
        let mut errors = self.errors;
        if let Err(CarteiraError::Validation(rule_errors)) = payload.validate() {
            for e in rule_errors {
                if !errors.iter().any(|p| p.field == e.field) {
                    errors.push(e);
                }
            }
        }
        if errors.is_empty() {
            Ok(payload)
        } else {
            Err(CarteiraError::Validation(errors))
        }
    }
}

/// The four entity views, for command-line selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Entity {
    Clients,
    Assets,
    Allocations,
    Transactions,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::Clients => "clients",
            Entity::Assets => "assets",
            Entity::Allocations => "allocations",
            Entity::Transactions => "transactions",
        };
        f.write_str(name)
    }
}
