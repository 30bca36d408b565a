use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    Active,
    Inactive,
    #[default]
    All,
}

impl StatusFilter {
    pub fn label(&self) -> &'static str {
        match self {
            StatusFilter::Active => "Ativo",
            StatusFilter::Inactive => "Inativo",
            StatusFilter::All => "Todos",
        }
    }

    /// Next value in the status selector: all -> active -> inactive -> all.
    pub fn cycle(&self) -> Self {
        match self {
            StatusFilter::All => StatusFilter::Active,
            StatusFilter::Active => StatusFilter::Inactive,
            StatusFilter::Inactive => StatusFilter::All,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(StatusFilter::Active),
            "inactive" => Ok(StatusFilter::Inactive),
            "all" => Ok(StatusFilter::All),
            other => Err(format!("unknown status '{other}' (expected active, inactive or all)")),
        }
    }
}

/// Start/end bounds picked by the user. Either side may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateRange {
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
}

impl DateRange {
    /// Range over whole calendar days, each bound at midnight.
    pub fn from_dates(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self {
            from: from.and_then(|d| d.and_hms_opt(0, 0, 0)),
            to: to.and_then(|d| d.and_hms_opt(0, 0, 0)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }
}

/// A single query parameter value as sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Str(s) => f.write_str(s),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Query parameters derived from a [`FilterState`], keyed by the remote
/// contract's field names. Iteration order is stable (sorted by key).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApiParams(BTreeMap<&'static str, ParamValue>);

impl ApiParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &'static str, value: ParamValue) {
        self.0.insert(key, value);
    }

    /// Copy with server-side pagination appended.
    pub fn with_page(&self, page: u32, size: u32) -> Self {
        let mut params = self.clone();
        params.insert("page", ParamValue::Int(i64::from(page)));
        params.insert("size", ParamValue::Int(i64::from(size)));
        params
    }

    pub fn to_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

impl fmt::Display for ApiParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.0.iter().map(|(k, v)| format!("{k}={v}")).collect();
        f.write_str(&joined.join("&"))
    }
}

/// Filter criteria owned by exactly one list view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    pub search: String,
    pub status: StatusFilter,
    pub kind: Option<String>,
    pub client_id: Option<i64>,
    pub asset_id: Option<i64>,
    pub exchange: Option<String>,
    pub currency: Option<String>,
    pub date_range: Option<DateRange>,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            search: String::new(),
            status: StatusFilter::All,
            kind: None,
            client_id: None,
            asset_id: None,
            exchange: None,
            currency: None,
            date_range: None,
        }
    }
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.search = search.into();
    }

    pub fn set_status(&mut self, status: StatusFilter) {
        self.status = status;
    }

    pub fn set_type(&mut self, kind: impl Into<String>) {
        self.kind = Some(kind.into());
    }

    pub fn set_client_id(&mut self, client_id: Option<i64>) {
        self.client_id = client_id;
    }

    pub fn set_asset_id(&mut self, asset_id: Option<i64>) {
        self.asset_id = asset_id;
    }

    pub fn set_exchange(&mut self, exchange: Option<String>) {
        self.exchange = exchange;
    }

    pub fn set_currency(&mut self, currency: Option<String>) {
        self.currency = currency;
    }

    pub fn set_date_range(&mut self, range: Option<DateRange>) {
        self.date_range = range;
    }

    /// Back to `{search: "", status: all}` with every optional field unset.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    pub fn api_params(&self) -> ApiParams {
        let mut params = ApiParams::new();

        if !self.search.is_empty() {
            params.insert("search", ParamValue::Str(self.search.clone()));
        }

        if self.status != StatusFilter::All {
            params.insert("is_active", ParamValue::Bool(self.status == StatusFilter::Active));
        }

        if let Some(kind) = self.kind.as_deref().filter(|k| *k != "all") {
            params.insert("type", ParamValue::Str(kind.to_string()));
        }

        if let Some(id) = self.client_id {
            params.insert("client_id", ParamValue::Int(id));
        }

        if let Some(id) = self.asset_id {
            params.insert("asset_id", ParamValue::Int(id));
        }

        if let Some(ref exchange) = self.exchange {
            params.insert("exchange", ParamValue::Str(exchange.clone()));
        }

        if let Some(ref currency) = self.currency {
            params.insert("currency", ParamValue::Str(currency.clone()));
        }

        if let Some(range) = self.date_range {
            if let Some(from) = range.from {
                params.insert("start_date", ParamValue::Str(calendar_date(from)));
            }
            if let Some(to) = range.to {
                params.insert("end_date", ParamValue::Str(calendar_date(to)));
            }
        }

        params
    }

    /// Short summary of the active criteria for status lines.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.search.is_empty() {
            parts.push(format!("busca: {}", self.search));
        }
        if self.status != StatusFilter::All {
            parts.push(format!("status: {}", self.status.label()));
        }
        if let Some(kind) = self.kind.as_deref().filter(|k| *k != "all") {
            parts.push(format!("tipo: {kind}"));
        }
        if let Some(id) = self.client_id {
            parts.push(format!("cliente: #{id}"));
        }
        if let Some(id) = self.asset_id {
            parts.push(format!("ativo: #{id}"));
        }
        if let Some(ref exchange) = self.exchange {
            parts.push(format!("bolsa: {exchange}"));
        }
        if let Some(ref currency) = self.currency {
            parts.push(format!("moeda: {currency}"));
        }
        if let Some(range) = self.date_range {
            let from = range.from.map(calendar_date).unwrap_or_else(|| "…".to_string());
            let to = range.to.map(calendar_date).unwrap_or_else(|| "…".to_string());
            parts.push(format!("período: {from} a {to}"));
        }
        parts.join(", ")
    }
}

/// Date part only, taken as stored. No timezone conversion.
fn calendar_date(dt: NaiveDateTime) -> String {
    dt.date().format("%Y-%m-%d").to_string()
}
