use chrono::{DateTime, NaiveDate, NaiveDateTime};

pub const DEFAULT_CURRENCY: &str = "BRL";

/// Group the integer digits with `.` the way pt-BR does: 1234567 -> 1.234.567
fn group_thousands(int_part: &str) -> String {
    let mut with_dots = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_dots.push('.');
        }
        with_dots.push(c);
    }
    with_dots.chars().rev().collect()
}

fn currency_symbol(code: &str) -> String {
    match code.to_ascii_uppercase().as_str() {
        "BRL" => "R$".to_string(),
        "USD" => "US$".to_string(),
        "EUR" => "€".to_string(),
        "GBP" => "£".to_string(),
        "JPY" => "JP¥".to_string(),
        other => other.to_string(),
    }
}

/// Format an amount in pt-BR currency style: R$ 1.234,56
pub fn money(val: f64, currency: &str) -> String {
    let negative = val < 0.0;
    let abs = val.abs();
    let cents = format!("{:.2}", abs);
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));
    let symbol = currency_symbol(currency);
    let grouped = group_thousands(int_part);

    if negative {
        format!("-{symbol} {grouped},{dec_part}")
    } else {
        format!("{symbol} {grouped},{dec_part}")
    }
}

/// Integer count with pt-BR grouping.
pub fn number(val: u64) -> String {
    group_thousands(&val.to_string())
}

/// Render a number the way a JavaScript `toString()` would: integral values
/// lose the fractional part, everything else keeps its shortest form.
pub fn plain_number(val: f64) -> String {
    if val.is_finite() && val.fract() == 0.0 && val.abs() < 1e21 {
        format!("{}", val as i128)
    } else {
        format!("{val}")
    }
}

/// Parse the date portion of an API timestamp without any timezone shift.
pub fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local().date());
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, pattern) {
            return Some(dt.date());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// pt-BR calendar date: 01/06/2024
pub fn date_br(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// ISO calendar date used in filenames and query parameters: 2024-06-01
pub fn iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
