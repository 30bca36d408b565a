use comfy_table::{Cell, Table};

use crate::error::{CarteiraError, Result};
use crate::settings::{config_dir, load_settings, save_settings, settings_file_exists, Settings};

pub fn show(settings: &Settings) -> Result<()> {
    let mut table = Table::new();
    table.set_header(vec!["Setting", "Value"]);
    table.add_row(vec![Cell::new("api_url"), Cell::new(settings.base_url())]);
    table.add_row(vec![Cell::new("page_size"), Cell::new(settings.page_size)]);
    table.add_row(vec![Cell::new("currency"), Cell::new(&settings.currency)]);
    table.add_row(vec![
        Cell::new("export_dir"),
        Cell::new(settings.export_path().display()),
    ]);
    table.add_row(vec![Cell::new("timeout_secs"), Cell::new(settings.timeout_secs)]);
    println!("Settings\n{table}");

    let dir = config_dir();
    if settings_file_exists() {
        println!("Config dir: {}", dir.display());
    } else {
        println!("Config dir: {} (no settings file, using defaults)", dir.display());
    }
    Ok(())
}

fn parse_number<N: std::str::FromStr>(key: &str, value: &str) -> Result<N> {
    value
        .trim()
        .parse()
        .map_err(|_| CarteiraError::Settings(format!("{key} must be a positive number, got '{value}'")))
}

/// Change one setting in place.
pub fn apply_setting(settings: &mut Settings, key: &str, value: &str) -> Result<()> {
    match key {
        "api_url" => {
            let url = value.trim();
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(CarteiraError::Settings(format!(
                    "api_url must start with http:// or https://, got '{url}'"
                )));
            }
            settings.api_url = url.trim_end_matches('/').to_string();
        }
        "page_size" => {
            let size: u32 = parse_number(key, value)?;
            if size == 0 {
                return Err(CarteiraError::Settings("page_size must be at least 1".to_string()));
            }
            settings.page_size = size;
        }
        "currency" => settings.currency = value.trim().to_uppercase(),
        "export_dir" => settings.export_dir = value.trim().to_string(),
        "timeout_secs" => settings.timeout_secs = parse_number(key, value)?,
        other => {
            return Err(CarteiraError::Settings(format!(
                "unknown setting '{other}' (expected api_url, page_size, currency, export_dir or timeout_secs)"
            )))
        }
    }
    Ok(())
}

pub fn set(key: &str, value: &str) -> Result<()> {
    let mut settings = load_settings();
    apply_setting(&mut settings, key, value)?;
    save_settings(&settings)?;
    println!("Set {key}.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_setting() {
        let mut s = Settings::default();
        apply_setting(&mut s, "api_url", "https://api.example.com/").unwrap();
        apply_setting(&mut s, "page_size", "50").unwrap();
        apply_setting(&mut s, "currency", "usd").unwrap();
        assert_eq!(s.api_url, "https://api.example.com");
        assert_eq!(s.page_size, 50);
        assert_eq!(s.currency, "USD");
    }

    #[test]
    fn test_apply_setting_rejects_bad_values() {
        let mut s = Settings::default();
        assert!(apply_setting(&mut s, "page_size", "0").is_err());
        assert!(apply_setting(&mut s, "timeout_secs", "soon").is_err());
        assert!(apply_setting(&mut s, "api_url", "localhost:8000").is_err());
        assert!(apply_setting(&mut s, "theme", "dark").is_err());
        assert_eq!(s.page_size, 20);
    }
}
