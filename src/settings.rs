use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{CarteiraError, Result};
use crate::fmt::DEFAULT_CURRENCY;

pub const CONFIG_DIR_ENV: &str = "CARTEIRA_CONFIG_DIR";
pub const API_URL_ENV: &str = "CARTEIRA_API_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub export_dir: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_page_size() -> u32 {
    20
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            page_size: default_page_size(),
            currency: default_currency(),
            export_dir: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Settings {
    /// Directory CSV exports are written to. Falls back to the user's download
    /// folder, then the working directory.
    pub fn export_path(&self) -> PathBuf {
        if !self.export_dir.is_empty() {
            return PathBuf::from(shellexpand_path(&self.export_dir));
        }
        dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Effective API base URL with any trailing slash removed.
    pub fn base_url(&self) -> String {
        let url = std::env::var(API_URL_ENV)
            .ok()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| self.api_url.clone());
        url.trim_end_matches('/').to_string()
    }
}

pub fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("carteira")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("ignoring unreadable settings at {}: {e}", path.display());
                Settings::default()
            }
        }
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| CarteiraError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn settings_file_exists() -> bool {
    settings_path().exists()
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            api_url: "https://api.example.com".to_string(),
            page_size: 50,
            currency: "USD".to_string(),
            export_dir: "/tmp/exports".to_string(),
            timeout_secs: 5,
        };
        let json = serde_json::to_string_pretty(&settings).unwrap();
        std::fs::write(&path, &json).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: Settings = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded.api_url, "https://api.example.com");
        assert_eq!(loaded.page_size, 50);
        assert_eq!(loaded.currency, "USD");
        assert_eq!(loaded.timeout_secs, 5);
    }

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.api_url, "http://localhost:8000");
        assert_eq!(s.page_size, 20);
        assert_eq!(s.currency, "BRL");
        assert!(s.export_dir.is_empty());
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"api_url": "http://10.0.0.2:9000/"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.page_size, 20);
        assert_eq!(s.currency, "BRL");
        assert_eq!(s.timeout_secs, 30);
    }

    #[test]
    fn test_export_path_uses_configured_dir() {
        let s = Settings {
            export_dir: "/srv/exports".to_string(),
            ..Settings::default()
        };
        assert_eq!(s.export_path(), PathBuf::from("/srv/exports"));
    }
}
