use thiserror::Error;

use crate::validation::{format_field_errors, FieldError};

#[derive(Error, Debug)]
pub enum CarteiraError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{}", remote_message(.status, .detail))]
    Remote { status: u16, detail: Option<String> },

    #[error("Not logged in. Run `carteira login` first.")]
    NotAuthenticated,

    #[error("Validation failed:\n{}", format_field_errors(.0))]
    Validation(Vec<FieldError>),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

fn remote_message(status: &u16, detail: &Option<String>) -> String {
    match detail {
        Some(d) => format!("{d} (HTTP {status})"),
        None => format!("Remote request failed (HTTP {status})"),
    }
}

impl CarteiraError {
    /// Message for a transient notification: the server's own detail when it
    /// sent one, otherwise the caller's localized fallback.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            CarteiraError::Remote {
                detail: Some(d), ..
            } => d.clone(),
            CarteiraError::Remote { detail: None, .. } | CarteiraError::Http(_) => {
                fallback.to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, CarteiraError::Remote { status: 401, .. })
    }
}

pub type Result<T> = std::result::Result<T, CarteiraError>;
