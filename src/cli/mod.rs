pub mod assets;
pub mod auth;
pub mod browse;
pub mod clients;
pub mod config;
pub mod entity;
pub mod report;

use std::str::FromStr;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;

use crate::api::ApiClient;
use crate::error::{CarteiraError, Result};
use crate::filters::{DateRange, FilterState, StatusFilter};
use crate::models::TransactionType;
use crate::session::{FileTokenStore, Session};
use crate::settings::Settings;
use crate::views::{Entity, FilterCaps, LOAD_FAILED};

#[derive(Parser)]
#[command(
    name = "carteira",
    version,
    about = "Back-office console for investment clients, assets, allocations and cash movements."
)]
pub struct Cli {
    /// More log output on stderr (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in to the API and store the session token.
    Login {
        /// Account email
        #[arg(long)]
        email: String,
    },
    /// Create an account on the API.
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
    /// Forget the stored session token.
    Logout,
    /// Show the logged-in user.
    Whoami,
    /// Show or change settings.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Manage clients.
    Clients {
        #[command(subcommand)]
        command: ClientsCommands,
    },
    /// Manage financial assets.
    Assets {
        #[command(subcommand)]
        command: AssetsCommands,
    },
    /// Manage allocations of assets to clients.
    Allocations {
        #[command(subcommand)]
        command: EntityCommands,
    },
    /// Manage deposits and withdrawals.
    Transactions {
        #[command(subcommand)]
        command: EntityCommands,
    },
    /// Interactively browse a list.
    Browse {
        entity: Entity,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Generate reports.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Print shell completions.
    Completions {
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective settings.
    Show,
    /// Change one setting: api_url, page_size, currency, export_dir, timeout_secs.
    Set { key: String, value: String },
}

/// Commands every entity offers.
#[derive(Subcommand)]
pub enum EntityCommands {
    /// List one page of records.
    List(ListArgs),
    /// Show one record.
    Show { id: i64 },
    /// Create a record from FIELD=VALUE pairs.
    Add {
        #[arg(value_name = "FIELD=VALUE")]
        fields: Vec<String>,
    },
    /// Change fields of a record with FIELD=VALUE pairs.
    Update {
        id: i64,
        #[arg(value_name = "FIELD=VALUE", required = true)]
        fields: Vec<String>,
    },
    /// Delete a record.
    Delete {
        id: i64,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Export every matching record to CSV.
    Export(FilterArgs),
}

#[derive(Subcommand)]
pub enum ClientsCommands {
    #[command(flatten)]
    Common(EntityCommands),
    /// Flip a client between active and inactive.
    Toggle { id: i64 },
}

#[derive(Subcommand)]
pub enum AssetsCommands {
    #[command(flatten)]
    Common(EntityCommands),
    /// Search Yahoo Finance for tickers.
    YahooSearch { query: String },
    /// Register an asset from its Yahoo Finance ticker.
    YahooSave { ticker: String },
    /// Refresh market prices of every asset.
    UpdatePrices,
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Deposits, withdrawals and net captation, overall and per client.
    Captation {
        /// Start date: YYYY-MM-DD
        #[arg(long)]
        from: Option<NaiveDate>,
        /// End date: YYYY-MM-DD
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Only this client
        #[arg(long)]
        client: Option<i64>,
    },
    /// Total allocated value.
    Allocations,
    /// Headline numbers: captation, clients, allocated value.
    Overview,
}

/// Filter flags shared by list, export and browse.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Free-text search
    #[arg(long, short)]
    pub search: Option<String>,
    /// active, inactive or all
    #[arg(long)]
    pub status: Option<StatusFilter>,
    /// deposit, withdrawal or all
    #[arg(long = "type")]
    pub kind: Option<String>,
    /// Client ID
    #[arg(long)]
    pub client: Option<i64>,
    /// Asset ID
    #[arg(long)]
    pub asset: Option<i64>,
    #[arg(long)]
    pub exchange: Option<String>,
    #[arg(long)]
    pub currency: Option<String>,
    /// Start date: YYYY-MM-DD
    #[arg(long)]
    pub from: Option<NaiveDate>,
    /// End date: YYYY-MM-DD
    #[arg(long)]
    pub to: Option<NaiveDate>,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    #[command(flatten)]
    pub filters: FilterArgs,
    #[arg(long, default_value_t = 1)]
    pub page: u32,
    /// Page size (default from settings)
    #[arg(long)]
    pub size: Option<u32>,
    /// Also write the page to CSV
    #[arg(long)]
    pub export: bool,
}

impl FilterArgs {
    /// Filter state for a view, rejecting flags the view does not offer.
    pub fn to_filters(&self, caps: FilterCaps, view: &str) -> Result<FilterState> {
        let unsupported =
            |flag: &str| CarteiraError::Other(format!("{view} cannot be filtered by --{flag}"));
        let mut filters = FilterState::new();

        if let Some(ref search) = self.search {
            filters.set_search(search.trim());
        }
        if let Some(status) = self.status {
            if !caps.status {
                return Err(unsupported("status"));
            }
            filters.set_status(status);
        }
        if let Some(ref kind) = self.kind {
            if !caps.kind {
                return Err(unsupported("type"));
            }
            let kind = kind.trim().to_lowercase();
            if kind != "all" {
                TransactionType::from_str(&kind).map_err(CarteiraError::Other)?;
            }
            filters.set_type(kind);
        }
        if let Some(id) = self.client {
            if !caps.client {
                return Err(unsupported("client"));
            }
            filters.set_client_id(Some(id));
        }
        if let Some(id) = self.asset {
            if !caps.asset {
                return Err(unsupported("asset"));
            }
            filters.set_asset_id(Some(id));
        }
        if let Some(ref exchange) = self.exchange {
            if !caps.exchange {
                return Err(unsupported("exchange"));
            }
            filters.set_exchange(Some(exchange.clone()));
        }
        if let Some(ref currency) = self.currency {
            if !caps.currency {
                return Err(unsupported("currency"));
            }
            filters.set_currency(Some(currency.to_uppercase()));
        }
        if self.from.is_some() || self.to.is_some() {
            if !caps.date_range {
                return Err(unsupported("from/--to"));
            }
            filters.set_date_range(Some(date_range(self.from, self.to)?));
        }
        Ok(filters)
    }
}

pub(crate) fn date_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<DateRange> {
    if let (Some(f), Some(t)) = (from, to) {
        if f > t {
            return Err(CarteiraError::Other(format!("--from {f} is after --to {t}")));
        }
    }
    Ok(DateRange::from_dates(from, to))
}

pub(crate) fn open_session() -> Result<Session<FileTokenStore>> {
    let mut session = Session::new(FileTokenStore::in_config_dir());
    session.restore()?;
    Ok(session)
}

/// API client carrying the stored bearer token.
pub(crate) fn authed_api(settings: &Settings) -> Result<ApiClient> {
    let session = open_session()?;
    let token = session.token().ok_or(CarteiraError::NotAuthenticated)?;
    let api = ApiClient::from_settings(settings).map_err(failure(LOAD_FAILED))?;
    Ok(api.with_token(Some(token)))
}

/// Turn a remote or transport failure into its notification text.
pub(crate) fn failure(fallback: &'static str) -> impl Fn(CarteiraError) -> CarteiraError {
    move |e| match e {
        CarteiraError::Remote { .. } | CarteiraError::Http(_) => {
            log::debug!("{fallback}: {e}");
            CarteiraError::Other(e.user_message(fallback))
        }
        other => other,
    }
}

pub(crate) fn toast(message: &str) {
    println!("{}", message.green());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::ParamValue;
    use crate::models::{Asset, Client, Transaction};
    use crate::views::EntityView;

    #[test]
    fn test_flags_become_filter_state() {
        let args = FilterArgs {
            search: Some(" ana ".to_string()),
            kind: Some("Deposit".to_string()),
            client: Some(3),
            from: NaiveDate::from_ymd_opt(2024, 1, 1),
            ..FilterArgs::default()
        };
        let params = args.to_filters(Transaction::FILTERS, "Transações").unwrap().api_params();
        assert_eq!(params.get("search"), Some(&ParamValue::Str("ana".to_string())));
        assert_eq!(params.get("type"), Some(&ParamValue::Str("deposit".to_string())));
        assert_eq!(params.get("client_id"), Some(&ParamValue::Int(3)));
        assert_eq!(params.get("start_date"), Some(&ParamValue::Str("2024-01-01".to_string())));
        assert!(!params.contains_key("end_date"));
    }

    #[test]
    fn test_type_all_is_omitted() {
        let args = FilterArgs {
            kind: Some("all".to_string()),
            ..FilterArgs::default()
        };
        let params = args.to_filters(Transaction::FILTERS, "Transações").unwrap().api_params();
        assert!(!params.contains_key("type"));
    }

    #[test]
    fn test_rejects_filters_a_view_lacks() {
        let args = FilterArgs {
            status: Some(StatusFilter::Active),
            ..FilterArgs::default()
        };
        assert!(args.to_filters(Client::FILTERS, "Clientes").is_ok());
        let err = args.to_filters(Asset::FILTERS, "Ativos").unwrap_err();
        assert_eq!(err.to_string(), "Ativos cannot be filtered by --status");
    }

    #[test]
    fn test_rejects_unknown_type_and_inverted_dates() {
        let args = FilterArgs {
            kind: Some("transfer".to_string()),
            ..FilterArgs::default()
        };
        assert!(args.to_filters(Transaction::FILTERS, "Transações").is_err());
        assert!(date_range(NaiveDate::from_ymd_opt(2024, 2, 1), NaiveDate::from_ymd_opt(2024, 1, 1)).is_err());
    }

    #[test]
    fn test_failure_keeps_validation_errors() {
        let map = failure("Erro ao criar cliente");
        let remote = map(CarteiraError::Remote {
            status: 500,
            detail: None,
        });
        assert_eq!(remote.to_string(), "Erro ao criar cliente");
        let kept = map(CarteiraError::NotAuthenticated);
        assert!(matches!(kept, CarteiraError::NotAuthenticated));
    }

    #[test]
    fn test_cli_parses_nested_commands() {
        let cli = Cli::try_parse_from([
            "carteira", "clients", "list", "--status", "inactive", "--page", "2",
        ])
        .unwrap();
        match cli.command {
            Commands::Clients {
                command: ClientsCommands::Common(EntityCommands::List(args)),
            } => {
                assert_eq!(args.page, 2);
                assert_eq!(args.filters.status, Some(StatusFilter::Inactive));
            }
            _ => panic!("wrong command"),
        }

        let cli = Cli::try_parse_from(["carteira", "clients", "toggle", "7"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Clients {
                command: ClientsCommands::Toggle { id: 7 }
            }
        ));
    }
}
