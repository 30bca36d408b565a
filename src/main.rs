mod api;
mod browser;
mod cli;
mod error;
mod export;
mod filters;
mod fmt;
mod form;
mod models;
mod query;
mod session;
mod settings;
mod table;
mod tui;
mod validation;
mod views;

use std::io;

use clap::{CommandFactory, Parser};
use env_logger::{Builder, Env};

use cli::{Cli, Commands, ConfigCommands, ReportCommands};
use models::{Allocation, Transaction};

fn init_logging(verbose: u8, interactive: bool) {
    // The browser owns the terminal; only errors may reach stderr there.
    let level = match (interactive, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    };
    Builder::from_env(Env::default().default_filter_or(level)).init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, matches!(cli.command, Commands::Browse { .. }));
    let settings = settings::load_settings();

    let result = match cli.command {
        Commands::Login { email } => cli::auth::login(&settings, &email),
        Commands::Register { name, email } => cli::auth::register(&settings, &name, &email),
        Commands::Logout => cli::auth::logout(),
        Commands::Whoami => cli::auth::whoami(&settings),
        Commands::Config { command } => match command {
            ConfigCommands::Show => cli::config::show(&settings),
            ConfigCommands::Set { key, value } => cli::config::set(&key, &value),
        },
        Commands::Clients { command } => cli::clients::run(&settings, command),
        Commands::Assets { command } => cli::assets::run(&settings, command),
        Commands::Allocations { command } => cli::entity::run::<Allocation>(&settings, command),
        Commands::Transactions { command } => cli::entity::run::<Transaction>(&settings, command),
        Commands::Browse { entity, filters } => cli::browse::run(&settings, entity, &filters),
        Commands::Report { command } => match command {
            ReportCommands::Captation { from, to, client } => {
                cli::report::captation(&settings, from, to, client)
            }
            ReportCommands::Allocations => cli::report::allocations(&settings),
            ReportCommands::Overview => cli::report::overview(&settings),
        },
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "carteira", &mut io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
