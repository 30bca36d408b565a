use colored::Colorize;
use comfy_table::{Cell, Color, Table};

use super::{authed_api, date_range, failure};
use crate::error::Result;
use crate::filters::{ApiParams, FilterState};
use crate::fmt::{date_br, money, number, parse_calendar_date, plain_number};
use crate::models::{AllocationSummary, CaptationReport, Client};
use crate::settings::Settings;

const LOAD_FAILED: &str = "Erro ao carregar relatório";

// ---------------------------------------------------------------------------
// Data-fetching wrappers (used by dispatch)
// ---------------------------------------------------------------------------

pub fn captation(
    settings: &Settings,
    from: Option<chrono::NaiveDate>,
    to: Option<chrono::NaiveDate>,
    client: Option<i64>,
) -> Result<()> {
    let mut filters = FilterState::new();
    filters.set_client_id(client);
    if from.is_some() || to.is_some() {
        filters.set_date_range(Some(date_range(from, to)?));
    }
    let api = authed_api(settings)?;
    let report = api
        .captation_report(&filters.api_params())
        .map_err(failure(LOAD_FAILED))?;
    println!("{}", format_captation(&report, &settings.currency));
    Ok(())
}

pub fn allocations(settings: &Settings) -> Result<()> {
    let api = authed_api(settings)?;
    let summary = api.allocation_summary().map_err(failure(LOAD_FAILED))?;
    println!("{}", format_allocations(&summary, &settings.currency));
    Ok(())
}

pub fn overview(settings: &Settings) -> Result<()> {
    let api = authed_api(settings)?;
    let captation = api
        .captation_report(&ApiParams::new())
        .map_err(failure(LOAD_FAILED))?;
    let allocations = api.allocation_summary().map_err(failure(LOAD_FAILED))?;
    let clients = api
        .list::<Client>(&ApiParams::new().with_page(1, 1))
        .map_err(failure(LOAD_FAILED))?;
    println!(
        "{}",
        format_overview(&captation, &allocations, clients.total, &settings.currency)
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Pure formatting functions (report data → String)
// ---------------------------------------------------------------------------

fn signed_cell(value: f64, currency: &str) -> Cell {
    let cell = Cell::new(money(value, currency));
    if value >= 0.0 {
        cell.fg(Color::Green)
    } else {
        cell.fg(Color::Red)
    }
}

fn period(start: Option<&str>, end: Option<&str>) -> Option<String> {
    let show = |raw: Option<&str>| {
        raw.and_then(parse_calendar_date)
            .map(date_br)
            .unwrap_or_else(|| "…".to_string())
    };
    if start.is_none() && end.is_none() {
        return None;
    }
    Some(format!("{} a {}", show(start), show(end)))
}

pub fn format_captation(report: &CaptationReport, currency: &str) -> String {
    let s = &report.summary;
    let mut table = Table::new();
    table.set_header(vec!["", "Valor"]);
    table.add_row(vec![Cell::new("Total Depósitos"), Cell::new(money(s.total_deposits, currency))]);
    table.add_row(vec![Cell::new("Total Saques"), Cell::new(money(s.total_withdrawals, currency))]);
    table.add_row(vec![
        Cell::new("Captação Líquida".bold()),
        signed_cell(s.net_captation, currency),
    ]);

    let mut out = "Relatório de Captação".to_string();
    if let Some(p) = period(s.period_start.as_deref(), s.period_end.as_deref()) {
        out.push_str(&format!(" ({p})"));
    }
    out.push_str(&format!("\n{table}"));

    if !report.clients.is_empty() {
        let mut ctable = Table::new();
        ctable.set_header(vec!["Cliente", "Email", "Depósitos", "Saques", "Líquido"]);
        for c in &report.clients {
            ctable.add_row(vec![
                Cell::new(&c.client_name),
                Cell::new(&c.client_email),
                Cell::new(money(c.total_deposits, currency)),
                Cell::new(money(c.total_withdrawals, currency)),
                signed_cell(c.net_captation, currency),
            ]);
        }
        out.push_str(&format!("\n\nPor cliente\n{ctable}"));
    }
    out
}

pub fn format_allocations(summary: &AllocationSummary, currency: &str) -> String {
    let mut table = Table::new();
    table.set_header(vec!["", "Valor"]);
    table.add_row(vec![
        Cell::new("Valor Total Alocado".bold()),
        Cell::new(money(summary.total_value, currency)),
    ]);
    table.add_row(vec![
        Cell::new("Quantidade Total"),
        Cell::new(plain_number(summary.total_quantity)),
    ]);
    table.add_row(vec![Cell::new("Ativos"), Cell::new(number(summary.assets_count))]);
    table.add_row(vec![Cell::new("Clientes"), Cell::new(number(summary.clients_count))]);
    format!("Alocação Total\n{table}")
}

pub fn format_overview(
    captation: &CaptationReport,
    allocations: &AllocationSummary,
    clients_total: u64,
    currency: &str,
) -> String {
    let mut table = Table::new();
    table.set_header(vec!["", "Valor"]);
    table.add_row(vec![
        Cell::new("Receita Bruta"),
        Cell::new(money(captation.summary.total_deposits, currency)),
    ]);
    table.add_row(vec![
        Cell::new("Receita Líquida"),
        signed_cell(captation.summary.net_captation, currency),
    ]);
    table.add_row(vec![Cell::new("Total de Clientes"), Cell::new(number(clients_total))]);
    table.add_row(vec![
        Cell::new("Alocação Total"),
        Cell::new(money(allocations.total_value, currency)),
    ]);
    format!("Visão Geral\n{table}")
}
