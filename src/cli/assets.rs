use comfy_table::{Cell, Table};
use serde_json::Value;

use super::{authed_api, entity, failure, toast, AssetsCommands};
use crate::error::{CarteiraError, Result};
use crate::models::{Asset, YahooSearchResult};
use crate::settings::Settings;
use crate::table::PLACEHOLDER;
use crate::validation::validate_yahoo_ticker;

/// Shorter queries are not sent to the search endpoint.
const MIN_SEARCH_LEN: usize = 3;

pub fn run(settings: &Settings, command: AssetsCommands) -> Result<()> {
    match command {
        AssetsCommands::Common(command) => entity::run::<Asset>(settings, command),
        AssetsCommands::YahooSearch { query } => yahoo_search(settings, &query),
        AssetsCommands::YahooSave { ticker } => yahoo_save(settings, &ticker),
        AssetsCommands::UpdatePrices => update_prices(settings),
    }
}

pub fn format_search_results(results: &[YahooSearchResult]) -> String {
    if results.is_empty() {
        return "Nenhum ativo encontrado".to_string();
    }
    let mut table = Table::new();
    table.set_header(vec!["Ticker", "Nome", "Bolsa"]);
    for r in results {
        table.add_row(vec![
            Cell::new(&r.ticker),
            Cell::new(&r.name),
            Cell::new(r.exchange.as_deref().unwrap_or(PLACEHOLDER)),
        ]);
    }
    format!("Yahoo Finance\n{table}")
}

pub fn yahoo_search(settings: &Settings, query: &str) -> Result<()> {
    let query = query.trim();
    if query.chars().count() < MIN_SEARCH_LEN {
        return Err(CarteiraError::Other(format!(
            "Digite pelo menos {MIN_SEARCH_LEN} caracteres para buscar"
        )));
    }
    let api = authed_api(settings)?;
    let results = api
        .search_yahoo(query)
        .map_err(failure("Erro ao buscar ativos"))?;
    println!("{}", format_search_results(&results));
    Ok(())
}

pub fn yahoo_save(settings: &Settings, ticker: &str) -> Result<()> {
    let ticker = ticker.trim().to_uppercase();
    validate_yahoo_ticker(&ticker)?;
    let api = authed_api(settings)?;
    let asset = api
        .save_yahoo_asset(&ticker)
        .map_err(failure("Erro ao salvar ativo"))?;
    toast(&format!(
        "Ativo do Yahoo Finance salvo com sucesso! {} (#{})",
        asset.ticker, asset.id
    ));
    Ok(())
}

/// One-line description of whatever the price refresh returned.
pub fn describe_price_update(response: &Value) -> Option<String> {
    match response {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => {
            if let Some(Value::String(msg)) = map.get("message") {
                return Some(msg.clone());
            }
            let parts: Vec<String> = map
                .iter()
                .map(|(k, v)| match v {
                    Value::String(s) => format!("{k}: {s}"),
                    other => format!("{k}: {other}"),
                })
                .collect();
            Some(parts.join(", "))
        }
        other => Some(other.to_string()),
    }
}

pub fn update_prices(settings: &Settings) -> Result<()> {
    let api = authed_api(settings)?;
    let response = api
        .update_asset_prices()
        .map_err(failure("Erro ao atualizar preços"))?;
    toast("Preços atualizados com sucesso!");
    if let Some(detail) = describe_price_update(&response) {
        println!("{detail}");
    }
    Ok(())
}
