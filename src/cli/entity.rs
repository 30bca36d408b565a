use std::io::Write;

use comfy_table::{Cell, Table};

use super::{authed_api, failure, toast, EntityCommands, FilterArgs, ListArgs};
use crate::api::ApiClient;
use crate::error::{CarteiraError, Result};
use crate::export::export_to_csv;
use crate::filters::ApiParams;
use crate::fmt::number;
use crate::models::Page;
use crate::settings::Settings;
use crate::table::{coerce_to_string, resolve_path};
use crate::views::{blank_form, EntityView, FieldKind, FormValues, EXPORTED, LOAD_FAILED};

/// Largest page requested when walking every page for an export.
const EXPORT_PAGE_SIZE: u32 = 100;

pub fn run<T: EntityView>(settings: &Settings, command: EntityCommands) -> Result<()> {
    match command {
        EntityCommands::List(args) => list::<T>(settings, &args),
        EntityCommands::Show { id } => show::<T>(settings, id),
        EntityCommands::Add { fields } => add::<T>(settings, &fields),
        EntityCommands::Update { id, fields } => update::<T>(settings, id, &fields),
        EntityCommands::Delete { id, yes } => delete::<T>(settings, id, yes),
        EntityCommands::Export(filters) => export::<T>(settings, &filters),
    }
}

pub fn list<T: EntityView>(settings: &Settings, args: &ListArgs) -> Result<()> {
    let filters = args.filters.to_filters(T::FILTERS, T::TITLE)?;
    let api = authed_api(settings)?;
    let size = args.size.unwrap_or(settings.page_size).max(1);
    let params = filters.api_params().with_page(args.page.max(1), size);
    log::info!("listing {} with {params}", T::PATH);

    let page = fetch_page::<T>(&api, &params)?;
    let view = T::table(&settings.currency).render(&page.items, false);
    log::debug!("rendered {} rows of {}", view.row_count(), page.total);
    println!("{}\n{}", view.title, view.to_comfy());
    println!("{}", page_footer(&page, &filters.describe()));

    if args.export {
        write_export::<T>(settings, &page.items)?;
    }
    Ok(())
}

fn page_footer<T>(page: &Page<T>, filters: &str) -> String {
    let mut footer = format!(
        "Página {} de {} | {} registros",
        page.page.max(1),
        page.pages.max(1),
        number(page.total)
    );
    if !filters.is_empty() {
        footer.push_str(&format!(" | {filters}"));
    }
    footer
}

/// Field/value table of one record, labelled like its export.
pub fn detail_table<T: EntityView>(row: &T) -> Result<Table> {
    let value = serde_json::to_value(row)?;
    let mut table = Table::new();
    table.set_header(vec!["Campo", "Valor"]);
    for header in T::export_headers() {
        let text = resolve_path(&value, header.key)
            .and_then(coerce_to_string)
            .unwrap_or_default();
        table.add_row(vec![Cell::new(header.label), Cell::new(text)]);
    }
    Ok(table)
}

fn fetch_page<T: EntityView>(api: &ApiClient, params: &ApiParams) -> Result<Page<T>> {
    api.list::<T>(params).map_err(failure(LOAD_FAILED))
}

fn fetch_one<T: EntityView>(api: &ApiClient, id: i64) -> Result<T> {
    api.get::<T>(id).map_err(failure(LOAD_FAILED))
}

pub fn show<T: EntityView>(settings: &Settings, id: i64) -> Result<()> {
    let api = authed_api(settings)?;
    let row = fetch_one::<T>(&api, id)?;
    println!("{} #{id}\n{}", T::TITLE, detail_table(&row)?);
    Ok(())
}

/// Apply `FIELD=VALUE` pairs onto form values, the way typing into the form would.
pub fn apply_pairs<T: EntityView>(mut values: FormValues, pairs: &[String]) -> Result<FormValues> {
    let fields = T::form_fields();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(CarteiraError::Other(format!("expected FIELD=VALUE, got '{pair}'")));
        };
        let key = key.trim();
        let Some(field) = fields.iter().find(|f| f.key == key) else {
            let known: Vec<&str> = fields.iter().map(|f| f.key).collect();
            return Err(CarteiraError::Other(format!(
                "unknown field '{key}' (expected one of: {})",
                known.join(", ")
            )));
        };
        let value = match field.kind {
            FieldKind::Upper => value.trim().to_uppercase(),
            FieldKind::Toggle => match value.trim().to_lowercase().as_str() {
                "true" | "sim" | "s" | "yes" | "y" | "1" => "true".to_string(),
                _ => "false".to_string(),
            },
            _ => value.to_string(),
        };
        values.insert(field.key, value);
    }
    Ok(values)
}

pub fn add<T: EntityView>(settings: &Settings, pairs: &[String]) -> Result<()> {
    let values = apply_pairs::<T>(blank_form::<T>(), pairs)?;
    let payload = T::create_payload(&values)?;
    let api = authed_api(settings)?;
    let created = api
        .create::<T>(&payload)
        .map_err(failure(T::MESSAGES.create_failed))?;
    toast(&format!("{} (#{})", T::MESSAGES.created, created.id()));
    Ok(())
}

pub fn update<T: EntityView>(settings: &Settings, id: i64, pairs: &[String]) -> Result<()> {
    let api = authed_api(settings)?;
    let current = fetch_one::<T>(&api, id)?;
    let values = apply_pairs::<T>(current.form_values(), pairs)?;
    let payload = T::update_payload(&values)?;
    api.update::<T>(id, &payload)
        .map_err(failure(T::MESSAGES.update_failed))?;
    toast(T::MESSAGES.updated);
    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} [s/N] ");
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(matches!(input.trim().to_lowercase().as_str(), "s" | "sim" | "y" | "yes"))
}

pub fn delete<T: EntityView>(settings: &Settings, id: i64, yes: bool) -> Result<()> {
    let api = authed_api(settings)?;
    if !yes {
        let row = fetch_one::<T>(&api, id)?;
        if !confirm(&format!("{} {}", T::MESSAGES.confirm_delete, row.summary()))? {
            println!("Cancelado.");
            return Ok(());
        }
    }
    api.delete::<T>(id)
        .map_err(failure(T::MESSAGES.delete_failed))?;
    toast(T::MESSAGES.deleted);
    Ok(())
}

/// Every page matching `params`, in order.
pub fn fetch_all<T: EntityView>(api: &ApiClient, params: &ApiParams) -> Result<Vec<T>> {
    let mut items = Vec::new();
    let mut page_no = 1;
    loop {
        let page = fetch_page::<T>(api, &params.with_page(page_no, EXPORT_PAGE_SIZE))?;
        let last = page.items.is_empty() || page_no >= page.pages;
        items.extend(page.items);
        if last {
            break;
        }
        page_no += 1;
    }
    Ok(items)
}

fn write_export<T: EntityView>(settings: &Settings, items: &[T]) -> Result<()> {
    match export_to_csv(items, &T::export_headers(), T::EXPORT_NAME, &settings.export_path())? {
        Some(path) => toast(&format!("{EXPORTED} {}", path.display())),
        None => println!("Nada para exportar."),
    }
    Ok(())
}

pub fn export<T: EntityView>(settings: &Settings, args: &FilterArgs) -> Result<()> {
    let filters = args.to_filters(T::FILTERS, T::TITLE)?;
    let api = authed_api(settings)?;
    let items = fetch_all::<T>(&api, &filters.api_params())?;
    log::info!("exporting {} {} rows", items.len(), T::PATH);
    write_export::<T>(settings, &items)
}
