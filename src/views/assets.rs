use std::collections::BTreeSet;

use crate::error::Result;
use crate::export::CsvHeader;
use crate::fmt::{money, DEFAULT_CURRENCY};
use crate::models::{Asset, AssetCreate, AssetUpdate};
use crate::table::{Column, DataTable, RenderedCell};

use super::{EntityView, FieldKind, FilterCaps, FormField, FormReader, FormValues, Messages};

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

impl EntityView for Asset {
    const TITLE: &'static str = "Ativos Financeiros";
    const SEARCH_PLACEHOLDER: &'static str = "Pesquisar ativos...";
    const EXPORT_NAME: &'static str = "ativos";
    const FILTERS: FilterCaps = FilterCaps {
        status: false,
        kind: false,
        client: false,
        asset: false,
        exchange: true,
        currency: true,
        date_range: true,
    };
    const DATE_RANGE_LABEL: &'static str = "Data de criação";
    const MESSAGES: Messages = Messages {
        created: "Ativo criado com sucesso!",
        create_failed: "Erro ao criar ativo",
        updated: "Ativo atualizado com sucesso!",
        update_failed: "Erro ao atualizar ativo",
        deleted: "Ativo excluído com sucesso!",
        delete_failed: "Erro ao excluir ativo",
        confirm_delete: "Tem certeza que deseja excluir este ativo?",
    };

    fn columns() -> Vec<Column> {
        vec![
            Column::new("ticker", "Ticker", true),
            Column::new("name", "Nome", true),
            Column::new("exchange", "Bolsa", true),
            Column::new("currency", "Moeda", false),
            Column::new("current_price", "Preço Atual", true),
            Column::new("created_at", "Data de Criação", true),
        ]
    }

    fn export_headers() -> Vec<CsvHeader> {
        vec![
            CsvHeader::new("id", "ID"),
            CsvHeader::new("ticker", "Ticker"),
            CsvHeader::new("name", "Nome"),
            CsvHeader::new("exchange", "Bolsa"),
            CsvHeader::new("currency", "Moeda"),
            CsvHeader::new("current_price", "Preço Atual"),
            CsvHeader::new("created_at", "Data de Criação"),
        ]
    }

    /// Prices are shown in the asset's own currency.
    fn decorate(table: DataTable<Self>, _currency: &str) -> DataTable<Self> {
        table.with_renderer("current_price", |asset: &Asset| {
            let currency = if asset.currency.is_empty() {
                DEFAULT_CURRENCY
            } else {
                asset.currency.as_str()
            };
            Some(RenderedCell::text(money(
                asset.current_price.unwrap_or(0.0),
                currency,
            )))
        })
    }

    fn form_fields() -> Vec<FormField> {
        vec![
            FormField::new("ticker", "Ticker", FieldKind::Upper),
            FormField::new("name", "Nome", FieldKind::Text),
            FormField::new("exchange", "Bolsa", FieldKind::Text),
            FormField::new("currency", "Moeda", FieldKind::Upper).with_default(DEFAULT_CURRENCY),
            FormField::new("current_price", "Preço Atual", FieldKind::Number),
        ]
    }

    fn form_values(&self) -> FormValues {
        FormValues::from([
            ("ticker", self.ticker.clone()),
            ("name", self.name.clone()),
            ("exchange", self.exchange.clone()),
            ("currency", self.currency.clone()),
            (
                "current_price",
                self.current_price.map(|p| p.to_string()).unwrap_or_default(),
            ),
        ])
    }

    fn create_payload(values: &FormValues) -> Result<AssetCreate> {
        let mut reader = FormReader::new(values);
        let current_price = reader.opt_number("current_price");
        let payload = AssetCreate {
            ticker: reader.text("ticker").to_uppercase(),
            name: reader.text("name"),
            exchange: reader.text("exchange"),
            currency: reader.text("currency").to_uppercase(),
            current_price,
        };
        reader.finish(payload)
    }

    fn update_payload(values: &FormValues) -> Result<AssetUpdate> {
        let mut reader = FormReader::new(values);
        let current_price = reader.opt_number("current_price");
        let payload = AssetUpdate {
            ticker: Some(reader.text("ticker").to_uppercase()),
            name: Some(reader.text("name")),
            exchange: Some(reader.text("exchange")),
            currency: Some(reader.text("currency").to_uppercase()),
            current_price,
        };
        reader.finish(payload)
    }

    fn summary(&self) -> String {
        format!("{} ({})", self.ticker, self.name)
    }

    fn exchange_options(items: &[Self]) -> Vec<String> {
        distinct(items.iter().map(|a| a.exchange.as_str()))
    }

    fn currency_options(items: &[Self]) -> Vec<String> {
        distinct(items.iter().map(|a| a.currency.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(id: i64, ticker: &str, exchange: &str, currency: &str, price: Option<f64>) -> Asset {
        Asset {
            id,
            ticker: ticker.to_string(),
            name: format!("{ticker} Inc"),
            exchange: exchange.to_string(),
            currency: currency.to_string(),
            current_price: price,
            sector: None,
            industry: None,
            market_cap: None,
            volume: None,
            pe_ratio: None,
            dividend_yield: None,
            last_updated: None,
            created_at: "2024-01-15T09:00:00".to_string(),
            updated_at: None,
        }
    }

    #[test]
    fn test_price_in_row_currency() {
        let table = Asset::table("BRL");
        let view = table.render(
            &[
                asset(1, "AAPL", "NASDAQ", "USD", Some(189.5)),
                asset(2, "PETR4.SA", "B3", "BRL", None),
            ],
            false,
        );
        let rows = view.rows();
        assert_eq!(rows[0].cells[4].text, "US$ 189,50");
        assert_eq!(rows[1].cells[4].text, "R$ 0,00");
        assert_eq!(rows[0].cells[5].text, "15/01/2024");
    }

    #[test]
    fn test_filter_options_are_distinct_and_sorted() {
        let items = vec![
            asset(1, "AAPL", "NASDAQ", "USD", None),
            asset(2, "MSFT", "NASDAQ", "USD", None),
            asset(3, "VALE3.SA", "B3", "BRL", None),
        ];
        assert_eq!(Asset::exchange_options(&items), vec!["B3", "NASDAQ"]);
        assert_eq!(Asset::currency_options(&items), vec!["BRL", "USD"]);
    }

    #[test]
    fn test_create_payload_uppercases_ticker() {
        let mut values = FormValues::new();
        values.insert("ticker", "vale3.sa".to_string());
        values.insert("name", "Vale".to_string());
        values.insert("exchange", "B3".to_string());
        values.insert("currency", "brl".to_string());
        values.insert("current_price", "".to_string());
        let payload = Asset::create_payload(&values).unwrap();
        assert_eq!(payload.ticker, "VALE3.SA");
        assert_eq!(payload.currency, "BRL");
        assert_eq!(payload.current_price, None);
    }

    #[test]
    fn test_export_keeps_raw_price() {
        let csv = crate::export::convert_to_csv(
            &[asset(1, "AAPL", "NASDAQ", "USD", Some(150.5))],
            &Asset::export_headers(),
        )
        .unwrap();
        assert!(csv.ends_with("\"150.5\",\"2024-01-15T09:00:00\""));
    }
}
