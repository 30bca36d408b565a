use crate::error::Result;
use crate::export::CsvHeader;
use crate::fmt::money;
use crate::models::{Allocation, AllocationCreate, AllocationUpdate};
use crate::table::{Column, DataTable, RenderedCell};

use super::{EntityView, FieldKind, FilterCaps, FormField, FormReader, FormValues, Messages};

impl EntityView for Allocation {
    const TITLE: &'static str = "Alocações";
    const SEARCH_PLACEHOLDER: &'static str = "Pesquisar alocações...";
    const EXPORT_NAME: &'static str = "alocacoes";
    const FILTERS: FilterCaps = FilterCaps {
        status: false,
        kind: false,
        client: true,
        asset: true,
        exchange: false,
        currency: false,
        date_range: true,
    };
    const DATE_RANGE_LABEL: &'static str = "Data da compra";
    const MESSAGES: Messages = Messages {
        created: "Alocação criada com sucesso!",
        create_failed: "Erro ao criar alocação",
        updated: "Alocação atualizada com sucesso!",
        update_failed: "Erro ao atualizar alocação",
        deleted: "Alocação excluída com sucesso!",
        delete_failed: "Erro ao excluir alocação",
        confirm_delete: "Tem certeza que deseja excluir esta alocação?",
    };

    fn columns() -> Vec<Column> {
        vec![
            Column::new("client.name", "Cliente", true),
            Column::new("asset.ticker", "Ativo", true),
            Column::new("asset.name", "Nome do Ativo", true),
            Column::new("quantity", "Quantidade", true),
            Column::new("buy_price", "Preço de Compra", true),
            Column::new("buy_date", "Data de Compra", true),
            Column::new("total_value", "Valor Total", true),
        ]
    }

    fn export_headers() -> Vec<CsvHeader> {
        vec![
            CsvHeader::new("id", "ID"),
            CsvHeader::new("client.name", "Cliente"),
            CsvHeader::new("asset.ticker", "Ticker"),
            CsvHeader::new("asset.name", "Nome do Ativo"),
            CsvHeader::new("quantity", "Quantidade"),
            CsvHeader::new("buy_price", "Preço de Compra"),
            CsvHeader::new("buy_date", "Data de Compra"),
        ]
    }

    /// Total value is derived, it is not a field of the row.
    fn decorate(table: DataTable<Self>, currency: &str) -> DataTable<Self> {
        let currency = currency.to_string();
        table.with_renderer("total_value", move |a: &Allocation| {
            let total = a.total_value();
            let total = if total.is_finite() { total } else { 0.0 };
            Some(RenderedCell::text(money(total, &currency)))
        })
    }

    fn form_fields() -> Vec<FormField> {
        vec![
            FormField::new("client_id", "Cliente (ID)", FieldKind::Integer),
            FormField::new("asset_id", "Ativo (ID)", FieldKind::Integer),
            FormField::new("quantity", "Quantidade", FieldKind::Number),
            FormField::new("buy_price", "Preço de Compra", FieldKind::Number),
            FormField::new("buy_date", "Data de Compra", FieldKind::Date),
        ]
    }

    fn form_values(&self) -> FormValues {
        FormValues::from([
            ("client_id", self.client_id.to_string()),
            ("asset_id", self.asset_id.to_string()),
            ("quantity", self.quantity.to_string()),
            ("buy_price", self.buy_price.to_string()),
            ("buy_date", self.buy_date.chars().take(10).collect()),
        ])
    }

    fn create_payload(values: &FormValues) -> Result<AllocationCreate> {
        let mut reader = FormReader::new(values);
        let payload = AllocationCreate {
            client_id: reader.integer("client_id"),
            asset_id: reader.integer("asset_id"),
            quantity: reader.number("quantity"),
            buy_price: reader.number("buy_price"),
            buy_date: reader.text("buy_date"),
        };
        reader.finish(payload)
    }

    fn update_payload(values: &FormValues) -> Result<AllocationUpdate> {
        let mut reader = FormReader::new(values);
        let payload = AllocationUpdate {
            client_id: Some(reader.integer("client_id")),
            asset_id: Some(reader.integer("asset_id")),
            quantity: Some(reader.number("quantity")),
            buy_price: Some(reader.number("buy_price")),
            buy_date: Some(reader.text("buy_date")),
        };
        reader.finish(payload)
    }

    fn summary(&self) -> String {
        let client = self.client.as_ref().map(|c| c.name.as_str()).unwrap_or("-");
        let ticker = self.asset.as_ref().map(|a| a.ticker.as_str()).unwrap_or("-");
        format!("{client}: {} x {ticker}", self.quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CarteiraError;
    use crate::models::{AssetRef, ClientRef};

    fn allocation(with_refs: bool) -> Allocation {
        Allocation {
            id: 11,
            client_id: 3,
            asset_id: 4,
            quantity: 10.0,
            buy_price: 25.5,
            buy_date: "2024-03-10".to_string(),
            created_at: "2024-03-10T12:00:00".to_string(),
            updated_at: None,
            client: with_refs.then(|| ClientRef {
                id: 3,
                name: "Ana".to_string(),
                email: "ana@example.com".to_string(),
            }),
            asset: with_refs.then(|| AssetRef {
                id: 4,
                ticker: "ITUB4".to_string(),
                name: "Itaú".to_string(),
                exchange: "B3".to_string(),
                currency: "BRL".to_string(),
                current_price: None,
            }),
        }
    }

    #[test]
    fn test_allocation_row() {
        let view = Allocation::table("BRL").render(&[allocation(true)], false);
        let texts: Vec<&str> = view.rows()[0].cells.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["Ana", "ITUB4", "Itaú", "10", "R$ 25,50", "10/03/2024", "R$ 255,00", "#11"]
        );
    }

    #[test]
    fn test_missing_nested_refs_render_placeholders() {
        let view = Allocation::table("BRL").render(&[allocation(false)], false);
        let cells = &view.rows()[0].cells;
        assert_eq!(cells[0].text, "-");
        assert_eq!(cells[1].text, "-");
        assert_eq!(cells[2].text, "-");
    }

    #[test]
    fn test_export_flattens_nested_fields() {
        let csv = crate::export::convert_to_csv(&[allocation(true)], &Allocation::export_headers())
            .unwrap();
        let lines: Vec<&str> = csv.split('\n').collect();
        assert_eq!(
            lines[1],
            "\"11\",\"Ana\",\"ITUB4\",\"Itaú\",\"10\",\"25.5\",\"2024-03-10\""
        );
    }

    #[test]
    fn test_form_reports_every_bad_field() {
        let mut values = FormValues::new();
        values.insert("client_id", "".to_string());
        values.insert("asset_id", "x".to_string());
        values.insert("quantity", "0".to_string());
        values.insert("buy_price", "10".to_string());
        values.insert("buy_date", "2024-3-1".to_string());
        match Allocation::create_payload(&values) {
            Err(CarteiraError::Validation(errors)) => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field).collect();
                assert_eq!(fields, vec!["asset_id", "client_id", "quantity", "buy_date"]);
                assert_eq!(errors[0].message, "Informe um número válido");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
