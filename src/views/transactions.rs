use crate::error::Result;
use crate::export::CsvHeader;
use crate::fmt::money;
use crate::models::{Transaction, TransactionCreate, TransactionType, TransactionUpdate};
use crate::table::{CellStyle, Column, DataTable, RenderedCell};

use super::{EntityView, FieldKind, FilterCaps, FormField, FormReader, FormValues, Messages};

pub const TYPE_CHOICES: &[&str] = &["deposit", "withdrawal"];
const INVALID_TYPE: &str = "Tipo deve ser depósito ou saque";

fn type_style(kind: TransactionType) -> CellStyle {
    match kind {
        TransactionType::Deposit => CellStyle::Positive,
        TransactionType::Withdrawal => CellStyle::Negative,
    }
}

/// `+R$ 1.500,00` for deposits, `-R$ 1.500,00` for withdrawals.
pub fn signed_amount(kind: TransactionType, amount: f64, currency: &str) -> String {
    let sign = match kind {
        TransactionType::Deposit => '+',
        TransactionType::Withdrawal => '-',
    };
    let amount = if amount.is_finite() { amount } else { 0.0 };
    format!("{sign}{}", money(amount, currency))
}

impl EntityView for Transaction {
    const TITLE: &'static str = "Transações";
    const SEARCH_PLACEHOLDER: &'static str = "Pesquisar transações...";
    const EXPORT_NAME: &'static str = "transacoes";
    const FILTERS: FilterCaps = FilterCaps {
        status: false,
        kind: true,
        client: true,
        asset: false,
        exchange: false,
        currency: false,
        date_range: true,
    };
    const MESSAGES: Messages = Messages {
        created: "Transação criada com sucesso!",
        create_failed: "Erro ao criar transação",
        updated: "Transação atualizada com sucesso!",
        update_failed: "Erro ao atualizar transação",
        deleted: "Transação excluída com sucesso!",
        delete_failed: "Erro ao excluir transação",
        confirm_delete: "Tem certeza que deseja excluir esta transação?",
    };

    fn columns() -> Vec<Column> {
        vec![
            Column::new("client.name", "Cliente", true),
            Column::new("type", "Tipo", true),
            Column::new("amount", "Valor", true),
            Column::new("date", "Data", true),
            Column::new("note", "Observação", false),
            Column::new("created_at", "Data de Criação", true),
        ]
    }

    fn export_headers() -> Vec<CsvHeader> {
        vec![
            CsvHeader::new("id", "ID"),
            CsvHeader::new("client.name", "Cliente"),
            CsvHeader::new("type", "Tipo"),
            CsvHeader::new("amount", "Valor"),
            CsvHeader::new("date", "Data"),
            CsvHeader::new("note", "Observação"),
            CsvHeader::new("created_at", "Data de Criação"),
        ]
    }

    fn decorate(table: DataTable<Self>, currency: &str) -> DataTable<Self> {
        let currency = currency.to_string();
        table
            .with_renderer("type", |t: &Transaction| {
                Some(RenderedCell::styled(t.kind.label(), type_style(t.kind)))
            })
            .with_renderer("amount", move |t: &Transaction| {
                Some(RenderedCell::styled(
                    signed_amount(t.kind, t.amount, &currency),
                    type_style(t.kind),
                ))
            })
    }

    fn form_fields() -> Vec<FormField> {
        vec![
            FormField::new("client_id", "Cliente (ID)", FieldKind::Integer),
            FormField::new("type", "Tipo", FieldKind::Choice(TYPE_CHOICES)).with_default("deposit"),
            FormField::new("amount", "Valor", FieldKind::Number),
            FormField::new("date", "Data", FieldKind::Date),
            FormField::new("note", "Observação", FieldKind::Text),
        ]
    }

    fn form_values(&self) -> FormValues {
        FormValues::from([
            ("client_id", self.client_id.to_string()),
            ("type", self.kind.as_str().to_string()),
            ("amount", self.amount.to_string()),
            ("date", self.date.chars().take(10).collect()),
            ("note", self.note.clone().unwrap_or_default()),
        ])
    }

    fn create_payload(values: &FormValues) -> Result<TransactionCreate> {
        let mut reader = FormReader::new(values);
        let kind = reader.choice::<TransactionType>("type", INVALID_TYPE);
        let payload = TransactionCreate {
            client_id: reader.integer("client_id"),
            kind: kind.unwrap_or(TransactionType::Deposit),
            amount: reader.number("amount"),
            date: reader.text("date"),
            note: reader.opt_text("note"),
        };
        reader.finish(payload)
    }

    fn update_payload(values: &FormValues) -> Result<TransactionUpdate> {
        let mut reader = FormReader::new(values);
        let kind = reader.choice::<TransactionType>("type", INVALID_TYPE);
        let payload = TransactionUpdate {
            client_id: Some(reader.integer("client_id")),
            kind,
            amount: Some(reader.number("amount")),
            date: Some(reader.text("date")),
            note: reader.opt_text("note"),
        };
        reader.finish(payload)
    }

    fn summary(&self) -> String {
        let client = self.client.as_ref().map(|c| c.name.as_str()).unwrap_or("-");
        format!(
            "{} {client} {}",
            self.kind.label(),
            signed_amount(self.kind, self.amount, crate::fmt::DEFAULT_CURRENCY)
        )
    }
}
