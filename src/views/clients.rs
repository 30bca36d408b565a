use crate::api::ApiClient;
use crate::error::Result;
use crate::export::CsvHeader;
use crate::models::{Client, ClientCreate, ClientUpdate};
use crate::table::Column;

use super::{
    EntityView, FieldKind, FilterCaps, FormField, FormReader, FormValues, Messages, StatusToggle,
};

impl EntityView for Client {
    const TITLE: &'static str = "Clientes";
    const SEARCH_PLACEHOLDER: &'static str = "Pesquisar clientes...";
    const EXPORT_NAME: &'static str = "clientes";
    const FILTERS: FilterCaps = FilterCaps {
        status: true,
        kind: false,
        client: false,
        asset: false,
        exchange: false,
        currency: false,
        date_range: true,
    };
    const DATE_RANGE_LABEL: &'static str = "Data de criação";
    const MESSAGES: Messages = Messages {
        created: "Cliente criado com sucesso!",
        create_failed: "Erro ao criar cliente",
        updated: "Cliente atualizado com sucesso!",
        update_failed: "Erro ao atualizar cliente",
        deleted: "Cliente excluído com sucesso!",
        delete_failed: "Erro ao excluir cliente",
        confirm_delete: "Tem certeza que deseja excluir este cliente?",
    };
    const STATUS_TOGGLE: Option<StatusToggle> = Some(StatusToggle {
        success: "Status do cliente atualizado!",
        failure: "Erro ao atualizar status",
    });

    fn columns() -> Vec<Column> {
        vec![
            Column::new("name", "Nome", true),
            Column::new("email", "Email", true),
            Column::new("is_active", "Status", false),
            Column::new("created_at", "Data de Criação", true),
        ]
    }

    fn export_headers() -> Vec<CsvHeader> {
        vec![
            CsvHeader::new("id", "ID"),
            CsvHeader::new("name", "Nome"),
            CsvHeader::new("email", "Email"),
            CsvHeader::new("is_active", "Status"),
            CsvHeader::new("created_at", "Data de Criação"),
        ]
    }

    fn form_fields() -> Vec<FormField> {
        vec![
            FormField::new("name", "Nome", FieldKind::Text),
            FormField::new("email", "Email", FieldKind::Text),
            FormField::new("is_active", "Ativo", FieldKind::Toggle).with_default("true"),
        ]
    }

    fn form_values(&self) -> FormValues {
        FormValues::from([
            ("name", self.name.clone()),
            ("email", self.email.clone()),
            ("is_active", self.is_active.to_string()),
        ])
    }

    fn create_payload(values: &FormValues) -> Result<ClientCreate> {
        let reader = FormReader::new(values);
        let payload = ClientCreate {
            name: reader.text("name"),
            email: reader.text("email"),
            is_active: reader.flag("is_active"),
        };
        reader.finish(payload)
    }

    fn update_payload(values: &FormValues) -> Result<ClientUpdate> {
        let reader = FormReader::new(values);
        let payload = ClientUpdate {
            name: Some(reader.text("name")),
            email: Some(reader.text("email")),
            is_active: Some(reader.flag("is_active")),
        };
        reader.finish(payload)
    }

    fn summary(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }

    fn toggle_active(api: &ApiClient, id: i64) -> Result<()> {
        api.toggle_client_status(id).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CarteiraError;

    fn client(active: bool) -> Client {
        Client {
            id: 3,
            name: "Ana Lima".to_string(),
            email: "ana@example.com".to_string(),
            is_active: active,
            created_at: "2024-06-01T10:00:00".to_string(),
            updated_at: None,
        }
    }

    #[test]
    fn test_client_row_rendering() {
        let view = Client::table("BRL").render(&[client(true), client(false)], false);
        let rows = view.rows();
        let texts: Vec<&str> = rows[0].cells.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["Ana Lima", "ana@example.com", "Ativo", "01/06/2024", "#3"]);
        assert_eq!(rows[1].cells[2].text, "Inativo");
        assert_eq!(view.headers.len(), 5);
    }

    #[test]
    fn test_empty_client_list_spans_actions() {
        let view = Client::table("BRL").render(&[], false);
        assert!(matches!(
            view.body,
            crate::table::TableBody::Empty { colspan: 5, .. }
        ));
    }

    #[test]
    fn test_form_roundtrip_through_payload() {
        let values = client(false).form_values();
        let payload = Client::create_payload(&values).unwrap();
        assert_eq!(payload.name, "Ana Lima");
        assert!(!payload.is_active);
    }

    #[test]
    fn test_form_rejects_bad_email() {
        let mut values = client(true).form_values();
        values.insert("email", "ana@".to_string());
        match Client::update_payload(&values) {
            Err(CarteiraError::Validation(errors)) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field, "email");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_client_export() {
        let csv = crate::export::convert_to_csv(&[client(true)], &Client::export_headers()).unwrap();
        assert_eq!(
            csv,
            "\"ID\",\"Nome\",\"Email\",\"Status\",\"Data de Criação\"\n\"3\",\"Ana Lima\",\"ana@example.com\",\"true\",\"2024-06-01T10:00:00\""
        );
    }
}
