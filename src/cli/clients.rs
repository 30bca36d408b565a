use super::{authed_api, entity, failure, toast, ClientsCommands};
use crate::error::Result;
use crate::models::Client;
use crate::settings::Settings;
use crate::views::EntityView;

pub fn run(settings: &Settings, command: ClientsCommands) -> Result<()> {
    match command {
        ClientsCommands::Common(command) => entity::run::<Client>(settings, command),
        ClientsCommands::Toggle { id } => toggle(settings, id),
    }
}

pub fn toggle(settings: &Settings, id: i64) -> Result<()> {
    let api = authed_api(settings)?;
    let Some(messages) = Client::STATUS_TOGGLE else {
        return Ok(());
    };
    let client = api
        .toggle_client_status(id)
        .map_err(failure(messages.failure))?;
    let state = if client.is_active { "Ativo" } else { "Inativo" };
    toast(&format!("{} {} agora está {state}.", messages.success, client.name));
    Ok(())
}
