use colored::Colorize;
use zeroize::Zeroize;

use super::{failure, open_session, toast};
use crate::api::ApiClient;
use crate::error::{CarteiraError, Result};
use crate::models::{LoginRequest, SignupRequest, User};
use crate::session::{FileTokenStore, Session};
use crate::settings::Settings;
use crate::validation::Validate;

fn read_password(label: &str) -> Result<String> {
    Ok(rpassword::prompt_password(label)?)
}

pub fn login(settings: &Settings, email: &str) -> Result<()> {
    let mut request = LoginRequest {
        email: email.trim().to_string(),
        password: read_password("Senha: ")?,
    };
    let checked = request.validate();
    let result = checked.and_then(|()| {
        ApiClient::from_settings(settings)?
            .login(&request)
            .map_err(failure("Erro ao fazer login"))
    });
    request.password.zeroize();
    let response = result?;

    let api = ApiClient::from_settings(settings)?.with_token(Some(&response.access_token));
    let user = match api.me() {
        Ok(user) => Some(user),
        Err(e) => {
            log::warn!("logged in but could not load the user: {e}");
            None
        }
    };

    let mut session = Session::new(FileTokenStore::in_config_dir());
    session.authenticate(response.access_token, user)?;
    toast("Login realizado com sucesso!");
    if let Some(user) = session.user() {
        println!("{}", describe_user(user));
    }
    Ok(())
}

pub fn register(settings: &Settings, name: &str, email: &str) -> Result<()> {
    let mut password = read_password("Senha: ")?;
    let mut confirm = read_password("Confirme a senha: ")?;
    let matches = password == confirm;
    confirm.zeroize();
    if !matches {
        password.zeroize();
        return Err(CarteiraError::Other("As senhas não conferem".to_string()));
    }

    let mut request = SignupRequest {
        email: email.trim().to_string(),
        password,
        name: name.trim().to_string(),
    };
    let result = request.validate().and_then(|()| {
        ApiClient::from_settings(settings)?
            .register(&request)
            .map_err(failure("Erro ao criar conta"))
    });
    request.password.zeroize();
    let user = result?;
    toast(&format!("Conta criada para {}. Faça login com `carteira login`.", user.email));
    Ok(())
}

pub fn logout() -> Result<()> {
    let mut session = open_session()?;
    if !session.is_authenticated() {
        println!("Nenhuma sessão ativa.");
        return Ok(());
    }
    session.clear()?;
    println!("Sessão encerrada.");
    Ok(())
}

/// Refresh the stored user from the API. A rejected token ends the session.
pub fn whoami(settings: &Settings) -> Result<()> {
    let mut session = open_session()?;
    let token = session
        .token()
        .ok_or(CarteiraError::NotAuthenticated)?
        .to_string();
    let api = ApiClient::from_settings(settings)?.with_token(Some(&token));

    match api.me() {
        Ok(user) => {
            println!("{}", describe_user(&user));
            session.set_user(user)?;
            Ok(())
        }
        Err(e) if e.is_unauthorized() => {
            log::info!("stored token rejected, clearing session");
            session.clear()?;
            Err(CarteiraError::NotAuthenticated)
        }
        Err(e) => Err(e),
    }
}

pub fn describe_user(user: &User) -> String {
    let roles = if user.roles.is_empty() {
        String::new()
    } else {
        format!(" [{}]", user.roles.join(", "))
    };
    format!("{} <{}>{}", user.name.bold(), user.email, roles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_user_lists_roles() {
        colored::control::set_override(false);
        let user = User {
            id: 1,
            name: "Admin".to_string(),
            email: "admin@example.com".to_string(),
            roles: vec!["admin".to_string(), "advisor".to_string()],
            is_active: true,
            created_at: String::new(),
            updated_at: String::new(),
        };
        assert_eq!(describe_user(&user), "Admin <admin@example.com> [admin, advisor]");
    }
}
