use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{CarteiraError, Result};
use crate::models::{
    AllocationCreate, AllocationUpdate, AssetCreate, AssetUpdate, ClientCreate, ClientUpdate,
    LoginRequest, SignupRequest, TransactionCreate, TransactionUpdate,
};

const ONE_BILLION: f64 = 999_999_999.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("  {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Message for `field`, if it failed.
pub fn message_for<'a>(errors: &'a [FieldError], field: &str) -> Option<&'a str> {
    errors
        .iter()
        .find(|e| e.field == field)
        .map(|e| e.message.as_str())
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+'\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
            .unwrap_or_else(|e| panic!("invalid email pattern: {e}"))
    })
}

fn ticker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Z0-9.\-]+$").unwrap_or_else(|e| panic!("invalid ticker pattern: {e}"))
    })
}

fn iso_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap_or_else(|e| panic!("invalid date pattern: {e}"))
    })
}

/// Collects the first failure per field.
#[derive(Default)]
struct Checker {
    errors: Vec<FieldError>,
}

impl Checker {
    fn fail(&mut self, field: &'static str, message: &str) {
        if !self.errors.iter().any(|e| e.field == field) {
            self.errors.push(FieldError::new(field, message));
        }
    }

    fn check(&mut self, ok: bool, field: &'static str, message: &str) {
        if !ok {
            self.fail(field, message);
        }
    }

    fn finish(self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(CarteiraError::Validation(self.errors))
        }
    }

    fn client_name(&mut self, name: &str) {
        let len = name.chars().count();
        self.check(len >= 1, "name", "Nome é obrigatório");
        self.check(len >= 2, "name", "Nome deve ter pelo menos 2 caracteres");
        self.check(len <= 100, "name", "Nome deve ter no máximo 100 caracteres");
    }

    fn email(&mut self, email: &str) {
        self.check(!email.is_empty(), "email", "Email é obrigatório");
        self.check(email_re().is_match(email), "email", "Email deve ter um formato válido");
        self.check(email.chars().count() <= 255, "email", "Email deve ter no máximo 255 caracteres");
    }

    fn ticker(&mut self, ticker: &str) {
        let len = ticker.chars().count();
        self.check(len >= 1, "ticker", "Ticker é obrigatório");
        self.check(len >= 2, "ticker", "Ticker deve ter pelo menos 2 caracteres");
        self.check(len <= 20, "ticker", "Ticker deve ter no máximo 20 caracteres");
        self.check(
            ticker_re().is_match(ticker),
            "ticker",
            "Ticker deve conter apenas letras maiúsculas, números, pontos e hífens",
        );
    }

    fn asset_name(&mut self, name: &str) {
        let len = name.chars().count();
        self.check(len >= 1, "name", "Nome é obrigatório");
        self.check(len >= 2, "name", "Nome deve ter pelo menos 2 caracteres");
        self.check(len <= 255, "name", "Nome deve ter no máximo 255 caracteres");
    }

    fn exchange(&mut self, exchange: &str) {
        let len = exchange.chars().count();
        self.check(len >= 1, "exchange", "Exchange é obrigatório");
        self.check(len <= 50, "exchange", "Exchange deve ter no máximo 50 caracteres");
    }

    fn currency(&mut self, currency: &str) {
        let len = currency.chars().count();
        self.check(len >= 1, "currency", "Moeda é obrigatória");
        self.check(len <= 10, "currency", "Moeda deve ter no máximo 10 caracteres");
    }

    fn current_price(&mut self, price: f64) {
        self.check(price >= 0.0, "current_price", "Preço deve ser maior ou igual a zero");
    }

    fn client_id(&mut self, id: i64) {
        self.check(id >= 1, "client_id", "Cliente é obrigatório");
    }

    fn asset_id(&mut self, id: i64) {
        self.check(id >= 1, "asset_id", "Ativo é obrigatório");
    }

    fn quantity(&mut self, quantity: f64) {
        self.check(quantity >= 0.000001, "quantity", "Quantidade deve ser maior que zero");
        self.check(quantity <= ONE_BILLION, "quantity", "Quantidade deve ser menor que 1 bilhão");
    }

    fn buy_price(&mut self, price: f64) {
        self.check(price >= 0.0, "buy_price", "Preço de compra deve ser maior ou igual a zero");
        self.check(price <= ONE_BILLION, "buy_price", "Preço de compra deve ser menor que 1 bilhão");
    }

    fn date(&mut self, field: &'static str, value: &str, required: &str) {
        self.check(!value.is_empty(), field, required);
        self.check(iso_date_re().is_match(value), field, "Data deve estar no formato YYYY-MM-DD");
    }

    fn amount(&mut self, amount: f64) {
        self.check(amount >= 0.01, "amount", "Valor deve ser maior que zero");
        self.check(amount <= ONE_BILLION, "amount", "Valor deve ser menor que 1 bilhão");
    }

    fn note(&mut self, note: &str) {
        self.check(note.chars().count() <= 500, "note", "Nota deve ter no máximo 500 caracteres");
    }
}

/// A payload that can be checked before it leaves the process.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

impl Validate for ClientCreate {
    fn validate(&self) -> Result<()> {
        let mut c = Checker::default();
        c.client_name(&self.name);
        c.email(&self.email);
        c.finish()
    }
}

impl Validate for ClientUpdate {
    fn validate(&self) -> Result<()> {
        let mut c = Checker::default();
        if let Some(ref name) = self.name {
            c.client_name(name);
        }
        if let Some(ref email) = self.email {
            c.email(email);
        }
        c.finish()
    }
}

impl Validate for AssetCreate {
    fn validate(&self) -> Result<()> {
        let mut c = Checker::default();
        c.ticker(&self.ticker);
        c.asset_name(&self.name);
        c.exchange(&self.exchange);
        c.currency(&self.currency);
        if let Some(price) = self.current_price {
            c.current_price(price);
        }
        c.finish()
    }
}

impl Validate for AssetUpdate {
    fn validate(&self) -> Result<()> {
        let mut c = Checker::default();
        if let Some(ref ticker) = self.ticker {
            c.ticker(ticker);
        }
        if let Some(ref name) = self.name {
            c.asset_name(name);
        }
        if let Some(ref exchange) = self.exchange {
            c.exchange(exchange);
        }
        if let Some(ref currency) = self.currency {
            c.currency(currency);
        }
        if let Some(price) = self.current_price {
            c.current_price(price);
        }
        c.finish()
    }
}

impl Validate for AllocationCreate {
    fn validate(&self) -> Result<()> {
        let mut c = Checker::default();
        c.client_id(self.client_id);
        c.asset_id(self.asset_id);
        c.quantity(self.quantity);
        c.buy_price(self.buy_price);
        c.date("buy_date", &self.buy_date, "Data de compra é obrigatória");
        c.finish()
    }
}

impl Validate for AllocationUpdate {
    fn validate(&self) -> Result<()> {
        let mut c = Checker::default();
        if let Some(id) = self.client_id {
            c.client_id(id);
        }
        if let Some(id) = self.asset_id {
            c.asset_id(id);
        }
        if let Some(q) = self.quantity {
            c.quantity(q);
        }
        if let Some(p) = self.buy_price {
            c.buy_price(p);
        }
        if let Some(ref d) = self.buy_date {
            c.date("buy_date", d, "Data de compra é obrigatória");
        }
        c.finish()
    }
}

impl Validate for TransactionCreate {
    fn validate(&self) -> Result<()> {
        let mut c = Checker::default();
        c.client_id(self.client_id);
        c.amount(self.amount);
        c.date("date", &self.date, "Data é obrigatória");
        if let Some(ref note) = self.note {
            c.note(note);
        }
        c.finish()
    }
}

impl Validate for TransactionUpdate {
    fn validate(&self) -> Result<()> {
        let mut c = Checker::default();
        if let Some(id) = self.client_id {
            c.client_id(id);
        }
        if let Some(a) = self.amount {
            c.amount(a);
        }
        if let Some(ref d) = self.date {
            c.date("date", d, "Data é obrigatória");
        }
        if let Some(ref note) = self.note {
            c.note(note);
        }
        c.finish()
    }
}

/// Ticker lookup on the market-data search before saving.
impl Validate for LoginRequest {
    fn validate(&self) -> Result<()> {
        let mut c = Checker::default();
        c.check(email_re().is_match(&self.email), "email", "Email inválido");
        c.check(
            self.password.chars().count() >= 6,
            "password",
            "Senha deve ter pelo menos 6 caracteres",
        );
        c.finish()
    }
}

impl Validate for SignupRequest {
    fn validate(&self) -> Result<()> {
        let mut c = Checker::default();
        c.client_name(&self.name);
        c.check(email_re().is_match(&self.email), "email", "Email inválido");
        c.check(
            self.password.chars().count() >= 6,
            "password",
            "Senha deve ter pelo menos 6 caracteres",
        );
        c.finish()
    }
}

pub fn validate_yahoo_ticker(ticker: &str) -> Result<()> {
    let mut c = Checker::default();
    let len = ticker.chars().count();
    c.check(len >= 1, "ticker", "Ticker é obrigatório");
    c.check(len <= 20, "ticker", "Ticker deve ter no máximo 20 caracteres");
    c.finish()
}
