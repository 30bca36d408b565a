use std::time::Duration;

use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{CarteiraError, Result};
use crate::filters::ApiParams;
use crate::models::{
    Allocation, AllocationCreate, AllocationSummary, AllocationUpdate, Asset, AssetCreate,
    AssetUpdate, CaptationReport, Client, ClientCreate, ClientUpdate, LoginRequest, LoginResponse,
    Page, Record, SignupRequest, Transaction, TransactionCreate, TransactionUpdate, User,
    YahooSearchResult, YahooTickerRequest,
};
use crate::settings::Settings;
use crate::validation::Validate;

/// An entity served by a CRUD collection endpoint.
pub trait Resource: Record + DeserializeOwned + Clone + Send + 'static {
    /// Collection path, e.g. `/clients`.
    const PATH: &'static str;
    type Create: Serialize + Validate + Send + 'static;
    type Update: Serialize + Validate + Send + 'static;
}

impl Resource for Client {
    const PATH: &'static str = "/clients";
    type Create = ClientCreate;
    type Update = ClientUpdate;
}

impl Resource for Asset {
    const PATH: &'static str = "/assets";
    type Create = AssetCreate;
    type Update = AssetUpdate;
}

impl Resource for Allocation {
    const PATH: &'static str = "/allocations";
    type Create = AllocationCreate;
    type Update = AllocationUpdate;
}

impl Resource for Transaction {
    const PATH: &'static str = "/transactions";
    type Create = TransactionCreate;
    type Update = TransactionUpdate;
}

/// Pull a human message out of an error body: a plain `detail` string, or the
/// `msg` entries of a field-validation list.
pub fn parse_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let msgs: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            if msgs.is_empty() {
                None
            } else {
                Some(msgs.join("; "))
            }
        }
        _ => None,
    }
}

#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: HttpClient,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            token: None,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(settings.base_url(), Duration::from_secs(settings.timeout_secs))
    }

    pub fn with_token(mut self, token: Option<&str>) -> Self {
        self.token = token.map(str::to_string);
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        log::debug!("{method} {url}");
        let builder = self.http.request(method, url);
        match self.token {
            Some(ref token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn execute(&self, builder: RequestBuilder) -> Result<reqwest::blocking::Response> {
        let response = builder.send()?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        let detail = parse_detail(&body);
        log::debug!("remote error {status}: {body}");
        Err(CarteiraError::Remote {
            status: status.as_u16(),
            detail,
        })
    }

    fn fetch<R: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<R> {
        Ok(self.execute(builder)?.json()?)
    }

    // -- generic CRUD ------------------------------------------------------

    pub fn list<T: Resource>(&self, params: &ApiParams) -> Result<Page<T>> {
        self.fetch(self.request(Method::GET, T::PATH).query(&params.to_pairs()))
    }

    pub fn get<T: Resource>(&self, id: i64) -> Result<T> {
        self.fetch(self.request(Method::GET, &format!("{}/{id}", T::PATH)))
    }

    pub fn create<T: Resource>(&self, payload: &T::Create) -> Result<T> {
        payload.validate()?;
        self.fetch(self.request(Method::POST, T::PATH).json(payload))
    }

    pub fn update<T: Resource>(&self, id: i64, payload: &T::Update) -> Result<T> {
        payload.validate()?;
        self.fetch(self.request(Method::PUT, &format!("{}/{id}", T::PATH)).json(payload))
    }

    pub fn delete<T: Resource>(&self, id: i64) -> Result<()> {
        self.execute(self.request(Method::DELETE, &format!("{}/{id}", T::PATH)))?;
        Ok(())
    }

    // -- entity-specific endpoints -----------------------------------------

    pub fn toggle_client_status(&self, id: i64) -> Result<Client> {
        self.fetch(self.request(Method::PATCH, &format!("/clients/{id}/toggle")))
    }

    pub fn search_yahoo(&self, query: &str) -> Result<Vec<YahooSearchResult>> {
        self.fetch(
            self.request(Method::GET, "/assets/yahoo/search")
                .query(&[("query", query)]),
        )
    }

    pub fn save_yahoo_asset(&self, ticker: &str) -> Result<Asset> {
        let body = YahooTickerRequest {
            ticker: ticker.to_string(),
        };
        self.fetch(self.request(Method::POST, "/assets/yahoo/save").json(&body))
    }

    /// The response shape is not fixed; it is returned as-is for display.
    pub fn update_asset_prices(&self) -> Result<Value> {
        let response = self.execute(self.request(Method::POST, "/assets/update-prices"))?;
        let body = response.text()?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    pub fn allocation_summary(&self) -> Result<AllocationSummary> {
        self.fetch(self.request(Method::GET, "/allocations/stats/total-value"))
    }

    pub fn captation_report(&self, params: &ApiParams) -> Result<CaptationReport> {
        self.fetch(
            self.request(Method::GET, "/transactions/reports/captation")
                .query(&params.to_pairs()),
        )
    }

    // -- auth ----------------------------------------------------------------

    pub fn login(&self, request: &LoginRequest) -> Result<LoginResponse> {
        self.fetch(self.request(Method::POST, "/auth/login").json(request))
    }

    pub fn register(&self, request: &SignupRequest) -> Result<User> {
        self.fetch(self.request(Method::POST, "/auth/register").json(request))
    }

    pub fn me(&self) -> Result<User> {
        self.fetch(self.request(Method::GET, "/auth/me"))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::filters::{FilterState, StatusFilter};
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    /// Serve exactly one request with a canned response. The raw request
    /// (head + body) comes back over the returned channel.
    pub(crate) fn one_shot(status: &str, body: &str) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut head = String::new();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap() == 0 {
                    break;
                }
                if let Some(v) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                    content_length = v.trim().parse().unwrap_or(0);
                }
                let end = line == "\r\n";
                head.push_str(&line);
                if end {
                    break;
                }
            }
            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).unwrap();
            head.push_str(&String::from_utf8_lossy(&body));
            let mut stream = stream;
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();
            tx.send(head).unwrap();
        });
        (format!("http://{addr}"), rx)
    }

    fn client(url: &str) -> ApiClient {
        ApiClient::new(url, Duration::from_secs(5)).unwrap()
    }

    const CLIENT_PAGE: &str = r#"{"items":[{"id":3,"name":"Ana","email":"ana@example.com","is_active":true,"created_at":"2024-06-01T10:00:00"}],"total":1,"page":1,"size":20,"pages":1}"#;

    #[test]
    fn test_parse_detail_variants() {
        assert_eq!(parse_detail(r#"{"detail":"Cliente não encontrado"}"#), Some("Cliente não encontrado".to_string()));
        assert_eq!(
            parse_detail(r#"{"detail":[{"msg":"field required"},{"msg":"bad email"}]}"#),
            Some("field required; bad email".to_string())
        );
        assert_eq!(parse_detail(r#"{"error":"x"}"#), None);
        assert_eq!(parse_detail("<html>"), None);
    }

    #[test]
    fn test_list_sends_filters_and_bearer_token() {
        let (url, rx) = one_shot("200 OK", CLIENT_PAGE);
        let mut filters = FilterState::new();
        filters.set_search("ana");
        filters.set_status(StatusFilter::Active);
        let params = filters.api_params().with_page(1, 20);

        let api = client(&url).with_token(Some("tok123"));
        let page: Page<Client> = api.list(&params).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name, "Ana");

        let request = rx.recv().unwrap();
        let first_line = request.lines().next().unwrap();
        assert!(first_line.starts_with("GET /clients?"));
        assert!(first_line.contains("search=ana"));
        assert!(first_line.contains("is_active=true"));
        assert!(first_line.contains("page=1"));
        assert!(first_line.contains("size=20"));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer tok123"));
    }

    #[test]
    fn test_remote_error_carries_detail() {
        let (url, _rx) = one_shot("400 Bad Request", r#"{"detail":"Email já cadastrado"}"#);
        let payload = ClientCreate {
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            is_active: true,
        };
        let err = client(&url).create::<Client>(&payload).unwrap_err();
        match err {
            CarteiraError::Remote { status, detail } => {
                assert_eq!(status, 400);
                assert_eq!(detail.as_deref(), Some("Email já cadastrado"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_invalid_payload_never_leaves_the_process() {
        // Nothing listens here; validation must fail before any connection.
        let api = client("http://127.0.0.1:9");
        let payload = ClientCreate {
            name: "A".to_string(),
            email: "nope".to_string(),
            is_active: true,
        };
        let err = api.create::<Client>(&payload).unwrap_err();
        assert!(matches!(err, CarteiraError::Validation(ref e) if e.len() == 2));
    }

    #[test]
    fn test_update_uses_put_with_partial_body() {
        let (url, rx) = one_shot(
            "200 OK",
            r#"{"id":3,"name":"Ana","email":"nova@example.com","is_active":true,"created_at":"2024-06-01"}"#,
        );
        let update = ClientUpdate {
            email: Some("nova@example.com".to_string()),
            ..ClientUpdate::default()
        };
        let updated: Client = client(&url).update(3, &update).unwrap();
        assert_eq!(updated.email, "nova@example.com");
        let request = rx.recv().unwrap();
        assert!(request.starts_with("PUT /clients/3 "));
        assert!(request.ends_with(r#"{"email":"nova@example.com"}"#));
    }

    #[test]
    fn test_delete_accepts_empty_body() {
        let (url, rx) = one_shot("204 No Content", "");
        client(&url).delete::<Asset>(9).unwrap();
        assert!(rx.recv().unwrap().starts_with("DELETE /assets/9 "));
    }

    #[test]
    fn test_toggle_client_uses_patch() {
        let (url, rx) = one_shot(
            "200 OK",
            r#"{"id":5,"name":"Bia","email":"bia@example.com","is_active":false,"created_at":"2024-06-01"}"#,
        );
        let c = client(&url).toggle_client_status(5).unwrap();
        assert!(!c.is_active);
        assert!(rx.recv().unwrap().starts_with("PATCH /clients/5/toggle "));
    }

    #[test]
    fn test_unauthorized_me() {
        let (url, _rx) = one_shot("401 Unauthorized", r#"{"detail":"Not authenticated"}"#);
        let err = client(&url).me().unwrap_err();
        assert!(err.is_unauthorized());
    }
}
