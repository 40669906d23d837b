use chrono::NaiveDateTime;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::ImportError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PfmCategory {
    pub id: String,
    pub name: String,
}

/// Transaction envelope as returned by the card account API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTransaction {
    pub transaction_id: String,
    pub date: NaiveDateTime,
    /// Debits are positive.
    pub amount: Decimal,
    pub currency: String,
    #[serde(default)]
    pub merchant_name: Option<String>,
    #[serde(default)]
    pub pretty_name: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub pfm_category: Option<PfmCategory>,
    #[serde(default)]
    pub state_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPage {
    #[serde(default)]
    pub total_count: Option<usize>,
    #[serde(default)]
    pub transactions: Vec<ApiTransaction>,
}

/// Paged, newest-first access to one account's transactions.
pub trait AccountApi {
    fn fetch_page(&self, account_id: &str, offset: usize, limit: usize)
        -> Result<ApiPage, ImportError>;
}

impl<T: AccountApi + ?Sized> AccountApi for &T {
    fn fetch_page(
        &self,
        account_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<ApiPage, ImportError> {
        (**self).fetch_page(account_id, offset, limit)
    }
}

/// Username and password supplied by the caller.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    /// Unset means the client default.
    pub timeout: Option<Duration>,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        ApiConfig {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn login_url(&self) -> String {
        format!("{}/login", self.base_url)
    }

    pub fn transactions_url(&self, account_id: &str) -> String {
        format!("{}/accounts/{}/transactions", self.base_url, account_id)
    }
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

/// Blocking HTTP client holding an authorised session.
pub struct HttpAccountApi {
    client: reqwest::blocking::Client,
    config: ApiConfig,
    token: String,
}

impl fmt::Debug for HttpAccountApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpAccountApi")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn build_client(config: &ApiConfig) -> Result<reqwest::blocking::Client, ImportError> {
    let mut builder = reqwest::blocking::Client::builder();
    if let Some(timeout) = config.timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

fn check_status(status: StatusCode, what: &str) -> Result<(), ImportError> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ImportError::Authentication(format!("{what} rejected with {status}")));
    }
    if !status.is_success() {
        return Err(ImportError::SourceUnavailable(format!("{what} failed with {status}")));
    }
    Ok(())
}

impl HttpAccountApi {
    /// One-shot login. No retries.
    pub fn login(config: ApiConfig, credentials: &Credentials) -> Result<Self, ImportError> {
        let client = build_client(&config)?;
        let response = client.post(config.login_url()).json(credentials).send()?;
        check_status(response.status(), "login")?;
        let body: LoginResponse = response
            .json()
            .map_err(|e| ImportError::UnsupportedFormat(format!("login response: {e}")))?;
        tracing::info!(user = %credentials.username, "Logged in to account API");
        Ok(HttpAccountApi {
            client,
            config,
            token: body.token,
        })
    }

    /// Uses a session token obtained elsewhere.
    pub fn with_token(config: ApiConfig, token: impl Into<String>) -> Result<Self, ImportError> {
        Ok(HttpAccountApi {
            client: build_client(&config)?,
            config,
            token: token.into(),
        })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }
}

impl AccountApi for HttpAccountApi {
    fn fetch_page(
        &self,
        account_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<ApiPage, ImportError> {
        let response = self
            .client
            .get(self.config.transactions_url(account_id))
            .bearer_auth(&self.token)
            .query(&[("offset", offset), ("pagesize", limit)])
            .send()?;
        check_status(response.status(), "transaction fetch")?;
        response
            .json()
            .map_err(|e| ImportError::UnsupportedFormat(format!("transaction page: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_parses_camel_case() {
        let json = r#"{
            "totalCount": 2,
            "transactions": [
                {
                    "transactionId": "t1",
                    "date": "2025-03-02T12:15:00",
                    "amount": 42.5,
                    "currency": "CHF",
                    "merchantName": "Coop",
                    "prettyName": "Coop Pronto",
                    "details": "COOP PRONTO ZUERICH",
                    "pfmCategory": { "id": "cv_supermarket", "name": "Supermarket" },
                    "stateType": "booked"
                },
                {
                    "transactionId": "t2",
                    "date": "2025-03-01T08:00:00",
                    "amount": 7,
                    "currency": "EUR"
                }
            ]
        }"#;
        let page: ApiPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.total_count, Some(2));
        let first = &page.transactions[0];
        assert_eq!(first.amount, Decimal::new(425, 1));
        assert_eq!(first.pfm_category.as_ref().unwrap().name, "Supermarket");
        assert_eq!(page.transactions[1].merchant_name, None);
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let creds = Credentials::new("anna", "hunter2");
        let shown = format!("{creds:?}");
        assert!(shown.contains("anna"));
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn urls_trim_trailing_slash() {
        let config = ApiConfig::new("https://api.example.ch/v1/");
        assert_eq!(config.login_url(), "https://api.example.ch/v1/login");
        assert_eq!(
            config.transactions_url("0000ABCD"),
            "https://api.example.ch/v1/accounts/0000ABCD/transactions"
        );
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            check_status(StatusCode::UNAUTHORIZED, "login"),
            Err(ImportError::Authentication(_))
        ));
        assert!(matches!(
            check_status(StatusCode::FORBIDDEN, "login"),
            Err(ImportError::Authentication(_))
        ));
        assert!(matches!(
            check_status(StatusCode::BAD_GATEWAY, "login"),
            Err(ImportError::SourceUnavailable(_))
        ));
        assert!(check_status(StatusCode::OK, "login").is_ok());
    }

    #[test]
    fn login_to_unreachable_host_is_source_unavailable() {
        let config = ApiConfig::new("http://127.0.0.1:9").with_timeout(Duration::from_millis(500));
        let err = HttpAccountApi::login(config, &Credentials::new("a", "b")).unwrap_err();
        assert!(matches!(err, ImportError::SourceUnavailable(_)));
    }
}
