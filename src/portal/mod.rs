//! ReportPortal HTTP client
//!
//! One client instance serves a whole report cycle: it exchanges the stored
//! credentials for a bearer token, fetches launch pages per suite and walks
//! the paginated defect items of a launch. All network calls go through the
//! retry wrapper; transient failures are retried, everything else escalates
//! to the orchestrator.

pub mod defects;
pub mod launches;

use crate::config::{PortalConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::with_retry;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Fixed Basic header of ReportPortal's built-in UI client (`ui:uiman`),
/// required by the password grant
const UI_CLIENT_BASIC: &str = "Basic dWk6dWltYW4=";

const ACCEPT_JSON: &str = "application/json, text/plain, */*";

/// Client for one ReportPortal instance
#[derive(Debug)]
pub struct PortalClient {
    http: reqwest::Client,
    base_url: Url,
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

impl PortalClient {
    /// Create a client for the configured instance
    ///
    /// Certificate validation is disabled: the instance is an internal host
    /// with a self-signed certificate.
    pub fn new(config: &PortalConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("rp-digest")
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| Error::config(format!("failed to create HTTP client: {e}")))?;

        let base_url = Url::parse(&config.base_url).map_err(|e| Error::Config {
            message: format!("invalid ReportPortal URL {:?}: {e}", config.base_url),
            key: Some("REPORTPORTAL_URL".to_string()),
        })?;

        Ok(Self {
            http,
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// Base URL of the instance, used for deep links in the report
    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Exchange the stored credentials for a bearer token
    ///
    /// Wrapped in retry for transient network failures. A non-2xx response
    /// or a response body without `access_token` is an [`Error::Auth`] and
    /// is not retried.
    pub async fn acquire_token(&self, retry: &RetryConfig) -> Result<String> {
        with_retry(retry, || self.request_token()).await
    }

    async fn request_token(&self) -> Result<String> {
        let url = self.endpoint("uat/sso/oauth/token")?;
        let response = self
            .http
            .post(url)
            .header("Authorization", UI_CLIENT_BASIC)
            .header("Accept", ACCEPT_JSON)
            .form(&[
                ("grant_type", "password"),
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Auth(format!(
                "token endpoint returned HTTP {}",
                status.as_u16()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Auth(format!("token response was not valid JSON: {e}")))?;
        body.access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Auth("could not obtain access_token in response".to_string()))
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::config(format!("failed to build endpoint URL for {path:?}: {e}")))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn portal_config(base_url: &str) -> PortalConfig {
        PortalConfig {
            base_url: base_url.to_string(),
            username: "qa-bot".to_string(),
            password: "hunter2".to_string(),
        }
    }

    fn no_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 1,
            initial_delay: Duration::from_millis(1),
            ..RetryConfig::default()
        }
    }

    #[tokio::test]
    async fn acquire_token_sends_password_grant_and_returns_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/uat/sso/oauth/token"))
            .and(header("Authorization", UI_CLIENT_BASIC))
            .and(body_string_contains("grant_type=password"))
            .and(body_string_contains("username=qa-bot"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "tok-123"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = PortalClient::new(&portal_config(&server.uri())).unwrap();
        let token = client.acquire_token(&no_retry()).await.unwrap();
        assert_eq!(token, "tok-123");
    }

    #[tokio::test]
    async fn missing_access_token_field_is_an_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/uat/sso/oauth/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"token_type": "bearer"})),
            )
            .mount(&server)
            .await;

        let client = PortalClient::new(&portal_config(&server.uri())).unwrap();
        let err = client.acquire_token(&no_retry()).await.unwrap_err();
        match err {
            Error::Auth(reason) => assert!(reason.contains("could not obtain access_token")),
            other => panic!("expected Auth error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_2xx_token_response_is_an_auth_error_without_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/uat/sso/oauth/token"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let client = PortalClient::new(&portal_config(&server.uri())).unwrap();
        let retry = RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            ..RetryConfig::default()
        };
        let err = client.acquire_token(&retry).await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)), "got {err:?}");
    }

    #[test]
    fn invalid_base_url_is_rejected_at_construction() {
        let err = PortalClient::new(&portal_config("not a url")).unwrap_err();
        match err {
            Error::Config { key, .. } => assert_eq!(key.as_deref(), Some("REPORTPORTAL_URL")),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn base_url_has_no_trailing_slash_for_deep_links() {
        let client = PortalClient::new(&portal_config("https://rp.example.com")).unwrap();
        assert_eq!(client.base_url(), "https://rp.example.com");
    }
}
