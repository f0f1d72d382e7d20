//! Intuit OAuth2 client.
//!
//! Implements the core `AuthorizationClient` port: authorization URL for
//! the connect flow, code exchange, and the refresh exchange that rotates
//! the refresh token on every use. The token endpoint's response shape
//! varies across Intuit SDK versions in how it names the refresh-token
//! lifetime; [`TokenEndpointResponse`] maps every known spelling onto the
//! one normalized [`TokenExchangeResult`].

use async_trait::async_trait;
use billbridge_core::auth::AuthorizationClient;
use billbridge_domain::{QuickBooksConfig, Result, SyncError, TokenExchangeResult};
use reqwest::{header, Method, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::errors::InfraError;
use crate::http::HttpClient;

const AUTHORIZE_URL: &str = "https://appcenter.intuit.com/connect/oauth2";
const TOKEN_URL: &str = "https://oauth.platform.intuit.com/oauth2/v1/tokens/bearer";
const ACCOUNTING_SCOPE: &str = "com.intuit.quickbooks.accounting";

/// OAuth2 client for Intuit's authorization server.
pub struct IntuitAuthClient {
    http: HttpClient,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    token_url: String,
}

impl IntuitAuthClient {
    /// Create a client from the QuickBooks application settings.
    #[must_use]
    pub fn new(http: HttpClient, config: &QuickBooksConfig) -> Self {
        Self {
            http,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            token_url: TOKEN_URL.to_string(),
        }
    }

    #[cfg(test)]
    fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenExchangeResult> {
        let request = self
            .http
            .request(Method::POST, &self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(header::ACCEPT, "application/json")
            .form(form);

        // Token exchanges rotate server-side state; never replay them
        // blindly.
        let response = self.http.send_once(request).await?;
        let response = classify_response(response).await?;
        let parsed: TokenEndpointResponse = response.json().await.map_err(InfraError::from)?;
        debug!(
            access_expires_in = parsed.expires_in,
            refresh_expires_in = parsed.refresh_expires_in,
            "token exchange completed"
        );
        Ok(parsed.into())
    }
}

#[async_trait]
impl AuthorizationClient for IntuitAuthClient {
    fn authorization_url(&self, state: &str) -> String {
        format!(
            "{AUTHORIZE_URL}?client_id={}&response_type=code&scope={}&redirect_uri={}&state={}",
            urlencoding::encode(&self.client_id),
            urlencoding::encode(ACCOUNTING_SCOPE),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(state),
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenExchangeResult> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &self.redirect_uri),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenExchangeResult> {
        self.token_request(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token)])
            .await
    }
}

/// Raw token endpoint response.
///
/// The refresh-token lifetime arrives under different names depending on
/// the SDK era; every spelling is accepted here and nowhere else.
#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    #[serde(
        default,
        alias = "x_refresh_token_expires_in",
        alias = "refresh_token_expires_in"
    )]
    refresh_expires_in: Option<i64>,
}

impl From<TokenEndpointResponse> for TokenExchangeResult {
    fn from(response: TokenEndpointResponse) -> Self {
        Self {
            access_token: response.access_token,
            access_expires_in: response.expires_in,
            refresh_token: response.refresh_token,
            refresh_expires_in: response.refresh_expires_in,
        }
    }
}

async fn classify_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Err(SyncError::Transient(format!("authorization server returned {status}: {body}")))
    } else {
        Err(SyncError::Validation(format!(
            "authorization server rejected the request ({status}): {body}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use billbridge_domain::{Environment, ErrorKind};
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config() -> QuickBooksConfig {
        QuickBooksConfig {
            client_id: "client-id".into(),
            client_secret: "client-secret".into(),
            redirect_uri: "http://localhost:8080/qbo/callback".into(),
            environment: Environment::Sandbox,
        }
    }

    fn client(server: &MockServer) -> IntuitAuthClient {
        let http = HttpClient::builder()
            .base_backoff(std::time::Duration::from_millis(5))
            .build()
            .expect("http client");
        IntuitAuthClient::new(http, &config())
            .with_token_url(format!("{}/oauth2/v1/tokens/bearer", server.uri()))
    }

    #[test]
    fn authorization_url_carries_encoded_parameters() {
        let http = HttpClient::new().expect("http client");
        let auth = IntuitAuthClient::new(http, &config());

        let url = auth.authorization_url("csrf-state-1");

        assert!(url.starts_with("https://appcenter.intuit.com/connect/oauth2?"));
        assert!(url.contains("client_id=client-id"));
        assert!(url.contains("scope=com.intuit.quickbooks.accounting"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fqbo%2Fcallback"));
        assert!(url.contains("state=csrf-state-1"));
    }

    #[tokio::test]
    async fn refresh_normalizes_intuit_field_names() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/v1/tokens/bearer"))
            .and(header_exists("authorization"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=RT-0"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{
                    "access_token": "AT-1",
                    "refresh_token": "RT-1",
                    "token_type": "bearer",
                    "expires_in": 3600,
                    "x_refresh_token_expires_in": 8640000
                }"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server).refresh("RT-0").await.expect("exchange");

        assert_eq!(result.access_token, "AT-1");
        assert_eq!(result.refresh_token, "RT-1");
        assert_eq!(result.access_expires_in, 3600);
        assert_eq!(result.refresh_expires_in, Some(8_640_000));
    }

    #[tokio::test]
    async fn alternate_refresh_lifetime_spelling_is_accepted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{
                    "access_token": "AT-2",
                    "refresh_token": "RT-2",
                    "expires_in": 3600,
                    "refresh_token_expires_in": 7776000
                }"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let result = client(&server).refresh("RT-1").await.expect("exchange");
        assert_eq!(result.refresh_expires_in, Some(7_776_000));
    }

    #[tokio::test]
    async fn exchange_code_sends_authorization_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=auth-code-9"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"access_token": "AT", "refresh_token": "RT", "expires_in": 3600}"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server).exchange_code("auth-code-9").await.expect("exchange");
        assert_eq!(result.refresh_expires_in, None);
    }

    #[tokio::test]
    async fn invalid_grant_is_validation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_raw(r#"{"error": "invalid_grant"}"#, "application/json"),
            )
            .mount(&server)
            .await;

        let err = client(&server).refresh("RT-stale").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("invalid_grant"));
    }

    #[tokio::test]
    async fn server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client(&server).refresh("RT-0").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);
    }
}
