use reqwest::{Method, Response, Url};
use serde_json::Value;
use std::time::Duration;

use super::{GoogleError, TokenGrant};

const DEFAULT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
const SCOPES: &str =
    "https://www.googleapis.com/auth/calendar.events https://www.googleapis.com/auth/calendar.readonly";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone)]
pub(crate) struct GoogleConfig {
    pub(crate) client_id: String,
    pub(crate) client_secret: String,
    pub(crate) redirect_uri: String,
    pub(crate) auth_url: String,
    pub(crate) token_url: String,
    pub(crate) api_base: String,
}

impl GoogleConfig {
    pub(crate) fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            auth_url: DEFAULT_AUTH_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

/// OAuth2 client plus raw access to the Calendar v3 API.
#[derive(Debug, Clone)]
pub(crate) struct GoogleClient {
    config: GoogleConfig,
    http: reqwest::Client,
}

impl GoogleClient {
    pub(crate) fn new(config: GoogleConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    /// The consent page url. Offline access with forced consent so Google hands out
    /// a refresh token every time.
    pub(crate) fn authorize_url(&self, state: &str) -> Result<String, GoogleError> {
        let url = Url::parse_with_params(
            &self.config.auth_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", SCOPES),
                ("access_type", "offline"),
                ("include_granted_scopes", "true"),
                ("prompt", "consent"),
                ("state", state),
            ],
        )
        .map_err(|e| GoogleError::InvalidUrl(e.to_string()))?;
        Ok(url.into())
    }

    pub(crate) async fn exchange_code(&self, code: &str) -> Result<TokenGrant, GoogleError> {
        let response = self
            .token_request(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .await?;
        if !response.status().is_success() {
            tracing::warn!("Google code exchange failed with {}", response.status());
            return Err(GoogleError::ExchangeFailed);
        }
        response.json().await.map_err(|_| GoogleError::ExchangeFailed)
    }

    pub(crate) async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, GoogleError> {
        let response = self
            .token_request(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .await
            .map_err(|e| {
                tracing::warn!("Google token refresh request failed: {}", e);
                GoogleError::RefreshFailed
            })?;
        if !response.status().is_success() {
            tracing::warn!("Google token refresh failed with {}", response.status());
            return Err(GoogleError::RefreshFailed);
        }
        response.json().await.map_err(|_| GoogleError::RefreshFailed)
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<Response, GoogleError> {
        Ok(self
            .http
            .post(&self.config.token_url)
            .timeout(REQUEST_TIMEOUT)
            .form(form)
            .send()
            .await?)
    }

    /// An API url built from path segments, each percent-encoded.
    pub(crate) fn api_url(&self, segments: &[&str]) -> Result<Url, GoogleError> {
        let mut url = Url::parse(self.config.api_base.trim_end_matches('/'))
            .map_err(|e| GoogleError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| GoogleError::InvalidUrl(self.config.api_base.clone()))?
            .extend(segments);
        Ok(url)
    }

    pub(crate) async fn send(
        &self,
        method: Method,
        url: Url,
        access_token: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Response, GoogleError> {
        let mut request = self
            .http
            .request(method, url)
            .bearer_auth(access_token)
            .timeout(REQUEST_TIMEOUT)
            .query(query);
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }
}

#[cfg(test)]
pub(crate) fn test_client(server: &httpmock::MockServer) -> GoogleClient {
    let mut config = GoogleConfig::new(
        "client-id".to_string(),
        "client-secret".to_string(),
        "http://localhost:8000/api/google/oauth/callback".to_string(),
    );
    config.auth_url = server.url("/auth");
    config.token_url = server.url("/token");
    config.api_base = server.url("/calendar/v3");
    GoogleClient::new(config, reqwest::Client::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;

    #[test]
    fn consent_url_asks_for_offline_access() {
        let server = MockServer::start();
        let url = test_client(&server).authorize_url("state-123").unwrap();
        let url = Url::parse(&url).unwrap();
        let params: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert!(params.contains(&("access_type".to_string(), "offline".to_string())));
        assert!(params.contains(&("prompt".to_string(), "consent".to_string())));
        assert!(params.contains(&("state".to_string(), "state-123".to_string())));
        assert!(params.contains(&("scope".to_string(), SCOPES.to_string())));
    }

    #[test]
    fn api_urls_escape_calendar_ids() {
        let server = MockServer::start();
        let url = test_client(&server)
            .api_url(&["calendars", "family#meals@group.calendar.google.com", "events"])
            .unwrap();
        assert!(url
            .path()
            .ends_with("/calendar/v3/calendars/family%23meals@group.calendar.google.com/events"));
    }

    #[tokio::test]
    async fn code_exchange_posts_the_form() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/token")
                    .body_contains("grant_type=authorization_code")
                    .body_contains("code=abc");
                then.status(200).json_body(json!({
                    "access_token": "access-1",
                    "refresh_token": "refresh-1",
                    "expires_in": 3599,
                    "token_type": "Bearer"
                }));
            })
            .await;

        let grant = test_client(&server).exchange_code("abc").await.unwrap();
        assert_eq!(grant.access_token.as_deref(), Some("access-1"));
        assert_eq!(grant.refresh_token.as_deref(), Some("refresh-1"));
        assert_eq!(grant.expires_in, Some(3599));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_exchange_is_a_gateway_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(400).json_body(json!({"error": "invalid_grant"}));
            })
            .await;

        let err = test_client(&server).exchange_code("abc").await.unwrap_err();
        assert!(matches!(err, GoogleError::ExchangeFailed));
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_GATEWAY);
    }
}
