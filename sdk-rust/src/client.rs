use crate::{
    api::{
        ApiContext, AuthResponse, DevJwtRequest, MagicLinkRequest, PersonasResponse,
        ValidateTokenRequest,
    },
    client_utils,
    opentelemetry::trace_request,
    ApiError, ApiResult, Persona, VeemeeApi,
};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION},
    Client,
};
use serde_json::Value;
use std::collections::HashMap;

const PROVIDER: &str = "veemee";
pub const DEFAULT_BASE_URL: &str = "https://veemee.onrender.com";
/// Environment variable overriding the API base URL.
pub const BASE_URL_ENV: &str = "VEEMEE_API_BASE";
const MAGIC_LINK_PLATFORM: &str = "mobile";

#[derive(Clone, Default)]
pub struct VeemeeClientOptions {
    pub base_url: Option<String>,
    /// Extra headers sent with every request.
    pub headers: Option<HashMap<String, String>>,
    /// A preconfigured client, e.g. with a request timeout.
    pub client: Option<Client>,
}

impl VeemeeClientOptions {
    /// Options with the base URL taken from `VEEMEE_API_BASE` when set.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var(BASE_URL_ENV)
                .ok()
                .filter(|value| !value.trim().is_empty()),
            ..Self::default()
        }
    }
}

/// HTTP implementation of [`VeemeeApi`].
#[derive(Clone)]
pub struct VeemeeClient {
    base_url: String,
    client: Client,
    headers: HashMap<String, String>,
}

impl VeemeeClient {
    #[must_use]
    pub fn new(mut options: VeemeeClientOptions) -> Self {
        let base_url = options
            .base_url
            .take()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let client = options.client.take().unwrap_or_default();

        let headers = options.headers.unwrap_or_default();

        Self {
            base_url,
            client,
            headers,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request_headers(&self) -> ApiResult<HeaderMap> {
        let mut headers = HeaderMap::new();

        for (key, value) in &self.headers {
            let header_name = HeaderName::from_bytes(key.as_bytes()).map_err(|error| {
                ApiError::InvalidInput(format!("Invalid header name '{key}': {error}"))
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|error| {
                ApiError::InvalidInput(format!("Invalid header value for '{key}': {error}"))
            })?;
            headers.insert(header_name, header_value);
        }

        Ok(headers)
    }

    fn bearer_headers(&self, token: &str) -> ApiResult<HeaderMap> {
        let mut headers = self.request_headers()?;
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).map_err(|error| {
                ApiError::InvalidInput(format!("Invalid bearer token header value: {error}"))
            })?,
        );
        Ok(headers)
    }
}

#[async_trait::async_trait]
impl VeemeeApi for VeemeeClient {
    async fn list_contexts(&self, token: &str) -> ApiResult<Vec<ApiContext>> {
        let path = "/api/contexts";
        trace_request("list_contexts", "GET", path, async {
            let headers = self.bearer_headers(token)?;
            let body: Value = client_utils::get_json(&self.client, &self.url(path), headers).await?;

            let contexts = body
                .get("contexts")
                .filter(|contexts| contexts.is_array())
                .cloned()
                .ok_or_else(|| {
                    ApiError::Invariant(PROVIDER, "response has no contexts array".to_string())
                })?;

            serde_json::from_value(contexts).map_err(|error| {
                ApiError::Invariant(PROVIDER, format!("Failed to parse contexts: {error}"))
            })
        })
        .await
    }

    async fn list_personas(&self, token: &str, context_id: i64) -> ApiResult<Vec<Persona>> {
        let path = format!("/api/contexts/{context_id}/personas");
        trace_request("list_personas", "GET", &path, async {
            let headers = self.bearer_headers(token)?;
            let response: PersonasResponse =
                client_utils::get_json(&self.client, &self.url(&path), headers).await?;
            Ok(response.personas)
        })
        .await
    }

    async fn issue_dev_jwt(&self, api_key: &str, email: &str) -> ApiResult<String> {
        let path = "/api/auth/dev-jwt";
        trace_request("issue_dev_jwt", "POST", path, async {
            let mut headers = self.request_headers()?;
            headers.insert(
                "x-api-key",
                HeaderValue::from_str(api_key).map_err(|error| {
                    ApiError::InvalidInput(format!("Invalid API key header value: {error}"))
                })?,
            );

            let response: AuthResponse = client_utils::send_json(
                &self.client,
                &self.url(path),
                &DevJwtRequest {
                    email: email.to_string(),
                },
                headers,
            )
            .await
            .map_err(client_utils::auth_error)?;

            response.jwt.ok_or_else(|| {
                ApiError::Auth(response.error.unwrap_or_else(|| "dev-jwt failed".to_string()))
            })
        })
        .await
    }

    async fn send_magic_link(&self, email: &str) -> ApiResult<()> {
        let path = "/api/auth/magic-link";
        trace_request("send_magic_link", "POST", path, async {
            let _: Value = client_utils::send_json(
                &self.client,
                &self.url(path),
                &MagicLinkRequest {
                    email: email.to_string(),
                    platform: MAGIC_LINK_PLATFORM.to_string(),
                },
                self.request_headers()?,
            )
            .await
            .map_err(client_utils::auth_error)?;
            Ok(())
        })
        .await
    }

    async fn validate_magic_link(&self, token: &str) -> ApiResult<String> {
        let path = "/api/auth/validate";
        trace_request("validate_magic_link", "POST", path, async {
            let response: AuthResponse = client_utils::send_json(
                &self.client,
                &self.url(path),
                &ValidateTokenRequest {
                    token: token.to_string(),
                },
                self.request_headers()?,
            )
            .await
            .map_err(client_utils::auth_error)?;

            response.jwt.ok_or_else(|| {
                ApiError::Auth(
                    response
                        .error
                        .unwrap_or_else(|| "Login failed or token expired.".to_string()),
                )
            })
        })
        .await
    }
}
