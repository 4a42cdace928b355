use crate::ApiError;
use reqwest::{header::HeaderMap, Client, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Send a GET request, parse the JSON response.
/// Throws error on non OK status code.
pub async fn get_json<R: DeserializeOwned>(
    client: &Client,
    url: &str,
    headers: HeaderMap,
) -> Result<R, ApiError> {
    let response = client.get(url).headers(headers).send().await?;
    Ok(ensure_success(response).await?.json::<R>().await?)
}

/// Create a JSON request, parse the response.
/// Throws error on non OK status code.
pub async fn send_json<T: Serialize, R: DeserializeOwned>(
    client: &Client,
    url: &str,
    data: &T,
    headers: HeaderMap,
) -> Result<R, ApiError> {
    let response = client.post(url).headers(headers).json(data).send().await?;
    Ok(ensure_success(response).await?.json::<R>().await?)
}

/// Records the status on the current request span, then fails on non 2xx.
async fn ensure_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    Span::current().set_attribute("http.response.status_code", i64::from(status.as_u16()));
    if status.is_success() {
        Ok(response)
    } else {
        Err(ApiError::StatusCode(
            status,
            response.text().await.unwrap_or_default(),
        ))
    }
}

/// Turn a failed auth call into a readable error: the `error` field of the
/// JSON body when there is one, `HTTP {status}` otherwise.
pub fn auth_error(error: ApiError) -> ApiError {
    match error {
        ApiError::StatusCode(status, body) => {
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|value| value.get("error")?.as_str().map(str::to_string))
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            ApiError::Auth(message)
        }
        other => other,
    }
}
