use crate::{ApiError, ApiResult};
use opentelemetry::trace::Status;
use std::{future::Future, time::Instant};
use tracing::{info_span, Span};
use tracing_futures::Instrument;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Span wrapping a single call to the Veemee API.
pub struct ApiSpan {
    span: Span,
    start_time: Instant,
}

impl ApiSpan {
    pub fn new(operation: &'static str, method: &'static str, path: &str) -> Self {
        let span = info_span!("veemee_sdk.request", operation, method, path);
        span.set_attribute("veemee.operation", operation);
        span.set_attribute("http.request.method", method);
        span.set_attribute("url.path", path.to_string());

        Self {
            span,
            start_time: Instant::now(),
        }
    }

    fn span(&self) -> Span {
        self.span.clone()
    }

    pub fn on_error(&mut self, error: &ApiError) {
        self.span
            .set_attribute("exception.message", error.to_string());
        self.span.set_status(Status::error(error.to_string()));
    }

    pub fn on_end(&mut self) {
        self.span.set_attribute(
            "veemee.duration_ms",
            i64::try_from(self.start_time.elapsed().as_millis()).unwrap_or(i64::MAX),
        );
    }
}

/// Run an API call inside an [`ApiSpan`], recording failures on the span.
pub async fn trace_request<T, Fut>(
    operation: &'static str,
    method: &'static str,
    path: &str,
    future: Fut,
) -> ApiResult<T>
where
    Fut: Future<Output = ApiResult<T>>,
{
    let mut span = ApiSpan::new(operation, method, path);
    let result = future.instrument(span.span()).await;

    if let Err(error) = &result {
        span.on_error(error);
        tracing::debug!(parent: &span.span, %error, "veemee request failed");
    }

    span.on_end();
    result
}
