use crate::error::ClassifierError;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

use super::logging::{log_request, log_response};

/// POST `body` as JSON and decode the reply as `R`
///
/// `auth` is an optional `(header, value)` pair; its value is never logged.
pub(crate) async fn post_json<B, R>(
    client: &Client,
    url: &str,
    body: &B,
    auth: Option<(&str, String)>,
    timeout_secs: u64,
) -> Result<R, ClassifierError>
where
    B: Serialize,
    R: DeserializeOwned,
{
    log_request(body);

    let mut request = client
        .post(url)
        .json(body)
        .timeout(Duration::from_secs(timeout_secs));
    if let Some((header, value)) = auth {
        log::debug!("{header} header: [REDACTED]");
        request = request.header(header, value);
    }

    let response = ensure_success(send(request, timeout_secs).await?).await?;
    let text = response.text().await?;
    log_response(&text);

    serde_json::from_str(&text)
        .map_err(|e| ClassifierError::InvalidResponse(format!("Failed to parse response: {e}")))
}

/// Send a request, turning client-side timeouts into [`ClassifierError::Timeout`]
async fn send(
    request: RequestBuilder,
    timeout_secs: u64,
) -> Result<Response, ClassifierError> {
    request.send().await.map_err(|e| {
        if e.is_timeout() {
            ClassifierError::Timeout(timeout_secs)
        } else {
            ClassifierError::Http(e)
        }
    })
}

/// Map non-success statuses to errors, passing successful responses through
async fn ensure_success(response: Response) -> Result<Response, ClassifierError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ClassifierError::AuthenticationFailed(format!(
            "HTTP {}: invalid or missing API key",
            status.as_u16()
        )));
    }

    let error_body = response.text().await.unwrap_or_default();

    // Let the API's error message speak for itself
    Err(ClassifierError::Service(format!(
        "HTTP {} {}: {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown error"),
        if error_body.is_empty() {
            "No details provided"
        } else {
            &error_body
        }
    )))
}
