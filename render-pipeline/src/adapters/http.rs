use std::time::Duration;

use common::error::AppError;
use reqwest::{RequestBuilder, Response, StatusCode};

/// Remote services may take a while to produce media, but never indefinitely.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

pub fn build_client() -> Result<reqwest::Client, AppError> {
    Ok(reqwest::ClientBuilder::new()
        .timeout(REQUEST_TIMEOUT)
        .build()?)
}

pub fn with_bearer(request: RequestBuilder, api_key: Option<&str>) -> RequestBuilder {
    match api_key {
        Some(key) => request.bearer_auth(key),
        None => request,
    }
}

/// Whether a status means "try again later" rather than "this request is wrong".
pub fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Passes successful responses through and turns the rest into errors carrying the body.
pub async fn check_status(response: Response, service: &str) -> Result<Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = format!("{service} returned {status}: {body}");
    if is_retryable_status(status) {
        Err(AppError::Unavailable(message))
    } else {
        Err(AppError::Processing(message))
    }
}
