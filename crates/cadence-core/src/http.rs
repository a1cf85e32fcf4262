//! Thin helpers shared by the backend clients: client construction and
//! status/body checking for JSON calls.

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ApiError;

/// Owner identity header understood by the backend.
pub const USER_HEADER: &str = "currentUserId";
pub const ADMIN_HEADER: &str = "isAdmin";

pub fn build_client(timeout: Duration) -> reqwest::Client {
    let mut headers = HeaderMap::new();
    // Tunnelled dev backends answer with an HTML interstitial without this.
    headers.insert(
        "ngrok-skip-browser-warning",
        HeaderValue::from_static("true"),
    );
    headers.insert("Accept", HeaderValue::from_static("application/json"));

    reqwest::Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .unwrap_or_else(|e| {
            warn!("http: falling back to default client: {}", e);
            reqwest::Client::new()
        })
}

async fn send_checked(req: RequestBuilder, url: &str) -> Result<reqwest::Response, ApiError> {
    debug!("http: {}", url);
    let response = req.send().await.map_err(|source| ApiError::Network {
        url: url.to_string(),
        source,
    })?;

    if !response.status().is_success() {
        return Err(ApiError::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }
    Ok(response)
}

/// Send and decode a JSON body into `T`.
pub(crate) async fn send_json<T: DeserializeOwned>(
    req: RequestBuilder,
    url: &str,
) -> Result<T, ApiError> {
    let response = send_checked(req, url).await?;
    let bytes = response.bytes().await.map_err(|source| ApiError::Network {
        url: url.to_string(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// Send and ignore whatever body comes back.
pub(crate) async fn send_empty(req: RequestBuilder, url: &str) -> Result<(), ApiError> {
    send_checked(req, url).await?;
    Ok(())
}
