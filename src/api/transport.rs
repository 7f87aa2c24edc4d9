//! Raw HTTP access to the remote API.
//!
//! The transport knows nothing about quotas; it sends one GET with one credential and
//! classifies the response.

use super::credentials::Credential;
use super::endpoint::Endpoint;
use super::quota::QuotaState;
use crate::Result;
use chrono::{DateTime, Utc};
use core::time::Duration;
use ohno::app_err;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Media type requested from the API. The preview type exposes commit ids on timeline events.
const ACCEPT_MEDIA_TYPE: &str = "application/vnd.github.mockingbird-preview+json";

/// Result of a single API call
#[derive(Debug)]
pub enum ApiResult<T> {
    /// Request succeeded
    Success(T),

    /// The remote rejected the credential with HTTP 403 (quota exceeded)
    QuotaExceeded(Option<QuotaState>),

    /// Request failed for any other reason (network error or non-2xx status)
    Failed(ohno::AppError),
}

/// Shape of the quota-status endpoint response.
#[derive(Debug, Deserialize)]
struct RateLimitResponse {
    resources: RateLimitResources,
}

#[derive(Debug, Deserialize)]
struct RateLimitResources {
    core: RateLimitCore,
}

#[derive(Debug, Deserialize)]
struct RateLimitCore {
    remaining: u64,
    reset: i64,
}

/// Error body returned by the API on failure
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// HTTP transport bound to one API base URL.
#[derive(Debug, Clone)]
#[expect(clippy::struct_field_names, reason = "client field stores the underlying HTTP client")]
pub struct Transport {
    client: reqwest::Client,
    base_url: Arc<str>,
}

impl Transport {
    /// Create a transport for `base_url`.
    pub fn new(base_url: impl AsRef<str>, user_agent: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_MEDIA_TYPE));

        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: Arc::from(base_url.as_ref().trim_end_matches('/')),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a GET for `endpoint` authenticated with `credential`.
    pub async fn get(&self, endpoint: &Endpoint, credential: &Credential) -> Result<reqwest::Response> {
        let mut auth_val = HeaderValue::from_str(&format!("token {}", credential.token()))?;
        auth_val.set_sensitive(true);

        let resp = self.client.get(endpoint.url(&self.base_url)).header(AUTHORIZATION, auth_val).send().await?;
        Ok(resp)
    }

    /// Send a GET and decode the JSON payload, classifying the outcome.
    pub async fn get_json(&self, endpoint: &Endpoint, credential: &Credential) -> ApiResult<Value> {
        let resp = match self.get(endpoint, credential).await {
            Ok(r) => r,
            Err(e) => return ApiResult::Failed(app_err!("GET {endpoint} failed: {e}")),
        };

        let status = resp.status();
        if status.is_success() {
            return match resp.json().await {
                Ok(value) => ApiResult::Success(value),
                Err(e) => ApiResult::Failed(app_err!("GET {endpoint} returned malformed JSON: {e}")),
            };
        }

        if status == StatusCode::FORBIDDEN {
            return ApiResult::QuotaExceeded(extract_rate_limit_from_headers(resp.headers()));
        }

        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body).map_or(body, |b| b.message);
        ApiResult::Failed(app_err!("GET {endpoint} failed with HTTP {}: {message}", status.as_u16()))
    }

    /// Fetch the authoritative quota for `credential` from the quota-status endpoint.
    ///
    /// Quota-status requests do not count against the quota.
    pub async fn fetch_quota(&self, credential: &Credential) -> Result<QuotaState> {
        let endpoint = Endpoint::parse("/rate_limit");
        let resp = self.get(&endpoint, credential).await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(app_err!("quota status request failed with HTTP {}", status.as_u16()));
        }

        let body: RateLimitResponse = resp.json().await?;
        let reset_at = DateTime::from_timestamp(body.resources.core.reset, 0)
            .ok_or_else(|| app_err!("invalid quota reset timestamp {}", body.resources.core.reset))?;

        Ok(QuotaState {
            remaining: body.resources.core.remaining,
            reset_at,
        })
    }
}

/// Extract rate limit information from API response headers
fn extract_rate_limit_from_headers(headers: &HeaderMap) -> Option<QuotaState> {
    let remaining = headers.get("x-ratelimit-remaining")?.to_str().ok()?.parse::<u64>().ok()?;

    let reset_timestamp = headers.get("x-ratelimit-reset")?.to_str().ok()?.parse::<i64>().ok()?;

    let reset_at: DateTime<Utc> = DateTime::from_timestamp(reset_timestamp, 0)?;

    Some(QuotaState { remaining, reset_at })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_response_deserialize() {
        let json = r#"{
            "resources": {
                "core": { "limit": 5000, "remaining": 4999, "reset": 1704067200, "used": 1 },
                "search": { "limit": 30, "remaining": 30, "reset": 1704067200, "used": 0 }
            },
            "rate": { "limit": 5000, "remaining": 4999, "reset": 1704067200, "used": 1 }
        }"#;

        let response: RateLimitResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.resources.core.remaining, 4999);
        assert_eq!(response.resources.core.reset, 1_704_067_200);
    }

    #[test]
    fn test_error_body_deserialize() {
        let body: ErrorBody = serde_json::from_str(r#"{"message": "Not Found", "documentation_url": "x"}"#).unwrap();
        assert_eq!(body.message, "Not Found");
    }

    #[test]
    fn test_extract_rate_limit_from_headers() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        let _ = headers.insert("x-ratelimit-reset", HeaderValue::from_static("1704067200"));

        let quota = extract_rate_limit_from_headers(&headers).unwrap();
        assert_eq!(quota.remaining, 0);
        assert_eq!(quota.reset_at.timestamp(), 1_704_067_200);
    }

    #[test]
    fn test_extract_rate_limit_missing_headers() {
        assert!(extract_rate_limit_from_headers(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_extract_rate_limit_invalid_remaining() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert("x-ratelimit-remaining", HeaderValue::from_static("lots"));
        let _ = headers.insert("x-ratelimit-reset", HeaderValue::from_static("1704067200"));
        assert!(extract_rate_limit_from_headers(&headers).is_none());
    }

    #[test]
    fn test_transport_trims_base_url() {
        let transport = Transport::new("http://localhost:9/", "tests", Duration::from_secs(1)).unwrap();
        assert_eq!(transport.base_url(), "http://localhost:9");
    }
}
