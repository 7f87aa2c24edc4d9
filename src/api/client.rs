use super::call_stats::{CallStats, CallTopic};
use super::credentials::{Credential, CredentialPool};
use super::endpoint::Endpoint;
use super::quota::QuotaTracker;
use super::transport::{ApiResult, Transport};
use crate::Result;
use crate::config::{Config, PAGE_SIZE};
use ohno::{IntoAppError, app_err};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

const LOG_TARGET: &str = "       api";

/// Quota-aware client for the remote API.
///
/// Every call is authorized by the [`QuotaTracker`] first. A 403 response rotates to another
/// credential and retries the request exactly once; any other failure is returned as is.
///
/// Cloning is cheap and clones share the tracker and the statistics.
#[derive(Debug, Clone)]
pub struct ApiClient {
    transport: Transport,
    tracker: Arc<QuotaTracker>,
    stats: CallStats,
}

impl ApiClient {
    /// Create a client with its own tracker over all configured credentials.
    pub fn new(config: &Config) -> Result<Self> {
        let pool = CredentialPool::new(&config.credentials)?;
        Self::with_pool(config, pool)
    }

    /// Create a client with its own tracker over `pool`.
    pub fn with_pool(config: &Config, pool: CredentialPool) -> Result<Self> {
        let transport = Transport::new(&config.api_base_url, &config.user_agent, config.request_timeout)?;
        let stats = CallStats::new();
        let tracker = Arc::new(QuotaTracker::new(transport.clone(), pool, stats.clone()));
        Ok(Self { transport, tracker, stats })
    }

    #[must_use]
    pub const fn tracker(&self) -> &Arc<QuotaTracker> {
        &self.tracker
    }

    #[must_use]
    pub const fn stats(&self) -> &CallStats {
        &self.stats
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    /// Issue a single GET and return the decoded JSON payload.
    ///
    /// # Errors
    ///
    /// Network failures and non-2xx statuses other than 403 are returned without retrying. A 403
    /// is retried once with a rotated credential; a second 403 is returned as an error.
    pub async fn call(&self, endpoint: impl Into<Endpoint>) -> Result<Value> {
        let endpoint = endpoint.into();
        let credential = self.tracker.ensure_allowed().await?;

        match self.send(&endpoint, &credential).await {
            ApiResult::Success(value) => Ok(value),
            ApiResult::QuotaExceeded(reported) => {
                log::warn!(target: LOG_TARGET, "GET {endpoint} rejected with HTTP 403, rotating credentials and retrying once");
                let credential = self.tracker.rotate_after_rejection(&credential, reported).await?;

                match self.send(&endpoint, &credential).await {
                    ApiResult::Success(value) => Ok(value),
                    ApiResult::QuotaExceeded(_) => Err(app_err!("GET {endpoint} rejected with HTTP 403 after rotating credentials")),
                    ApiResult::Failed(e) => Err(e),
                }
            }
            ApiResult::Failed(e) => Err(e),
        }
    }

    /// Issue a single GET and deserialize the payload into `T`.
    pub async fn call_json<T: DeserializeOwned>(&self, endpoint: impl Into<Endpoint>) -> Result<T> {
        let endpoint = endpoint.into();
        let value = self.call(endpoint.clone()).await?;
        serde_json::from_value(value).into_app_err_with(|| format!("decoding the response of GET {endpoint}"))
    }

    /// Fetch every page of `endpoint` and return all items in fetch order.
    pub async fn paginated_call(&self, endpoint: impl Into<Endpoint>) -> Result<Vec<Value>> {
        self.paginated_call_with(endpoint, |_| Ok(())).await
    }

    /// Fetch every page of `endpoint`, calling `on_item` once per item in fetch order.
    ///
    /// Pages are requested with `page=1, 2, ...` and `per_page=100` appended to the endpoint's
    /// query until a page comes back empty. Failures of `on_item` are logged and do not stop
    /// pagination. Each invocation starts again from page 1.
    pub async fn paginated_call_with<F>(&self, endpoint: impl Into<Endpoint>, mut on_item: F) -> Result<Vec<Value>>
    where
        F: FnMut(&Value) -> Result<()> + Send,
    {
        let endpoint = endpoint.into();
        let mut items = Vec::new();
        let mut page = 1u32;

        loop {
            let page_endpoint = endpoint.page(page, PAGE_SIZE);
            let payload = self.call(page_endpoint.clone()).await?;
            self.stats.record(CallTopic::Page);

            let page_items = page_items(payload).ok_or_else(|| app_err!("GET {page_endpoint} did not return a list of items"))?;
            if page_items.is_empty() {
                break;
            }

            for item in page_items {
                if let Err(e) = on_item(&item) {
                    log::warn!(target: LOG_TARGET, "Item callback failed for GET {page_endpoint}: {e:#}");
                }
                items.push(item);
            }

            page += 1;
        }

        log::debug!(target: LOG_TARGET, "Fetched {} item(s) in {page} page(s) from {endpoint}", items.len());
        Ok(items)
    }

    async fn send(&self, endpoint: &Endpoint, credential: &Credential) -> ApiResult<Value> {
        self.stats.record(CallTopic::Call);
        log::debug!(target: LOG_TARGET, "GET {endpoint}");

        let result = self.transport.get_json(endpoint, credential).await;
        match &result {
            ApiResult::QuotaExceeded(_) => self.stats.record(CallTopic::Rejected),
            ApiResult::Failed(e) => log::debug!(target: LOG_TARGET, "GET {endpoint} failed: {e:#}"),
            ApiResult::Success(_) => {}
        }

        result
    }
}

/// Items of one page: either a bare JSON array or a search result with an `items` array.
fn page_items(payload: Value) -> Option<Vec<Value>> {
    match payload {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => match map.remove("items") {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_items_array() {
        let items = page_items(json!([1, 2, 3])).unwrap();
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn test_page_items_search_result() {
        let items = page_items(json!({"total_count": 2, "items": [{"id": 1}, {"id": 2}]})).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_page_items_rejects_plain_object() {
        assert!(page_items(json!({"id": 1})).is_none());
    }

    #[test]
    fn test_page_items_rejects_scalar() {
        assert!(page_items(json!("nope")).is_none());
    }
}
