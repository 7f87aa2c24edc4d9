use core::fmt::{Display, Formatter};
use url::Url;

/// A GET endpoint relative to the API base URL: a path plus ordered query parameters.
///
/// Endpoints are immutable; pagination produces a new endpoint with `page` and `per_page`
/// appended after any existing parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    path: String,
    query: Vec<(String, String)>,
}

impl Endpoint {
    /// Parse an endpoint from `path[?query]`.
    ///
    /// Absolute URLs (as found in `commit_url` fields of timeline events) are accepted; the
    /// scheme and host are dropped so the call is routed through the configured base URL.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        if let Ok(url) = Url::parse(text)
            && url.has_host()
        {
            return Self {
                path: url.path().to_string(),
                query: split_query(url.query().unwrap_or_default()),
            };
        }

        let (path, query) = text.split_once('?').unwrap_or((text, ""));
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };

        Self {
            path,
            query: split_query(query),
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// Return a copy of this endpoint with an extra query parameter appended.
    #[must_use]
    pub fn with_param(&self, key: &str, value: impl Display) -> Self {
        let mut query = self.query.clone();
        query.push((key.to_string(), value.to_string()));
        Self {
            path: self.path.clone(),
            query,
        }
    }

    /// The endpoint for page `page` (1-based) with `per_page` items per page.
    #[must_use]
    pub fn page(&self, page: u32, per_page: u32) -> Self {
        self.with_param("page", page).with_param("per_page", per_page)
    }

    /// The full URL of this endpoint under `base_url`.
    #[must_use]
    pub fn url(&self, base_url: &str) -> String {
        format!("{}{self}", base_url.trim_end_matches('/'))
    }
}

/// Split a raw query string into pairs, keeping any percent-encoding as is.
fn split_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (k.to_string(), v.to_string())
        })
        .collect()
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.path)?;
        for (i, (k, v)) in self.query.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            if v.is_empty() {
                write!(f, "{sep}{k}")?;
            } else {
                write!(f, "{sep}{k}={v}")?;
            }
        }
        Ok(())
    }
}

impl From<&str> for Endpoint {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}

impl From<String> for Endpoint {
    fn from(text: String) -> Self {
        Self::parse(&text)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_page_without_existing_query() {
        let endpoint = Endpoint::parse("/repos/o/r/issues/7/timeline");
        assert_eq!(endpoint.page(1, 100).to_string(), "/repos/o/r/issues/7/timeline?page=1&per_page=100");
    }

    #[test]
    fn test_page_with_existing_query() {
        let endpoint = Endpoint::parse("/repos/o/r/contents?ref=HEAD");
        assert_eq!(endpoint.page(1, 100).to_string(), "/repos/o/r/contents?ref=HEAD&page=1&per_page=100");
    }

    #[test]
    fn test_page_leaves_source_endpoint_unchanged() {
        let endpoint = Endpoint::parse("/repos/o/r/issues?state=all");
        let _ = endpoint.page(3, 100);
        assert_eq!(endpoint.to_string(), "/repos/o/r/issues?state=all");
    }

    #[test]
    fn test_trailing_question_mark_is_ignored() {
        let endpoint = Endpoint::parse("/repos/o/r/commits?");
        assert_eq!(endpoint.page(2, 100).to_string(), "/repos/o/r/commits?page=2&per_page=100");
    }

    #[test]
    fn test_missing_leading_slash_added() {
        let endpoint = Endpoint::parse("rate_limit");
        assert_eq!(endpoint.path(), "/rate_limit");
    }

    #[test]
    fn test_absolute_url_is_stripped() {
        let endpoint = Endpoint::parse("https://api.github.com/repos/o/r/commits/abc123");
        assert_eq!(endpoint.to_string(), "/repos/o/r/commits/abc123");
    }

    #[test]
    fn test_absolute_url_keeps_query() {
        let endpoint = Endpoint::parse("https://api.github.com/repos/o/r/contents/a.wasm?ref=abc");
        assert_eq!(endpoint.query(), &[("ref".to_string(), "abc".to_string())]);
    }

    #[test]
    fn test_absolute_and_relative_keep_percent_encoding_alike() {
        let absolute = Endpoint::parse("https://api.github.com/search/issues?q=a%2Bb&sort=created");
        let relative = Endpoint::parse("/search/issues?q=a%2Bb&sort=created");
        assert_eq!(absolute, relative);
        assert_eq!(absolute.to_string(), "/search/issues?q=a%2Bb&sort=created");
    }

    #[test]
    fn test_url_joins_base() {
        let endpoint = Endpoint::parse("/repos/o/r");
        assert_eq!(endpoint.url("http://localhost:1234/"), "http://localhost:1234/repos/o/r");
    }

    #[test]
    fn test_flag_parameter_without_value() {
        let endpoint = Endpoint::parse("/search?flag&q=x");
        assert_eq!(endpoint.to_string(), "/search?flag&q=x");
    }
}
