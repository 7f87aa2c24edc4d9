//! Commit resolution backed by the issue store.
//!
//! A commit is fetched from the remote at most once per SHA: the store is consulted first and
//! every fetched commit is saved before it is returned.

use super::event::{EventKind, TimelineEvent};
use super::issue::IssueId;
use crate::Result;
use crate::api::{ApiClient, Endpoint};
use crate::store::IssueStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

const LOG_TARGET: &str = "   commits";

/// A commit identified as evidence for an issue.
///
/// Commits are keyed by `sha`; saving the same SHA twice replaces nothing and creates no duplicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedCommit {
    pub sha: String,
    pub issue_id: IssueId,
    pub message: String,

    /// Kind of the timeline event the commit was found through
    pub event_kind: EventKind,

    /// Committer date, falling back to the author date
    pub committed_at: Option<DateTime<Utc>>,

    /// Full commit-detail payload
    pub raw_payload: Value,

    /// Timeline event the commit was found through
    pub event_payload: Value,
}

impl ResolvedCommit {
    fn from_payload(sha: &str, issue_id: IssueId, event: &TimelineEvent, payload: Value) -> Self {
        let commit = payload.get("commit");
        let message = commit
            .and_then(|c| c.get("message"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let committed_at = ["committer", "author"]
            .iter()
            .find_map(|who| commit.and_then(|c| c.get(who)).and_then(|w| w.get("date")).and_then(Value::as_str))
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Self {
            sha: sha.to_string(),
            issue_id,
            message,
            event_kind: event.kind,
            committed_at,
            raw_payload: payload,
            event_payload: event.raw.clone(),
        }
    }

    /// First line of the commit message.
    #[must_use]
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }
}

/// Fetch-or-cache access to commit details.
#[derive(Debug)]
pub struct CommitCache<S> {
    client: ApiClient,
    store: Arc<S>,
}

impl<S> Clone for CommitCache<S> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: IssueStore> CommitCache<S> {
    #[must_use]
    pub const fn new(client: ApiClient, store: Arc<S>) -> Self {
        Self { client, store }
    }

    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    #[must_use]
    pub const fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Return the commit `sha`, from the store when known, otherwise from the remote.
    ///
    /// The commit is fetched through `commit_url` when given, else through the canonical
    /// commit endpoint of `owner/repo`. A failed fetch yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Only store failures are returned as errors.
    pub async fn fetch_commit(
        &self,
        owner: &str,
        repo: &str,
        issue_id: IssueId,
        sha: &str,
        event: &TimelineEvent,
        commit_url: Option<&str>,
    ) -> Result<Option<ResolvedCommit>> {
        if let Some(commit) = self.store.get_commit_by_sha(sha).await? {
            log::debug!(target: LOG_TARGET, "Commit {sha} served from the store");
            return Ok(Some(commit));
        }

        let endpoint = commit_url.map_or_else(|| Endpoint::parse(&format!("/repos/{owner}/{repo}/commits/{sha}")), Endpoint::parse);

        let payload = match self.client.call(endpoint).await {
            Ok(Value::Null) => {
                log::warn!(target: LOG_TARGET, "Commit {sha} of issue {issue_id} came back empty");
                return Ok(None);
            }
            Ok(payload) => payload,
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Could not fetch commit {sha} of issue {issue_id}: {e:#}");
                return Ok(None);
            }
        };

        let commit = ResolvedCommit::from_payload(sha, issue_id, event, payload);
        self.store.save_commit(&commit).await?;
        log::debug!(target: LOG_TARGET, "Commit {sha} fetched and saved for issue {issue_id}");

        Ok(Some(commit))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_payload() {
        let event = TimelineEvent::from_raw(json!({ "event": "committed", "sha": "abc" }));
        let payload = json!({
            "sha": "abc",
            "commit": {
                "message": "Fix overflow\n\nCloses #3",
                "author": { "date": "2020-01-01T00:00:00Z" },
                "committer": { "date": "2020-01-02T00:00:00Z" }
            }
        });

        let commit = ResolvedCommit::from_payload("abc", IssueId(3), &event, payload);
        assert_eq!(commit.sha, "abc");
        assert_eq!(commit.issue_id, IssueId(3));
        assert_eq!(commit.summary(), "Fix overflow");
        assert_eq!(commit.event_kind, EventKind::Committed);
        assert_eq!(commit.committed_at.unwrap().to_rfc3339(), "2020-01-02T00:00:00+00:00");
        assert_eq!(commit.event_payload["sha"], "abc");
    }

    #[test]
    fn test_from_payload_falls_back_to_author_date() {
        let event = TimelineEvent::from_raw(json!({ "event": "merged" }));
        let payload = json!({ "commit": { "message": "m", "author": { "date": "2020-01-01T00:00:00Z" } } });

        let commit = ResolvedCommit::from_payload("x", IssueId(1), &event, payload);
        assert_eq!(commit.committed_at.unwrap().to_rfc3339(), "2020-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_from_payload_without_commit_section() {
        let event = TimelineEvent::from_raw(json!({ "event": "merged" }));
        let commit = ResolvedCommit::from_payload("x", IssueId(1), &event, json!({ "sha": "x" }));
        assert_eq!(commit.message, "");
        assert_eq!(commit.summary(), "");
        assert!(commit.committed_at.is_none());
    }
}
