//! Fix-commit resolution over an issue's timeline.
//!
//! # Algorithm
//!
//! The timeline is scanned newest-first. Everything before the first `closed` event met during
//! the scan (that is, activity after the issue's last close) is ignored. From there on:
//!
//! - `committed`: the commit is resolved and the scan stops, whether or not it resolved
//! - `merged`, `referenced`, `reviewed` and any other event carrying a commit id and URL: the
//!   commit is resolved and the scan stops only if it resolved
//! - `cross-referenced`: the referencing issue is loaded from the store and resolved
//!   recursively at `depth + 1`; the scan stops if that yields a commit
//! - `commented`: a stale-bot comment marks the issue as auto-closed
//!
//! Recursion stops once `depth` exceeds the configured maximum. A cross-reference back to an
//! issue already on the current resolution path is skipped. A candidate commit dated after the
//! close event is rejected.

use super::commit_cache::{CommitCache, ResolvedCommit};
use super::event::{EventKind, TimelineEvent};
use super::issue::{Issue, IssueId};
use crate::Result;
use crate::api::ApiClient;
use crate::config::Config;
use crate::store::IssueStore;
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

const LOG_TARGET: &str = "  resolver";

/// Comment posted by the platform's stale bot before closing an inactive issue.
pub const STALE_MESSAGE: &str = "This issue has been automatically marked as stale because there has been no activity in the past year.";

/// Resolves the commit that fixed an issue.
#[derive(Debug)]
pub struct TimelineResolver<S> {
    cache: CommitCache<S>,
    max_depth: usize,
    auto_closed: Mutex<BTreeSet<IssueId>>,
}

impl<S: IssueStore> TimelineResolver<S> {
    #[must_use]
    pub fn new(cache: CommitCache<S>, max_depth: usize) -> Self {
        Self {
            cache,
            max_depth,
            auto_closed: Mutex::new(BTreeSet::new()),
        }
    }

    #[must_use]
    pub fn from_config(config: &Config, client: ApiClient, store: Arc<S>) -> Self {
        Self::new(CommitCache::new(client, store), config.max_depth)
    }

    #[must_use]
    pub const fn cache(&self) -> &CommitCache<S> {
        &self.cache
    }

    #[must_use]
    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Issues observed to have been closed by the stale bot, in id order.
    #[must_use]
    pub fn auto_closed(&self) -> Vec<IssueId> {
        self.auto_closed.lock().unwrap_or_else(PoisonError::into_inner).iter().copied().collect()
    }

    /// Find the commit that fixed `issue`.
    ///
    /// Returns `Ok(None)` when no commit can be attributed, including for an issue without
    /// a timeline or one that was never closed.
    ///
    /// # Errors
    ///
    /// Only store failures are returned as errors; unresolvable references are not errors.
    pub async fn resolve_fix_commit(&self, issue: &Issue) -> Result<Option<ResolvedCommit>> {
        let mut path = Vec::new();
        self.resolve_at_depth(issue, 0, &mut path).await
    }

    fn resolve_at_depth<'a>(&'a self, issue: &'a Issue, depth: usize, path: &'a mut Vec<IssueId>) -> BoxFuture<'a, Result<Option<ResolvedCommit>>> {
        Box::pin(async move {
            if depth > self.max_depth {
                log::debug!(target: LOG_TARGET, "Depth {depth} exceeds {} at issue {}, giving up on this branch", self.max_depth, issue.id);
                return Ok(None);
            }

            path.push(issue.id);
            let result = self.scan(issue, depth, path).await;
            let _ = path.pop();
            result
        })
    }

    async fn scan(&self, issue: &Issue, depth: usize, path: &mut Vec<IssueId>) -> Result<Option<ResolvedCommit>> {
        // Some(timestamp) once the last close event has been met
        let mut closed_at: Option<Option<DateTime<Utc>>> = None;

        for event in issue.events().iter().rev() {
            if closed_at.is_none() && event.kind == EventKind::Closed {
                closed_at = Some(event.timestamp);
            }

            let Some(closed_at) = closed_at else {
                continue;
            };

            match event.kind {
                EventKind::Committed => {
                    let commit = match &event.commit_sha {
                        Some(sha) => self.fetch(issue, sha, event, None).await?,
                        None => None,
                    };
                    return Ok(commit.filter(|c| precedes_close(c, closed_at)));
                }

                EventKind::Merged | EventKind::Referenced | EventKind::Reviewed => {
                    if let Some(commit) = self.resolve_reference(issue, event, closed_at).await? {
                        return Ok(Some(commit));
                    }
                }

                EventKind::CrossReferenced => {
                    let Some(source) = &event.source_issue else {
                        continue;
                    };

                    if path.contains(&source.id) {
                        log::debug!(target: LOG_TARGET, "Skipping cross-reference from issue {} back onto the resolution path", source.id);
                        continue;
                    }

                    let Some(linked) = self.cache.store().get_issue_by_id(source.id).await? else {
                        log::debug!(target: LOG_TARGET, "Cross-referenced issue {} is not in the store", source.id);
                        continue;
                    };

                    if let Some(commit) = self.resolve_at_depth(&linked, depth + 1, path).await?
                        && precedes_close(&commit, closed_at)
                    {
                        log::debug!(target: LOG_TARGET, "Issue {} resolved through cross-referenced issue {}", issue.id, linked.id);
                        return Ok(Some(commit));
                    }
                }

                EventKind::Commented => {
                    if event.body.as_deref().is_some_and(|body| body.contains(STALE_MESSAGE)) {
                        log::debug!(target: LOG_TARGET, "Issue {} was closed by the stale bot", issue.id);
                        let _ = self.auto_closed.lock().unwrap_or_else(PoisonError::into_inner).insert(issue.id);
                    }
                }

                _ if event.has_commit_reference() => {
                    if let Some(commit) = self.resolve_reference(issue, event, closed_at).await? {
                        return Ok(Some(commit));
                    }
                }

                _ => {}
            }
        }

        Ok(None)
    }

    async fn resolve_reference(&self, issue: &Issue, event: &TimelineEvent, closed_at: Option<DateTime<Utc>>) -> Result<Option<ResolvedCommit>> {
        let Some(sha) = &event.commit_sha else {
            return Ok(None);
        };

        let commit = self.fetch(issue, sha, event, event.commit_url.as_deref()).await?;
        Ok(commit.filter(|c| precedes_close(c, closed_at)))
    }

    async fn fetch(&self, issue: &Issue, sha: &str, event: &TimelineEvent, commit_url: Option<&str>) -> Result<Option<ResolvedCommit>> {
        self.cache.fetch_commit(&issue.owner, &issue.repo, issue.id, sha, event, commit_url).await
    }
}

/// Whether `commit` is not provably dated after the close event.
fn precedes_close(commit: &ResolvedCommit, closed_at: Option<DateTime<Utc>>) -> bool {
    match (commit.committed_at, closed_at) {
        (Some(committed), Some(closed)) if committed > closed => {
            log::debug!(target: LOG_TARGET, "Rejecting commit {} dated {committed}, after the close at {closed}", commit.sha);
            false
        }
        _ => true,
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    fn commit_at(date: Option<&str>) -> ResolvedCommit {
        ResolvedCommit {
            sha: "a".into(),
            issue_id: IssueId(1),
            message: "m".into(),
            event_kind: EventKind::Committed,
            committed_at: date.map(|d| DateTime::parse_from_rfc3339(d).unwrap().with_timezone(&Utc)),
            raw_payload: json!({}),
            event_payload: json!({}),
        }
    }

    fn ts(s: &str) -> Option<DateTime<Utc>> {
        Some(DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc))
    }

    #[test]
    fn test_precedes_close_before() {
        assert!(precedes_close(&commit_at(Some("2020-01-01T00:00:00Z")), ts("2020-01-02T00:00:00Z")));
    }

    #[test]
    fn test_precedes_close_same_instant() {
        assert!(precedes_close(&commit_at(Some("2020-01-02T00:00:00Z")), ts("2020-01-02T00:00:00Z")));
    }

    #[test]
    fn test_precedes_close_after() {
        assert!(!precedes_close(&commit_at(Some("2020-01-03T00:00:00Z")), ts("2020-01-02T00:00:00Z")));
    }

    #[test]
    fn test_precedes_close_unknown_dates() {
        assert!(precedes_close(&commit_at(None), ts("2020-01-02T00:00:00Z")));
        assert!(precedes_close(&commit_at(Some("2020-01-03T00:00:00Z")), None));
    }
}
