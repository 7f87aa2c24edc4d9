//! Fetchers for issue listings, timelines and timeline commits.

use crate::Result;
use crate::api::ApiClient;
use crate::store::IssueStore;
use crate::timeline::{CommitCache, Issue, ResolvedCommit, TimelineEvent};
use std::collections::HashSet;
use std::sync::Arc;

const LOG_TARGET: &str = "   crawler";

/// Pulls issues and their timelines from the remote into the store.
#[derive(Debug)]
pub struct Crawler<S> {
    cache: CommitCache<S>,
}

impl<S> Clone for Crawler<S> {
    fn clone(&self) -> Self {
        Self { cache: self.cache.clone() }
    }
}

impl<S: IssueStore> Crawler<S> {
    #[must_use]
    pub const fn new(cache: CommitCache<S>) -> Self {
        Self { cache }
    }

    #[must_use]
    pub fn from_parts(client: ApiClient, store: Arc<S>) -> Self {
        Self::new(CommitCache::new(client, store))
    }

    fn client(&self) -> &ApiClient {
        self.cache.client()
    }

    /// Fetch the full timeline of issue `number`, in chronological order.
    pub async fn fetch_timeline(&self, owner: &str, repo: &str, number: u64) -> Result<Vec<TimelineEvent>> {
        let items = self.client().paginated_call(format!("/repos/{owner}/{repo}/issues/{number}/timeline")).await?;
        log::debug!(target: LOG_TARGET, "Issue {owner}/{repo}#{number} has {} timeline event(s)", items.len());
        Ok(items.into_iter().map(TimelineEvent::from_raw).collect())
    }

    /// List every issue of `owner/repo`, open and closed. Pull requests are left out.
    ///
    /// The returned issues carry no timeline.
    pub async fn fetch_repo_issues(&self, owner: &str, repo: &str) -> Result<Vec<Issue>> {
        let items = self.client().paginated_call(format!("/repos/{owner}/{repo}/issues?state=all")).await?;
        let issues: Vec<_> = items.iter().filter_map(|item| Issue::from_api(owner, repo, item)).collect();

        log::info!(target: LOG_TARGET, "Found {} issue(s) in {owner}/{repo}", issues.len());
        Ok(issues)
    }

    /// Fetch the timeline of `issue`, attach it and save the issue to the store.
    pub async fn hydrate_issue(&self, issue: Issue) -> Result<Issue> {
        let timeline = self.fetch_timeline(&issue.owner, &issue.repo, issue.number).await?;
        let issue = issue.with_timeline(timeline);
        self.cache.store().save_issue(&issue).await?;
        Ok(issue)
    }

    /// Resolve every commit referenced anywhere in the timeline of `issue`.
    ///
    /// Each SHA is resolved once, in timeline order. Unresolvable commits are skipped.
    pub async fn harvest_timeline_commits(&self, issue: &Issue) -> Result<Vec<ResolvedCommit>> {
        let mut seen = HashSet::new();
        let mut commits = Vec::new();

        for event in issue.events() {
            let Some(sha) = event.commit_sha.as_deref() else {
                continue;
            };

            if !seen.insert(sha) {
                continue;
            }

            if let Some(commit) = self
                .cache
                .fetch_commit(&issue.owner, &issue.repo, issue.id, sha, event, event.commit_url.as_deref())
                .await?
            {
                commits.push(commit);
            }
        }

        log::debug!(target: LOG_TARGET, "Harvested {} commit(s) from {}", commits.len(), issue.display_name());
        Ok(commits)
    }
}
