use super::{IssueStore, Resolution, Unit};
use crate::Result;
use crate::timeline::{Issue, IssueId, ResolvedCommit};
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct MemoryState {
    issues: HashMap<IssueId, Issue>,
    commits: HashMap<String, ResolvedCommit>,
    pending: VecDeque<Unit>,
    resolutions: HashMap<IssueId, Resolution>,
}

/// In-process store. Units are claimed in FIFO order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a unit to the back of the queue.
    pub fn enqueue(&self, unit: Unit) {
        self.state().pending.push_back(unit);
    }

    #[must_use]
    pub fn pending_units(&self) -> usize {
        self.state().pending.len()
    }

    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.state().commits.len()
    }

    #[must_use]
    pub fn resolution(&self, issue_id: IssueId) -> Option<Resolution> {
        self.state().resolutions.get(&issue_id).cloned()
    }
}

impl IssueStore for MemoryStore {
    async fn get_issue_by_id(&self, id: IssueId) -> Result<Option<Issue>> {
        Ok(self.state().issues.get(&id).cloned())
    }

    async fn save_issue(&self, issue: &Issue) -> Result<()> {
        let _ = self.state().issues.insert(issue.id, issue.clone());
        Ok(())
    }

    async fn get_commit_by_sha(&self, sha: &str) -> Result<Option<ResolvedCommit>> {
        Ok(self.state().commits.get(sha).cloned())
    }

    async fn save_commit(&self, commit: &ResolvedCommit) -> Result<()> {
        let _ = self.state().commits.entry(commit.sha.clone()).or_insert_with(|| commit.clone());
        Ok(())
    }

    async fn claim_next_unit(&self) -> Result<Option<Unit>> {
        Ok(self.state().pending.pop_front())
    }

    async fn record_resolution(&self, unit: &Unit, commit: Option<&ResolvedCommit>) -> Result<()> {
        let resolution = Resolution {
            issue_id: unit.issue_id,
            commit_sha: commit.map(|c| c.sha.clone()),
            resolved_at: Utc::now(),
        };
        let _ = self.state().resolutions.insert(unit.issue_id, resolution);
        Ok(())
    }
}
