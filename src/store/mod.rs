//! The external store the resolver and the swarm workers read from and write to.
//!
//! [`IssueStore`] is the interface; [`MemoryStore`] keeps everything in process and
//! [`FileStore`] persists JSON documents under a directory, with unit checkout serialized by an
//! advisory file lock so several processes can share one queue.

mod doc;
mod file;
mod memory;
mod queue;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::Result;
use crate::timeline::{Issue, IssueId, ResolvedCommit};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One unit of swarm work: an issue waiting to be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unit {
    pub issue_id: IssueId,
}

/// Outcome recorded for a processed unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub issue_id: IssueId,

    /// SHA of the fix commit, `None` when nothing could be attributed
    pub commit_sha: Option<String>,

    pub resolved_at: DateTime<Utc>,
}

/// Storage for issues, resolved commits and the swarm work queue.
///
/// "Not found" is `Ok(None)`; errors are reserved for storage failures.
pub trait IssueStore: Send + Sync {
    fn get_issue_by_id(&self, id: IssueId) -> impl Future<Output = Result<Option<Issue>>> + Send;

    /// Insert or replace an issue.
    fn save_issue(&self, issue: &Issue) -> impl Future<Output = Result<()>> + Send;

    fn get_commit_by_sha(&self, sha: &str) -> impl Future<Output = Result<Option<ResolvedCommit>>> + Send;

    /// Save a commit. A commit whose SHA is already stored is left as is.
    fn save_commit(&self, commit: &ResolvedCommit) -> impl Future<Output = Result<()>> + Send;

    /// Atomically check out the next unprocessed unit.
    ///
    /// A unit is handed to at most one caller, even across concurrent callers.
    fn claim_next_unit(&self) -> impl Future<Output = Result<Option<Unit>>> + Send;

    /// Record the outcome of a claimed unit.
    fn record_resolution(&self, unit: &Unit, commit: Option<&ResolvedCommit>) -> impl Future<Output = Result<()>> + Send;
}
