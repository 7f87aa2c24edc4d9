use super::queue::{UnitQueue, unit_file_name};
use super::{IssueStore, Resolution, Unit, doc};
use crate::Result;
use crate::timeline::{Issue, IssueId, ResolvedCommit};
use chrono::Utc;
use std::path::{Path, PathBuf};

const LOG_TARGET: &str = "     store";

/// Store persisting JSON documents under a root directory.
///
/// Layout:
///
/// ```text
/// <root>/issues/<id>.json
/// <root>/commits/<sha>.json
/// <root>/units/pending/<issue id>.json
/// <root>/units/claimed/<issue id>.json
/// <root>/resolutions/<issue id>.json
/// ```
///
/// The `units` directory is a [`UnitQueue`], so several processes can share one store.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    queue: UnitQueue,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let queue = UnitQueue::open(root.join("units"))?;
        Ok(Self { root, queue })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Add a unit to the pending queue. Enqueueing a pending unit again has no effect.
    pub fn enqueue(&self, unit: Unit) -> Result<()> {
        self.queue.enqueue(unit)
    }

    /// Number of units not yet claimed.
    pub fn pending_units(&self) -> Result<usize> {
        Ok(self.queue.pending_ids()?.len())
    }

    pub fn resolution(&self, issue_id: IssueId) -> Result<Option<Resolution>> {
        doc::load(&self.resolutions_dir().join(unit_file_name(issue_id)))
    }

    fn resolutions_dir(&self) -> PathBuf {
        self.root.join("resolutions")
    }

    fn issue_path(&self, id: IssueId) -> PathBuf {
        self.root.join("issues").join(unit_file_name(id))
    }

    fn commit_path(&self, sha: &str) -> PathBuf {
        self.root.join("commits").join(format!("{}.json", doc::sanitize_file_name(sha)))
    }
}

impl IssueStore for FileStore {
    async fn get_issue_by_id(&self, id: IssueId) -> Result<Option<Issue>> {
        doc::load(&self.issue_path(id))
    }

    async fn save_issue(&self, issue: &Issue) -> Result<()> {
        doc::save(issue, &self.issue_path(issue.id))
    }

    async fn get_commit_by_sha(&self, sha: &str) -> Result<Option<ResolvedCommit>> {
        doc::load(&self.commit_path(sha))
    }

    async fn save_commit(&self, commit: &ResolvedCommit) -> Result<()> {
        let path = self.commit_path(&commit.sha);
        if path.exists() {
            log::trace!(target: LOG_TARGET, "Commit {} already stored", commit.sha);
            return Ok(());
        }

        doc::save(commit, &path)
    }

    async fn claim_next_unit(&self) -> Result<Option<Unit>> {
        self.queue.claim_next().await
    }

    async fn record_resolution(&self, unit: &Unit, commit: Option<&ResolvedCommit>) -> Result<()> {
        let resolution = Resolution {
            issue_id: unit.issue_id,
            commit_sha: commit.map(|c| c.sha.clone()),
            resolved_at: Utc::now(),
        };

        doc::save(&resolution, &self.resolutions_dir().join(unit_file_name(unit.issue_id)))
    }
}
