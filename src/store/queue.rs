use super::{Unit, doc};
use crate::Result;
use crate::timeline::IssueId;
use fs4::fs_std::FileExt;
use ohno::IntoAppError;
use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;

const LOG_TARGET: &str = "     queue";

const LOCK_FILE: &str = "queue.lock";

/// Swarm work queue on disk.
///
/// Waiting units live in `<dir>/pending`, handed-out units in `<dir>/claimed`, one JSON document
/// per issue. A claim moves the lowest pending issue id to `claimed` while holding an exclusive
/// advisory lock on `<dir>/queue.lock`, so concurrent claims from any number of processes never
/// hand out the same unit twice.
#[derive(Debug, Clone)]
pub struct UnitQueue {
    dir: PathBuf,
}

impl UnitQueue {
    /// Open the queue in `dir`, creating its directories if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let queue = Self { dir: dir.into() };
        for dir in [queue.pending_dir(), queue.claimed_dir()] {
            fs::create_dir_all(&dir).into_app_err_with(|| format!("unable to create directory '{}'", dir.display()))?;
        }

        Ok(queue)
    }

    /// Add a unit to the pending set. Enqueueing a pending unit again has no effect.
    pub fn enqueue(&self, unit: Unit) -> Result<()> {
        doc::save(&unit, &self.pending_dir().join(unit_file_name(unit.issue_id)))
    }

    /// Issue ids of pending units, ascending. Files that are not unit documents are ignored.
    pub fn pending_ids(&self) -> Result<Vec<u64>> {
        let dir = self.pending_dir();
        let entries = fs::read_dir(&dir).into_app_err_with(|| format!("unable to list '{}'", dir.display()))?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.into_app_err_with(|| format!("unable to list '{}'", dir.display()))?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json")
                && let Some(id) = path.file_stem().and_then(|s| s.to_str()).and_then(|s| s.parse::<u64>().ok())
            {
                ids.push(id);
            }
        }

        ids.sort_unstable();
        Ok(ids)
    }

    /// Claim the pending unit with the lowest issue id.
    ///
    /// Waiting for the queue lock may block for as long as another process holds it, so the
    /// whole claim runs on the blocking pool.
    pub async fn claim_next(&self) -> Result<Option<Unit>> {
        let queue = self.clone();
        tokio::task::spawn_blocking(move || queue.claim_next_blocking())
            .await
            .into_app_err("unit claim task panicked")?
    }

    fn claim_next_blocking(&self) -> Result<Option<Unit>> {
        let lock = self.open_lock_file()?;
        lock.lock_exclusive()
            .into_app_err_with(|| format!("acquiring the queue lock in '{}'", self.dir.display()))?;

        let claimed = self.move_lowest_pending();

        if let Err(e) = FileExt::unlock(&lock) {
            log::warn!(target: LOG_TARGET, "Could not unlock the unit queue in '{}': {e:#}", self.dir.display());
        }

        claimed
    }

    /// Must only be called with the queue lock held.
    fn move_lowest_pending(&self) -> Result<Option<Unit>> {
        let Some(&id) = self.pending_ids()?.first() else {
            return Ok(None);
        };

        let issue_id = IssueId(id);
        let name = unit_file_name(issue_id);
        let from = self.pending_dir().join(&name);
        fs::rename(&from, self.claimed_dir().join(&name)).into_app_err_with(|| format!("unable to claim unit '{}'", from.display()))?;

        log::debug!(target: LOG_TARGET, "Claimed unit for issue {issue_id}");
        Ok(Some(Unit { issue_id }))
    }

    fn open_lock_file(&self) -> Result<File> {
        let path = self.dir.join(LOCK_FILE);
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .into_app_err_with(|| format!("opening queue lock file at '{}'", path.display()))
    }

    fn pending_dir(&self) -> PathBuf {
        self.dir.join("pending")
    }

    fn claimed_dir(&self) -> PathBuf {
        self.dir.join("claimed")
    }
}

/// Document name for records keyed by issue id.
pub(super) fn unit_file_name(id: IssueId) -> String {
    format!("{id}.json")
}
