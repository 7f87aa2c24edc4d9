//! Per-credential quota tracking and credential rotation.
//!
//! [`QuotaTracker::ensure_allowed`] must be called before every remote call. It authorizes
//! exactly one call, decrementing the active credential's remaining quota, and only returns
//! once a call is safe to make: either the active credential still has quota, another
//! credential with quota has been selected, or every credential was exhausted and the tracker
//! waited for the reset time.
//!
//! All mutable state (active index, remaining count, reset time) lives behind one async mutex,
//! so workers sharing a tracker never observe a half-finished rotation. The lock is released
//! while waiting for a reset so other workers are not held up by the sleeping one.

use super::call_stats::{CallStats, CallTopic};
use super::credentials::{Credential, CredentialPool};
use super::transport::Transport;
use crate::Result;
use chrono::{DateTime, Utc};
use core::time::Duration;
use ohno::bail;
use tokio::sync::{Mutex, MutexGuard};

const LOG_TARGET: &str = "     quota";

/// Upper bound on a single wait for a quota reset. Reset windows are one hour long.
const MAX_RESET_WAIT: Duration = Duration::from_secs(3600);

/// Remaining calls and reset time for one credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaState {
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

#[derive(Debug)]
struct TrackerState {
    index: usize,
    quota: Option<QuotaState>,
}

/// Quota tracker for a credential pool.
#[derive(Debug)]
pub struct QuotaTracker {
    transport: Transport,
    pool: CredentialPool,
    state: Mutex<TrackerState>,
    stats: CallStats,
}

impl QuotaTracker {
    /// Create a tracker whose first active credential is the first one in `pool`.
    ///
    /// No quota is fetched until the first call to [`ensure_allowed`](Self::ensure_allowed).
    #[must_use]
    pub fn new(transport: Transport, pool: CredentialPool, stats: CallStats) -> Self {
        Self {
            transport,
            pool,
            state: Mutex::new(TrackerState { index: 0, quota: None }),
            stats,
        }
    }

    /// Index of the active credential.
    pub async fn current_index(&self) -> usize {
        self.state.lock().await.index
    }

    /// Last known quota of the active credential, if any has been fetched yet.
    pub async fn quota(&self) -> Option<QuotaState> {
        self.state.lock().await.quota
    }

    /// Authorize one remote call and return the credential to make it with.
    ///
    /// # Errors
    ///
    /// Fails only when the quota status of every credential could not be fetched during a
    /// bounded rotation.
    pub async fn ensure_allowed(&self) -> Result<Credential> {
        let mut state = self.state.lock().await;

        if state.quota.is_none() {
            let credential = self.pool.get(state.index).clone();
            match self.fetch_quota(&credential).await {
                Ok(quota) => {
                    log::debug!(target: LOG_TARGET, "Credential #{} has {} calls remaining", state.index, quota.remaining);
                    state.quota = Some(quota);
                }
                Err(e) => {
                    log::warn!(target: LOG_TARGET, "Could not fetch quota for credential #{}: {e:#}", state.index);
                    state = self.rotate_locked(state).await?;
                }
            }
        }

        if state.quota.is_some_and(|q| q.remaining == 0) {
            state = self.rotate_locked(state).await?;
        }

        Ok(Self::authorize(&mut state, &self.pool))
    }

    /// Switch to the next credential with quota, waiting for a reset if all are exhausted.
    ///
    /// Returns the newly active credential. Does not authorize a call.
    pub async fn rotate(&self) -> Result<Credential> {
        let state = self.state.lock().await;
        let state = self.rotate_locked(state).await?;
        Ok(self.pool.get(state.index).clone())
    }

    /// Handle a 403 received while using `rejected`, then authorize one retry.
    ///
    /// The remote is authoritative: the rejected credential is marked exhausted and the tracker
    /// rotates, even if it believed quota remained. `reported` is the quota carried by the
    /// rejection's rate-limit headers; its reset time replaces the tracked one. If another worker
    /// sharing this tracker has already rotated away from `rejected`, the newly active credential
    /// is used as is.
    pub async fn rotate_after_rejection(&self, rejected: &Credential, reported: Option<QuotaState>) -> Result<Credential> {
        let mut state = self.state.lock().await;

        if self.pool.get(state.index) == rejected {
            state.quota = reported.or(state.quota).map(|q| QuotaState { remaining: 0, ..q });
            state = self.rotate_locked(state).await?;
        } else {
            log::debug!(target: LOG_TARGET, "Credential already rotated by another worker, retrying with credential #{}", state.index);
        }

        Ok(Self::authorize(&mut state, &self.pool))
    }

    /// Spend one call of the active credential's quota. Saturates at zero.
    fn authorize(state: &mut TrackerState, pool: &CredentialPool) -> Credential {
        if let Some(quota) = state.quota.as_mut() {
            quota.remaining = quota.remaining.saturating_sub(1);
        }
        pool.get(state.index).clone()
    }

    async fn fetch_quota(&self, credential: &Credential) -> Result<QuotaState> {
        self.stats.record(CallTopic::QuotaCheck);
        self.transport.fetch_quota(credential).await
    }

    /// Rotation loop.
    ///
    /// Walks the pool once, starting after the active credential, and returns as soon as a
    /// credential with quota is found. Credentials whose quota cannot be fetched are skipped.
    ///
    /// When no credential has quota left, waits until the reset time of an exhausted one,
    /// refreshes its quota, and proceeds whatever the refreshed value is. The starting
    /// credential is preferred; otherwise the first exhausted credential seen is used, so a
    /// starting credential whose quota cannot be fetched does not prevent the wait. Fails only
    /// if no quota could be learned for any credential.
    async fn rotate_locked<'a>(&'a self, mut state: MutexGuard<'a, TrackerState>) -> Result<MutexGuard<'a, TrackerState>> {
        let start = state.index;
        let mut exhausted = state.quota.filter(|q| q.remaining == 0).map(|q| (start, q));
        let mut index = start;

        for _ in 0..self.pool.len() {
            index = self.pool.next_index(index);

            let quota = match self.fetch_quota(self.pool.get(index)).await {
                Ok(quota) => quota,
                Err(e) => {
                    log::warn!(target: LOG_TARGET, "Could not fetch quota for credential #{index}, skipping it: {e:#}");
                    continue;
                }
            };

            if quota.remaining > 0 {
                self.switch_to(&mut state, index, quota);
                log::info!(target: LOG_TARGET, "Switched to credential #{index} with {} calls remaining", quota.remaining);
                return Ok(state);
            }

            if exhausted.is_none() || index == start {
                exhausted = Some((index, quota));
            }
        }

        let Some((index, quota)) = exhausted else {
            bail!("could not fetch the quota status of any of {} credential(s)", self.pool.len());
        };

        self.switch_to(&mut state, index, quota);
        let wait = reset_wait(quota.reset_at, Utc::now());
        log::warn!(
            target: LOG_TARGET,
            "All {} credential(s) exhausted, waiting {}s until {} for credential #{index}",
            self.pool.len(),
            wait.as_secs(),
            quota.reset_at.with_timezone(&chrono::Local).format("%T")
        );

        drop(state);
        tokio::time::sleep(wait).await;
        let mut state = self.state.lock().await;

        let refreshed = match self.fetch_quota(self.pool.get(index)).await {
            Ok(refreshed) => {
                log::info!(target: LOG_TARGET, "Quota reset for credential #{index}: {} calls remaining", refreshed.remaining);
                refreshed
            }
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Could not refresh quota for credential #{index} after waiting: {e:#}");
                quota
            }
        };

        self.switch_to(&mut state, index, refreshed);
        Ok(state)
    }

    fn switch_to(&self, state: &mut TrackerState, index: usize, quota: QuotaState) {
        if state.index != index {
            self.stats.record(CallTopic::Rotation);
        }
        state.index = index;
        state.quota = Some(quota);
    }
}

/// Time to wait until `reset_at`, never negative and never longer than [`MAX_RESET_WAIT`].
fn reset_wait(reset_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (reset_at - now).to_std().unwrap_or(Duration::ZERO).min(MAX_RESET_WAIT)
}
