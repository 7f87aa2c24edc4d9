//! Counters for monitoring API traffic.

use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Kinds of API activity that are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CallTopic {
    /// A request sent to the remote API (including retries, excluding quota-status checks)
    Call,
    /// A response rejected with HTTP 403
    Rejected,
    /// A switch to another credential
    Rotation,
    /// A page fetched by a paginated call
    Page,
    /// A quota-status request
    QuotaCheck,
}

impl CallTopic {
    const fn all() -> [Self; 5] {
        [Self::Call, Self::Rejected, Self::Rotation, Self::Page, Self::QuotaCheck]
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Call => "calls",
            Self::Rejected => "rejected",
            Self::Rotation => "rotations",
            Self::Page => "pages",
            Self::QuotaCheck => "quota checks",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// Shared, lock-free counters for API activity.
///
/// Cloning produces a handle to the same counters.
#[derive(Debug, Clone, Default)]
pub struct CallStats {
    counters: Arc<[AtomicU64; 5]>,
}

impl CallStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, topic: CallTopic) {
        let _ = self.counters[topic.index()].fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn get(&self, topic: CallTopic) -> u64 {
        self.counters[topic.index()].load(Ordering::Relaxed)
    }

    /// One-line summary such as `12 calls, 1 rejected, 1 rotations, 4 pages, 2 quota checks`.
    #[must_use]
    pub fn summary(&self) -> String {
        CallTopic::all()
            .iter()
            .map(|topic| format!("{} {}", self.get(*topic), topic.name()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
