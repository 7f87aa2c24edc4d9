//! Issue timelines and fix-commit resolution.
//!
//! - [`TimelineEvent`] / [`EventKind`]: classified timeline entries
//! - [`Issue`]: an issue and its chronological timeline
//! - [`CommitCache`]: fetch-or-cache commit details, keyed by SHA
//! - [`TimelineResolver`]: the bounded recursive search for an issue's fix commit

mod commit_cache;
mod event;
mod issue;
mod resolver;

pub use commit_cache::{CommitCache, ResolvedCommit};
pub use event::{EventKind, IssueRef, TimelineEvent};
pub use issue::{Issue, IssueId};
pub use resolver::{STALE_MESSAGE, TimelineResolver};
