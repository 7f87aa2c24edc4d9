use crate::Result;
use crate::store::IssueStore;
use crate::timeline::{Issue, IssueId, ResolvedCommit, TimelineResolver};
use core::fmt::{Display, Formatter};
use std::collections::BTreeMap;

const LOG_TARGET: &str = "    driver";

/// An issue for which no fix commit could be attributed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedIssue {
    pub issue_id: IssueId,

    /// Event names in chronological order, joined with ` -> `
    pub event_chain: String,
}

/// Outcome of resolving a batch of issues.
#[derive(Debug, Clone, Default)]
pub struct ResolutionReport {
    pub resolved: BTreeMap<IssueId, ResolvedCommit>,
    pub unresolved: Vec<UnresolvedIssue>,

    /// Issues observed to have been closed by the stale bot
    pub auto_closed: Vec<IssueId>,
}

impl Display for ResolutionReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} resolved, {} unresolved, {} auto-closed",
            self.resolved.len(),
            self.unresolved.len(),
            self.auto_closed.len()
        )
    }
}

/// Resolve the fix commit of each issue in turn.
///
/// # Errors
///
/// Stops at the first store failure.
pub async fn resolve_all<S: IssueStore>(resolver: &TimelineResolver<S>, issues: &[Issue]) -> Result<ResolutionReport> {
    let mut report = ResolutionReport::default();

    for issue in issues {
        match resolver.resolve_fix_commit(issue).await? {
            Some(commit) => {
                log::debug!(target: LOG_TARGET, "Issue {} fixed by {}", issue.id, commit.sha);
                let _ = report.resolved.insert(issue.id, commit);
            }
            None => {
                let event_chain = issue.event_chain().join(" -> ");
                log::info!(target: LOG_TARGET, "Issue {}: {event_chain}", issue.id);
                report.unresolved.push(UnresolvedIssue {
                    issue_id: issue.id,
                    event_chain,
                });
            }
        }
    }

    report.auto_closed = resolver.auto_closed();
    log::info!(target: LOG_TARGET, "Resolution finished: {report}");
    Ok(report)
}
