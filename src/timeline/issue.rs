use super::event::TimelineEvent;
use core::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Platform-wide identifier of an issue.
///
/// This is the numeric `id` of the issue, not its per-repository `number`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueId(pub u64);

impl Display for IssueId {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tracked issue and, once fetched, its timeline in chronological order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: IssueId,
    pub owner: String,
    pub repo: String,
    pub number: u64,

    /// `None` until the timeline has been fetched
    #[serde(default)]
    pub timeline: Option<Vec<TimelineEvent>>,
}

impl Issue {
    #[must_use]
    pub fn new(id: IssueId, owner: impl Into<String>, repo: impl Into<String>, number: u64) -> Self {
        Self {
            id,
            owner: owner.into(),
            repo: repo.into(),
            number,
            timeline: None,
        }
    }

    #[must_use]
    pub fn with_timeline(mut self, timeline: Vec<TimelineEvent>) -> Self {
        self.timeline = Some(timeline);
        self
    }

    /// Build an issue from an item of the repository issue listing.
    ///
    /// Returns `None` when the item lacks an `id` or `number`, or when it is a pull request.
    #[must_use]
    pub fn from_api(owner: &str, repo: &str, item: &Value) -> Option<Self> {
        if item.get("pull_request").is_some() {
            return None;
        }

        let id = item.get("id")?.as_u64()?;
        let number = item.get("number")?.as_u64()?;
        Some(Self::new(IssueId(id), owner, repo, number))
    }

    /// Timeline events in chronological order, empty when the timeline is absent.
    #[must_use]
    pub fn events(&self) -> &[TimelineEvent] {
        self.timeline.as_deref().unwrap_or_default()
    }

    /// Raw event names in chronological order, e.g. `["labeled", "closed", "committed"]`.
    #[must_use]
    pub fn event_chain(&self) -> Vec<&str> {
        self.events().iter().map(|e| e.name.as_str()).collect()
    }

    /// `owner/repo#number`
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{}/{}#{}", self.owner, self.repo, self.number)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_api() {
        let issue = Issue::from_api("o", "r", &json!({ "id": 1001, "number": 7, "title": "crash" })).unwrap();
        assert_eq!(issue.id, IssueId(1001));
        assert_eq!(issue.number, 7);
        assert_eq!(issue.display_name(), "o/r#7");
        assert!(issue.timeline.is_none());
    }

    #[test]
    fn test_from_api_skips_pull_requests() {
        let item = json!({ "id": 1, "number": 2, "pull_request": { "url": "x" } });
        assert!(Issue::from_api("o", "r", &item).is_none());
    }

    #[test]
    fn test_from_api_requires_id() {
        assert!(Issue::from_api("o", "r", &json!({ "number": 2 })).is_none());
    }

    #[test]
    fn test_event_chain() {
        let issue = Issue::new(IssueId(1), "o", "r", 1).with_timeline(vec![
            TimelineEvent::from_raw(json!({ "event": "labeled" })),
            TimelineEvent::from_raw(json!({ "event": "closed" })),
            TimelineEvent::from_raw(json!({ "event": "committed", "sha": "a" })),
        ]);

        assert_eq!(issue.event_chain(), vec!["labeled", "closed", "committed"]);
    }

    #[test]
    fn test_event_chain_without_timeline() {
        let issue = Issue::new(IssueId(1), "o", "r", 1);
        assert!(issue.event_chain().is_empty());
        assert!(issue.events().is_empty());
    }

    #[test]
    fn test_serde_keeps_timeline() {
        let issue = Issue::new(IssueId(5), "o", "r", 3).with_timeline(vec![TimelineEvent::from_raw(json!({ "event": "closed" }))]);
        let text = serde_json::to_string(&issue).unwrap();
        let back: Issue = serde_json::from_str(&text).unwrap();
        assert_eq!(back, issue);
    }

    #[test]
    fn test_issue_id_display() {
        assert_eq!(IssueId(42).to_string(), "42");
    }
}
