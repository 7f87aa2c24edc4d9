//! Timeline events and their classification.

use super::issue::IssueId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The kinds of timeline events the resolver distinguishes.
///
/// Any event name not listed here maps to [`EventKind::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::IntoStaticStr)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum EventKind {
    Closed,
    Committed,
    Merged,
    Referenced,
    Reviewed,
    CrossReferenced,
    Commented,
    #[serde(other)]
    Other,
}

impl EventKind {
    /// Classify a raw event name such as `cross-referenced`.
    #[must_use]
    pub fn classify(event_name: &str) -> Self {
        match event_name {
            "closed" => Self::Closed,
            "committed" => Self::Committed,
            "merged" => Self::Merged,
            "referenced" => Self::Referenced,
            "reviewed" => Self::Reviewed,
            "cross-referenced" => Self::CrossReferenced,
            "commented" => Self::Commented,
            _ => Self::Other,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// A reference to another issue, taken from the `source` of a cross-reference event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRef {
    pub id: IssueId,
    pub number: Option<u64>,
    /// `owner/repo` of the referencing issue, when present
    pub repository: Option<String>,
}

/// One entry of an issue's timeline.
///
/// The raw API payload is kept alongside the extracted fields, and is what gets serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub struct TimelineEvent {
    pub kind: EventKind,
    /// The raw `event` name as reported by the API
    pub name: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub actor_id: Option<u64>,
    /// `sha` for committed events, `commit_id` for every other kind
    pub commit_sha: Option<String>,
    pub commit_url: Option<String>,
    pub source_issue: Option<IssueRef>,
    pub body: Option<String>,
    pub raw: Value,
}

impl TimelineEvent {
    /// Build an event from a raw timeline item.
    #[must_use]
    pub fn from_raw(raw: Value) -> Self {
        let name = str_field(&raw, &["event"]).unwrap_or_default().to_string();
        let kind = EventKind::classify(&name);

        let commit_sha = if kind == EventKind::Committed {
            str_field(&raw, &["sha"])
        } else {
            str_field(&raw, &["commit_id"])
        }
        .map(ToString::to_string);

        let timestamp = [
            &["created_at"][..],
            &["submitted_at"][..],
            &["committer", "date"][..],
            &["author", "date"][..],
        ]
        .iter()
        .find_map(|path| str_field(&raw, path))
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

        let actor_id = ["actor", "user"]
            .iter()
            .find_map(|key| raw.get(key).and_then(|a| a.get("id")).and_then(Value::as_u64));

        let source_issue = raw.get("source").and_then(|s| s.get("issue")).and_then(|issue| {
            Some(IssueRef {
                id: IssueId(issue.get("id")?.as_u64()?),
                number: issue.get("number").and_then(Value::as_u64),
                repository: issue
                    .get("repository")
                    .and_then(|r| r.get("full_name"))
                    .and_then(Value::as_str)
                    .map(ToString::to_string),
            })
        });

        Self {
            kind,
            name,
            timestamp,
            actor_id,
            commit_sha,
            commit_url: str_field(&raw, &["commit_url"]).map(ToString::to_string),
            source_issue,
            body: str_field(&raw, &["body"]).map(ToString::to_string),
            raw,
        }
    }

    /// Whether the event carries both a commit SHA and a commit URL.
    #[must_use]
    pub const fn has_commit_reference(&self) -> bool {
        self.commit_sha.is_some() && self.commit_url.is_some()
    }
}

impl From<Value> for TimelineEvent {
    fn from(raw: Value) -> Self {
        Self::from_raw(raw)
    }
}

impl From<TimelineEvent> for Value {
    fn from(event: TimelineEvent) -> Self {
        event.raw
    }
}

/// Look up a non-empty string at a nested path.
fn str_field<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(value, |v, key| v.get(key))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_known_kinds() {
        assert_eq!(EventKind::classify("closed"), EventKind::Closed);
        assert_eq!(EventKind::classify("committed"), EventKind::Committed);
        assert_eq!(EventKind::classify("merged"), EventKind::Merged);
        assert_eq!(EventKind::classify("referenced"), EventKind::Referenced);
        assert_eq!(EventKind::classify("reviewed"), EventKind::Reviewed);
        assert_eq!(EventKind::classify("cross-referenced"), EventKind::CrossReferenced);
        assert_eq!(EventKind::classify("commented"), EventKind::Commented);
    }

    #[test]
    fn test_classify_unknown_is_other() {
        assert_eq!(EventKind::classify("labeled"), EventKind::Other);
        assert_eq!(EventKind::classify(""), EventKind::Other);
        assert_eq!(EventKind::classify("Closed"), EventKind::Other);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(EventKind::CrossReferenced.as_str(), "cross-referenced");
        assert_eq!(EventKind::Other.as_str(), "other");
    }

    #[test]
    fn test_kind_deserialize_unknown() {
        let kind: EventKind = serde_json::from_str(r#""head_ref_deleted""#).unwrap();
        assert_eq!(kind, EventKind::Other);
    }

    #[test]
    fn test_committed_event() {
        let event = TimelineEvent::from_raw(json!({
            "event": "committed",
            "sha": "abc123",
            "message": "Fix overflow",
            "author": { "name": "a", "date": "2020-01-01T10:00:00Z" },
            "committer": { "name": "a", "date": "2020-01-02T10:00:00Z" }
        }));

        assert_eq!(event.kind, EventKind::Committed);
        assert_eq!(event.commit_sha.as_deref(), Some("abc123"));
        assert_eq!(event.timestamp.unwrap().to_rfc3339(), "2020-01-02T10:00:00+00:00");
        assert!(!event.has_commit_reference());
    }

    #[test]
    fn test_referenced_event() {
        let event = TimelineEvent::from_raw(json!({
            "event": "referenced",
            "actor": { "id": 42 },
            "commit_id": "def456",
            "commit_url": "https://api.github.com/repos/o/r/commits/def456",
            "created_at": "2020-03-01T00:00:00Z"
        }));

        assert_eq!(event.kind, EventKind::Referenced);
        assert_eq!(event.actor_id, Some(42));
        assert_eq!(event.commit_sha.as_deref(), Some("def456"));
        assert!(event.has_commit_reference());
    }

    #[test]
    fn test_reviewed_event_uses_submitted_at_and_user() {
        let event = TimelineEvent::from_raw(json!({
            "event": "reviewed",
            "user": { "id": 7 },
            "commit_id": "aaa",
            "submitted_at": "2021-05-05T05:05:05Z"
        }));

        assert_eq!(event.kind, EventKind::Reviewed);
        assert_eq!(event.actor_id, Some(7));
        assert!(event.timestamp.is_some());
        assert!(event.commit_url.is_none());
    }

    #[test]
    fn test_cross_referenced_event() {
        let event = TimelineEvent::from_raw(json!({
            "event": "cross-referenced",
            "created_at": "2020-03-01T00:00:00Z",
            "source": {
                "type": "issue",
                "issue": { "id": 99, "number": 12, "repository": { "full_name": "o/other" } }
            }
        }));

        let source = event.source_issue.unwrap();
        assert_eq!(source.id, IssueId(99));
        assert_eq!(source.number, Some(12));
        assert_eq!(source.repository.as_deref(), Some("o/other"));
    }

    #[test]
    fn test_cross_referenced_without_issue_id() {
        let event = TimelineEvent::from_raw(json!({
            "event": "cross-referenced",
            "source": { "type": "issue", "issue": { "number": 12 } }
        }));
        assert!(event.source_issue.is_none());
    }

    #[test]
    fn test_commented_event_body() {
        let event = TimelineEvent::from_raw(json!({ "event": "commented", "body": "Thanks!" }));
        assert_eq!(event.kind, EventKind::Commented);
        assert_eq!(event.body.as_deref(), Some("Thanks!"));
    }

    #[test]
    fn test_missing_event_name() {
        let event = TimelineEvent::from_raw(json!({ "id": 1 }));
        assert_eq!(event.kind, EventKind::Other);
        assert_eq!(event.name, "");
    }

    #[test]
    fn test_serializes_as_raw_payload() {
        let raw = json!({ "event": "closed", "created_at": "2020-03-01T00:00:00Z" });
        let event = TimelineEvent::from_raw(raw.clone());
        assert_eq!(serde_json::to_value(&event).unwrap(), raw);

        let back: TimelineEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(back, event);
    }
}
