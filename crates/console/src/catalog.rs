//! Static screen and bulk action definitions.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{json, Value};
use warden_api::ConsoleError;
use warden_ops::ReasonPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenKind {
    Content,
    Notifications,
    Submissions,
    Audience,
    Logs,
}

impl ScreenKind {
    pub const ALL: [ScreenKind; 5] =
        [ScreenKind::Content, ScreenKind::Notifications, ScreenKind::Submissions, ScreenKind::Audience, ScreenKind::Logs];

    pub fn name(self) -> &'static str {
        match self {
            ScreenKind::Content => "content",
            ScreenKind::Notifications => "notifications",
            ScreenKind::Submissions => "submissions",
            ScreenKind::Audience => "audience",
            ScreenKind::Logs => "logs",
        }
    }

    pub fn spec(self) -> &'static ScreenSpec {
        match self {
            ScreenKind::Content => &CONTENT,
            ScreenKind::Notifications => &NOTIFICATIONS,
            ScreenKind::Submissions => &SUBMISSIONS,
            ScreenKind::Audience => &AUDIENCE,
            ScreenKind::Logs => &LOGS,
        }
    }
}

impl fmt::Display for ScreenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

impl FromStr for ScreenKind {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        ScreenKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| ConsoleError::Validation(format!("unknown screen '{}'", s)))
    }
}

/// Everything a screen needs to know about its collection.
#[derive(Debug, Clone, Serialize)]
pub struct ScreenSpec {
    pub kind: ScreenKind,
    pub collection: &'static str,
    /// Server-side filters accepted by the collection endpoint.
    pub filters: &'static [&'static str],
    /// Fields the live filter matches against.
    pub search_fields: &'static [&'static str],
    /// Overrides the configured debounce window.
    pub debounce_ms: Option<u64>,
    pub poll_by_default: bool,
    pub actions: &'static [BulkAction],
}

impl ScreenSpec {
    pub fn has_filter(&self, name: &str) -> bool { self.filters.contains(&name) }
    pub fn supports(&self, action: BulkAction) -> bool { self.actions.contains(&action) }
}

static CONTENT: ScreenSpec = ScreenSpec {
    kind: ScreenKind::Content,
    collection: "content",
    filters: &["status", "kind", "author", "is_published"],
    search_fields: &["title", "slug", "author", "id"],
    debounce_ms: None,
    poll_by_default: false,
    actions: &[BulkAction::Publish, BulkAction::Unpublish, BulkAction::Delete],
};

static NOTIFICATIONS: ScreenSpec = ScreenSpec {
    kind: ScreenKind::Notifications,
    collection: "notifications",
    filters: &["channel", "read", "recipient"],
    search_fields: &["title", "body", "recipient", "id"],
    debounce_ms: None,
    poll_by_default: false,
    actions: &[BulkAction::MarkRead, BulkAction::Delete],
};

static SUBMISSIONS: ScreenSpec = ScreenSpec {
    kind: ScreenKind::Submissions,
    collection: "submissions",
    filters: &["status", "form"],
    search_fields: &["name", "email", "subject", "id"],
    debounce_ms: Some(220),
    poll_by_default: false,
    actions: &[BulkAction::Approve, BulkAction::Reject, BulkAction::Review],
};

static AUDIENCE: ScreenSpec = ScreenSpec {
    kind: ScreenKind::Audience,
    collection: "audience",
    filters: &["segment", "status"],
    search_fields: &["name", "email", "id"],
    debounce_ms: None,
    poll_by_default: false,
    actions: &[BulkAction::Approve, BulkAction::Delete],
};

static LOGS: ScreenSpec = ScreenSpec {
    kind: ScreenKind::Logs,
    collection: "logs",
    filters: &["level", "source"],
    search_fields: &["message", "source", "level"],
    debounce_ms: None,
    poll_by_default: true,
    actions: &[],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BulkAction {
    Publish,
    Unpublish,
    Approve,
    Reject,
    Review,
    MarkRead,
    Delete,
}

impl BulkAction {
    pub const ALL: [BulkAction; 7] = [
        BulkAction::Publish,
        BulkAction::Unpublish,
        BulkAction::Approve,
        BulkAction::Reject,
        BulkAction::Review,
        BulkAction::MarkRead,
        BulkAction::Delete,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BulkAction::Publish => "publish",
            BulkAction::Unpublish => "unpublish",
            BulkAction::Approve => "approve",
            BulkAction::Reject => "reject",
            BulkAction::Review => "review",
            BulkAction::MarkRead => "mark-read",
            BulkAction::Delete => "delete",
        }
    }

    /// Operation segment of the mutation endpoint. Publish and unpublish share one toggle.
    pub fn operation(self) -> &'static str {
        match self {
            BulkAction::Publish | BulkAction::Unpublish => "publish",
            BulkAction::Approve => "approve",
            BulkAction::Reject => "reject",
            BulkAction::Review => "review",
            BulkAction::MarkRead => "read",
            BulkAction::Delete => "delete",
        }
    }

    pub fn past_tense(self) -> &'static str {
        match self {
            BulkAction::Publish => "published",
            BulkAction::Unpublish => "unpublished",
            BulkAction::Approve => "approved",
            BulkAction::Reject => "rejected",
            BulkAction::Review => "reviewed",
            BulkAction::MarkRead => "marked read",
            BulkAction::Delete => "deleted",
        }
    }

    pub fn reason_policy(self) -> ReasonPolicy {
        match self {
            BulkAction::Reject => ReasonPolicy::Required,
            BulkAction::Approve => ReasonPolicy::Optional,
            _ => ReasonPolicy::None,
        }
    }

    /// Request body for one item. `reason` is only read by reason-bearing actions.
    pub fn payload(self, reason: Option<&str>) -> Value {
        match self {
            BulkAction::Publish => json!({ "is_published": true }),
            BulkAction::Unpublish => json!({ "is_published": false }),
            BulkAction::Approve => match reason {
                Some(note) => json!({ "note": note }),
                None => json!({}),
            },
            BulkAction::Reject => json!({ "reason": reason.unwrap_or_default() }),
            BulkAction::Review => json!({ "notify": true }),
            BulkAction::MarkRead | BulkAction::Delete => json!({}),
        }
    }
}

impl fmt::Display for BulkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

impl FromStr for BulkAction {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase().replace('_', "-");
        BulkAction::ALL
            .into_iter()
            .find(|a| a.name() == s)
            .ok_or_else(|| ConsoleError::Validation(format!("unknown action '{}'", s)))
    }
}
