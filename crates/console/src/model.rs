use serde::Serialize;
use warden_core::Record;
use warden_ops::{BulkReport, PollState};

use crate::catalog::BulkAction;

/// Data handed to the presentation layer. The console never draws anything itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "update", rename_all = "snake_case")]
pub enum ScreenUpdate {
    Visible { term: String, rows: Vec<Record>, total: u64 },
    Report { action: BulkAction, report: BulkReport },
    Detail(Record),
    Poll(PollState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Info,
    Ok,
    Warn,
    Bad,
}

impl StatusKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusKind::Info => "info",
            StatusKind::Ok => "ok",
            StatusKind::Warn => "warn",
            StatusKind::Bad => "bad",
        }
    }
}

/// One human-readable operation summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusLine {
    pub kind: StatusKind,
    pub text: String,
}

impl StatusLine {
    pub fn new(kind: StatusKind, text: impl Into<String>) -> Self { Self { kind, text: text.into() } }
}
