//! One-way outputs of a screen: render updates and status lines.

use std::sync::mpsc;

use tracing::{error, info, warn};

use crate::model::{ScreenUpdate, StatusKind, StatusLine};

pub trait RenderSink: Send + Sync {
    fn render(&self, update: ScreenUpdate);
}

/// Fire-and-forget; no acknowledgment.
pub trait StatusSink: Send + Sync {
    fn status(&self, line: StatusLine);
}

impl RenderSink for mpsc::Sender<ScreenUpdate> {
    fn render(&self, update: ScreenUpdate) {
        // receiver gone means nobody is looking anymore
        let _ = self.send(update);
    }
}

impl StatusSink for mpsc::Sender<StatusLine> {
    fn status(&self, line: StatusLine) {
        let _ = self.send(line);
    }
}

/// Drops every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

impl RenderSink for Discard {
    fn render(&self, _update: ScreenUpdate) {}
}

/// Writes status lines to the tracing subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatus;

impl StatusSink for LogStatus {
    fn status(&self, line: StatusLine) {
        match line.kind {
            StatusKind::Info | StatusKind::Ok => info!(kind = line.kind.as_str(), "{}", line.text),
            StatusKind::Warn => warn!(kind = line.kind.as_str(), "{}", line.text),
            StatusKind::Bad => error!(kind = line.kind.as_str(), "{}", line.text),
        }
    }
}
