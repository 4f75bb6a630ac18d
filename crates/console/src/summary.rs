use warden_ops::{BulkReport, BulkRun};

use crate::catalog::BulkAction;
use crate::model::{StatusKind, StatusLine};

fn items(n: usize) -> String {
    if n == 1 { "1 item".to_string() } else { format!("{} items", n) }
}

/// Severity of a finished batch: `Bad` when nothing went through, `Warn` on
/// partial failure or undelivered notifications, `Ok` otherwise.
pub fn severity(report: &BulkReport) -> StatusKind {
    if report.total() > 0 && report.succeeded == 0 {
        StatusKind::Bad
    } else if report.failed > 0 || report.secondary_failed > 0 {
        StatusKind::Warn
    } else {
        StatusKind::Ok
    }
}

/// Consolidated status line for a bulk run.
pub fn summarize(action: BulkAction, run: &BulkRun) -> StatusLine {
    match run {
        BulkRun::NothingSelected => StatusLine::new(StatusKind::Info, format!("{}: nothing selected", action)),
        BulkRun::Cancelled => StatusLine::new(StatusKind::Warn, format!("{} cancelled", action)),
        BulkRun::Completed { report, refresh_error, .. } => {
            let mut kind = severity(report);
            let mut text = if report.succeeded == 0 {
                format!("{} failed for {}", action, items(report.failed))
            } else if report.failed > 0 {
                format!("{} {} of {}; {} failed", action.past_tense(), report.succeeded, items(report.total()), report.failed)
            } else {
                format!("{} {}", action.past_tense(), items(report.succeeded))
            };
            if report.secondary_failed > 0 {
                let n = report.secondary_failed;
                text.push_str(&format!("; {} not delivered", if n == 1 { "1 notification".to_string() } else { format!("{} notifications", n) }));
            }
            if let Some(e) = refresh_error {
                text.push_str(&format!("; reload failed: {}", e));
                if kind == StatusKind::Ok { kind = StatusKind::Warn; }
            }
            StatusLine::new(kind, text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_api::ConsoleError;

    fn done(succeeded: usize, failed: usize, secondary_failed: usize) -> BulkRun {
        BulkRun::Completed {
            report: BulkReport { succeeded, failed, secondary_failed },
            outcomes: Vec::new(),
            refresh_error: None,
        }
    }

    #[test]
    fn clean_partial_and_total_failure() {
        assert_eq!(summarize(BulkAction::Publish, &done(3, 0, 0)), StatusLine::new(StatusKind::Ok, "published 3 items"));
        assert_eq!(
            summarize(BulkAction::Publish, &done(2, 1, 0)),
            StatusLine::new(StatusKind::Warn, "published 2 of 3 items; 1 failed")
        );
        assert_eq!(summarize(BulkAction::Delete, &done(0, 1, 0)), StatusLine::new(StatusKind::Bad, "delete failed for 1 item"));
    }

    #[test]
    fn undelivered_notifications_warn_separately() {
        let line = summarize(BulkAction::Review, &done(4, 0, 2));
        assert_eq!(line, StatusLine::new(StatusKind::Warn, "reviewed 4 items; 2 notifications not delivered"));
    }

    #[test]
    fn notices_and_reload_failure() {
        assert_eq!(summarize(BulkAction::Reject, &BulkRun::Cancelled).kind, StatusKind::Warn);
        assert_eq!(summarize(BulkAction::Reject, &BulkRun::NothingSelected).kind, StatusKind::Info);
        let run = BulkRun::Completed {
            report: BulkReport { succeeded: 1, failed: 0, secondary_failed: 0 },
            outcomes: Vec::new(),
            refresh_error: Some(ConsoleError::Transport("reset".into())),
        };
        let line = summarize(BulkAction::MarkRead, &run);
        assert_eq!(line.kind, StatusKind::Warn);
        assert_eq!(line.text, "marked read 1 item; reload failed: transport: reset");
    }
}
