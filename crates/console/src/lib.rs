//! Warden Console: admin screens built from the query, cache, filter, bulk and
//! poll layers, talking to the presentation layer only through sinks.

#![forbid(unsafe_code)]

pub mod catalog;
pub mod model;
pub mod screen;
pub mod sinks;
pub mod summary;

pub use catalog::{BulkAction, ScreenKind, ScreenSpec};
pub use model::{ScreenUpdate, StatusKind, StatusLine};
pub use screen::ScreenController;
pub use sinks::{Discard, LogStatus, RenderSink, StatusSink};
pub use summary::{severity, summarize};
