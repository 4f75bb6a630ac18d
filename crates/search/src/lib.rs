//! Warden search: client-side substring filtering over a cached snapshot,
//! recomputed behind a latest-wins debounce.

#![forbid(unsafe_code)]

mod debounce;
mod filter;

pub use debounce::{Debouncer, DEFAULT_QUIET};
pub use filter::LiveFilter;
