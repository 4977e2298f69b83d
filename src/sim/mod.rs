//! Trace-driven cache model used to exercise the partitioning core.
//!
//! - [`cache`]: set-associative tag store with LRU replacement
//! - [`trace`]: JSON-lines traces, replay and run reports

pub mod cache;
pub mod trace;
