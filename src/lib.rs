//! cache-partition: partition-aware cache capacity management.
//!
//! A shared cache is divided among tenants (CPUs, threads, software
//! domains). The [`partition::manager::PartitionManager`] classifies each
//! request into a partition, keeps every configured policy's occupancy
//! accounting exact, and narrows the replacement candidates of a set to
//! those the requesting partition is allowed to evict:
//!
//! ```text
//!   access ──► classify ──► hit? ──────────────────────────► done
//!                             │ miss
//!                             ▼
//!              candidates ──► filter_candidates (AND of policies)
//!                             │
//!                 empty ◄─────┴─────► victim (LRU)
//!                 bypass               notify_release(old owner)
//!                                      notify_acquire(requester)
//! ```
//!
//! The [`sim`] module provides a trace-driven set-associative cache that
//! plays the replacement layer for the CLI and the integration tests.

pub mod config;
pub mod metrics;
pub mod partition;
pub mod sim;
