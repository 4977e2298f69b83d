//! The partitioning policy interface the manager dispatches to.

use std::fmt::Debug;

use crate::partition::occupancy::PartitionStatus;
use crate::partition::{PartitionError, PartitionId, PartitionedEntry};

/// An admission strategy restricting which slots a partition may evict.
///
/// The manager guarantees one `on_acquire` per slot attribution and one
/// `on_release` per relinquished slot; the policy keeps the count exact.
pub trait PartitioningPolicy: Debug + Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// One slot has been attributed to `id`.
    fn on_acquire(&mut self, id: PartitionId);

    /// One slot previously attributed to `id` has been relinquished.
    fn on_release(&mut self, id: PartitionId) -> Result<(), PartitionError>;

    /// Whether `slot` may be evicted to make room for `requester`.
    fn is_eligible(&self, slot: &dyn PartitionedEntry, requester: PartitionId) -> bool;

    /// Slots currently attributed to `id`.
    fn occupancy(&self, id: PartitionId) -> u64;

    /// Position of `id` in the per-partition state machine.
    fn status(&self, id: PartitionId) -> PartitionStatus;

    /// Partitions this policy has seen, with their occupancy.
    fn partitions(&self) -> Vec<(PartitionId, u64)>;
}
