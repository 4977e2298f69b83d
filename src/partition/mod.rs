//! Partition-aware capacity management.
//!
//! This module contains the partitioning core:
//! - [`manager`]: PartitionManager that classifies, dispatches and filters
//! - [`policy`]: the PartitioningPolicy trait
//! - [`occupancy`]: per-partition occupancy accounting shared by policies
//! - [`strict_quota`]: quota policy protecting within-budget partitions
//! - [`max_capacity`]: caps each partition at a fraction of the cache
//! - [`way`]: restricts partitions to a subset of ways
//! - [`classifier`]: request → partition mapping

pub mod classifier;
pub mod manager;
pub mod max_capacity;
pub mod occupancy;
pub mod policy;
pub mod strict_quota;
pub mod way;

use thiserror::Error;

/// Identifies a logical tenant of the cache.
pub type PartitionId = u64;

/// The partition unclassified requests fall into.
pub const DEFAULT_PARTITION: PartitionId = 0;

/// A cache storage location as seen by the partitioning core.
///
/// The cache layer owns these; the core only inspects ownership. A slot that
/// holds no valid line reports `None`.
pub trait PartitionedEntry {
    /// Partition currently attributed with this slot.
    fn owner(&self) -> Option<PartitionId>;

    /// Way index of this slot within its set.
    fn way(&self) -> usize;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PartitionError {
    #[error("Accounting underflow in {policy}: release for partition {partition_id} with zero occupancy")]
    AccountingUnderflow {
        policy: &'static str,
        partition_id: PartitionId,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{policy}: {ids} partition ids but {values} values")]
    LengthMismatch {
        policy: &'static str,
        ids: usize,
        values: usize,
    },

    #[error("{policy}: partition {partition_id} configured more than once")]
    DuplicatePartition {
        policy: &'static str,
        partition_id: PartitionId,
    },

    #[error("MaxCapacity: capacity {capacity} for partition {partition_id} is outside [0, 1]")]
    CapacityOutOfRange {
        partition_id: PartitionId,
        capacity: f64,
    },

    #[error("Way: way {way} for partition {partition_id} exceeds associativity {assoc}")]
    WayOutOfRange {
        partition_id: PartitionId,
        way: usize,
        assoc: usize,
    },

    #[error("Classifier: {0} mapped to more than one partition")]
    DuplicateClassifierKey(String),

    #[error("Way: partition {0} has no ways allocated")]
    EmptyAllocation(PartitionId),

    #[error("Invalid cache geometry: {0}")]
    InvalidGeometry(String),
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::{PartitionId, PartitionedEntry};

    /// Minimal slot used by unit tests.
    #[derive(Debug, Clone, Copy)]
    pub struct TestSlot {
        pub owner: Option<PartitionId>,
        pub way: usize,
    }

    impl TestSlot {
        pub fn owned(owner: PartitionId, way: usize) -> Self {
            Self {
                owner: Some(owner),
                way,
            }
        }

        pub fn free(way: usize) -> Self {
            Self { owner: None, way }
        }
    }

    impl PartitionedEntry for TestSlot {
        fn owner(&self) -> Option<PartitionId> {
            self.owner
        }

        fn way(&self) -> usize {
            self.way
        }
    }
}
