//! Per-partition occupancy accounting.
//!
//! Every policy keeps its own table. Entries are created on first acquire
//! and never removed.

use std::collections::HashMap;

use tracing::error;

use crate::partition::{PartitionError, PartitionId};

/// Where a partition sits relative to its quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartitionStatus {
    /// Never acquired a slot.
    Unseen,
    /// Occupancy at or below quota (or no quota configured).
    WithinQuota,
    /// Occupancy strictly above quota.
    OverQuota,
}

/// Occupancy counters keyed by partition.
#[derive(Debug, Clone, Default)]
pub struct OccupancyTable {
    counts: HashMap<PartitionId, u64>,
}

impl OccupancyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attribute one more slot to `id`.
    pub fn acquire(&mut self, id: PartitionId) {
        *self.counts.entry(id).or_insert(0) += 1;
    }

    /// Take one slot away from `id`.
    ///
    /// Fails without modifying state if `id` holds no slots.
    pub fn release(&mut self, policy: &'static str, id: PartitionId) -> Result<(), PartitionError> {
        match self.counts.get_mut(&id) {
            Some(count) if *count > 0 => {
                *count -= 1;
                Ok(())
            }
            _ => {
                error!(policy, partition_id = id, "Release without matching acquire");
                Err(PartitionError::AccountingUnderflow {
                    policy,
                    partition_id: id,
                })
            }
        }
    }

    /// Current occupancy; zero for unseen partitions.
    pub fn get(&self, id: PartitionId) -> u64 {
        self.counts.get(&id).copied().unwrap_or(0)
    }

    /// Whether `id` has ever acquired a slot.
    pub fn contains(&self, id: PartitionId) -> bool {
        self.counts.contains_key(&id)
    }

    /// Status of `id` against an optional quota.
    pub fn status(&self, id: PartitionId, quota: Option<u64>) -> PartitionStatus {
        match (self.counts.get(&id), quota) {
            (None, _) => PartitionStatus::Unseen,
            (Some(&count), Some(quota)) if count > quota => PartitionStatus::OverQuota,
            (Some(_), _) => PartitionStatus::WithinQuota,
        }
    }

    /// Observed partitions with their occupancy.
    pub fn iter(&self) -> impl Iterator<Item = (PartitionId, u64)> + '_ {
        self.counts.iter().map(|(&id, &count)| (id, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lazy_entry_creation() {
        let mut table = OccupancyTable::new();
        assert!(!table.contains(7));
        assert_eq!(table.get(7), 0);
        assert_eq!(table.status(7, Some(1)), PartitionStatus::Unseen);

        table.acquire(7);
        assert!(table.contains(7));
        assert_eq!(table.get(7), 1);
    }

    #[test]
    fn test_release_underflow_leaves_state_untouched() {
        let mut table = OccupancyTable::new();
        let err = table.release("test", 3).unwrap_err();
        assert_eq!(
            err,
            PartitionError::AccountingUnderflow {
                policy: "test",
                partition_id: 3
            }
        );
        assert!(!table.contains(3));

        table.acquire(3);
        table.release("test", 3).unwrap();
        assert!(table.release("test", 3).is_err());
        assert_eq!(table.get(3), 0);
    }

    #[test]
    fn test_status_crosses_quota() {
        let mut table = OccupancyTable::new();
        table.acquire(1);
        table.acquire(1);
        assert_eq!(table.status(1, Some(2)), PartitionStatus::WithinQuota);
        table.acquire(1);
        assert_eq!(table.status(1, Some(2)), PartitionStatus::OverQuota);
        assert_eq!(table.status(1, None), PartitionStatus::WithinQuota);
        table.release("test", 1).unwrap();
        assert_eq!(table.status(1, Some(2)), PartitionStatus::WithinQuota);
    }
}
