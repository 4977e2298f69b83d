//! Way partitioning: each allocated partition replaces only within its
//! own subset of ways.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::config::WayAllocation;
use crate::partition::occupancy::{OccupancyTable, PartitionStatus};
use crate::partition::policy::PartitioningPolicy;
use crate::partition::{ConfigError, PartitionError, PartitionId, PartitionedEntry};

const NAME: &str = "Way";

#[derive(Debug, Clone)]
pub struct WayPartitioningPolicy {
    ways: HashMap<PartitionId, BTreeSet<usize>>,
    occupancy: OccupancyTable,
}

impl WayPartitioningPolicy {
    pub fn new(allocations: &[WayAllocation], assoc: usize) -> Result<Self, ConfigError> {
        let mut ways = HashMap::with_capacity(allocations.len());
        for alloc in allocations {
            if alloc.ways.is_empty() {
                return Err(ConfigError::EmptyAllocation(alloc.partition_id));
            }
            if let Some(&way) = alloc.ways.iter().find(|&&w| w >= assoc) {
                return Err(ConfigError::WayOutOfRange {
                    partition_id: alloc.partition_id,
                    way,
                    assoc,
                });
            }
            let set: BTreeSet<usize> = alloc.ways.iter().copied().collect();
            debug!(partition_id = alloc.partition_id, ways = ?set, "Way allocation");
            if ways.insert(alloc.partition_id, set).is_some() {
                return Err(ConfigError::DuplicatePartition {
                    policy: NAME,
                    partition_id: alloc.partition_id,
                });
            }
        }

        Ok(Self {
            ways,
            occupancy: OccupancyTable::new(),
        })
    }

    /// Ways reserved for `id`; `None` if unrestricted.
    pub fn ways(&self, id: PartitionId) -> Option<&BTreeSet<usize>> {
        self.ways.get(&id)
    }
}

impl PartitioningPolicy for WayPartitioningPolicy {
    fn name(&self) -> &'static str {
        NAME
    }

    fn on_acquire(&mut self, id: PartitionId) {
        self.occupancy.acquire(id);
    }

    fn on_release(&mut self, id: PartitionId) -> Result<(), PartitionError> {
        self.occupancy.release(NAME, id)
    }

    fn is_eligible(&self, slot: &dyn PartitionedEntry, requester: PartitionId) -> bool {
        match self.ways.get(&requester) {
            Some(ways) => ways.contains(&slot.way()),
            None => true,
        }
    }

    fn occupancy(&self, id: PartitionId) -> u64 {
        self.occupancy.get(id)
    }

    fn status(&self, id: PartitionId) -> PartitionStatus {
        // Ways bound placement, not occupancy.
        self.occupancy.status(id, None)
    }

    fn partitions(&self) -> Vec<(PartitionId, u64)> {
        self.occupancy.iter().collect()
    }
}
