//! Maximum-capacity partitioning.
//!
//! Each configured partition may hold at most a fraction of the cache's
//! blocks. Once a partition reaches its maximum it can only replace lines
//! it already owns.

use std::collections::HashMap;

use tracing::debug;

use crate::partition::occupancy::{OccupancyTable, PartitionStatus};
use crate::partition::policy::PartitioningPolicy;
use crate::partition::{ConfigError, PartitionError, PartitionId, PartitionedEntry};

const NAME: &str = "MaxCapacity";

#[derive(Debug, Clone)]
pub struct MaxCapacityPolicy {
    /// Maximum number of blocks per configured partition.
    max_blocks: HashMap<PartitionId, u64>,

    occupancy: OccupancyTable,
}

impl MaxCapacityPolicy {
    /// `capacities[i]` is the fraction of `total_blocks` granted to
    /// `partition_ids[i]`.
    pub fn new(
        partition_ids: &[PartitionId],
        capacities: &[f64],
        total_blocks: u64,
    ) -> Result<Self, ConfigError> {
        if partition_ids.len() != capacities.len() {
            return Err(ConfigError::LengthMismatch {
                policy: NAME,
                ids: partition_ids.len(),
                values: capacities.len(),
            });
        }

        let mut max_blocks = HashMap::with_capacity(partition_ids.len());
        for (&partition_id, &capacity) in partition_ids.iter().zip(capacities) {
            if !(0.0..=1.0).contains(&capacity) {
                return Err(ConfigError::CapacityOutOfRange {
                    partition_id,
                    capacity,
                });
            }
            let blocks = (capacity * total_blocks as f64) as u64;
            if max_blocks.insert(partition_id, blocks).is_some() {
                return Err(ConfigError::DuplicatePartition {
                    policy: NAME,
                    partition_id,
                });
            }
            debug!(partition_id, capacity, blocks, "MaxCapacity allocation");
        }

        Ok(Self {
            max_blocks,
            occupancy: OccupancyTable::new(),
        })
    }

    /// Maximum block count for `id`; `None` if unrestricted.
    pub fn max_blocks(&self, id: PartitionId) -> Option<u64> {
        self.max_blocks.get(&id).copied()
    }

    fn at_capacity(&self, id: PartitionId) -> bool {
        match self.max_blocks(id) {
            Some(max) => self.occupancy.get(id) >= max,
            None => false,
        }
    }
}

impl PartitioningPolicy for MaxCapacityPolicy {
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
        !self.at_capacity(requester) || slot.owner() == Some(requester)
    }

    fn occupancy(&self, id: PartitionId) -> u64 {
        self.occupancy.get(id)
    }

    fn status(&self, id: PartitionId) -> PartitionStatus {
        self.occupancy.status(id, self.max_blocks(id))
    }

    fn partitions(&self) -> Vec<(PartitionId, u64)> {
        self.occupancy.iter().collect()
    }
}
