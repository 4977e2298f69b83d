//! Strict per-partition quota.
//!
//! A partition within its quota cannot lose lines to other partitions. Once
//! it exceeds the quota its lines become eligible victims for everyone until
//! it shrinks back.

use std::collections::HashMap;

use tracing::debug;

use crate::config::QuotaEntry;
use crate::partition::occupancy::{OccupancyTable, PartitionStatus};
use crate::partition::policy::PartitioningPolicy;
use crate::partition::{ConfigError, PartitionError, PartitionId, PartitionedEntry};

const NAME: &str = "StrictQuota";

#[derive(Debug, Clone)]
pub struct StrictQuotaPolicy {
    quotas: HashMap<PartitionId, u64>,

    /// Quota applied to partitions missing from `quotas`.
    default_quota: Option<u64>,

    occupancy: OccupancyTable,
}

impl StrictQuotaPolicy {
    pub fn new(entries: &[QuotaEntry], default_quota: Option<u64>) -> Result<Self, ConfigError> {
        let mut quotas = HashMap::with_capacity(entries.len());
        for entry in entries {
            if quotas.insert(entry.partition_id, entry.quota).is_some() {
                return Err(ConfigError::DuplicatePartition {
                    policy: NAME,
                    partition_id: entry.partition_id,
                });
            }
        }

        debug!(partitions = quotas.len(), ?default_quota, "StrictQuota policy created");

        Ok(Self {
            quotas,
            default_quota,
            occupancy: OccupancyTable::new(),
        })
    }

    /// Configured quota for `id`, if any.
    pub fn quota(&self, id: PartitionId) -> Option<u64> {
        self.quotas.get(&id).copied().or(self.default_quota)
    }
}

impl PartitioningPolicy for StrictQuotaPolicy {
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
        match slot.owner() {
            None => true,
            Some(owner) if owner == requester => true,
            // An owner without a quota has no reservation to protect.
            Some(owner) => match self.quota(owner) {
                Some(quota) => self.occupancy.get(owner) > quota,
                None => true,
            },
        }
    }

    fn occupancy(&self, id: PartitionId) -> u64 {
        self.occupancy.get(id)
    }

    fn status(&self, id: PartitionId) -> PartitionStatus {
        self.occupancy.status(id, self.quota(id))
    }

    fn partitions(&self) -> Vec<(PartitionId, u64)> {
        self.occupancy.iter().collect()
    }
}
