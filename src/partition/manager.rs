//! Partition manager: the single entry point the cache layer talks to.
//!
//! On every access the cache asks for the request's partition, notifies
//! acquire on fill and release on eviction, and hands its replacement
//! candidates over for filtering before picking a victim.

use tracing::{debug, info};

use crate::config::{Config, PolicyConfig};
use crate::partition::classifier::{build_classifier, DefaultClassifier, PartitionClassifier, RequestAttributes};
use crate::partition::max_capacity::MaxCapacityPolicy;
use crate::partition::policy::PartitioningPolicy;
use crate::partition::strict_quota::StrictQuotaPolicy;
use crate::partition::way::WayPartitioningPolicy;
use crate::partition::{ConfigError, PartitionError, PartitionId, PartitionedEntry};

#[derive(Debug)]
pub struct PartitionManager {
    classifier: Box<dyn PartitionClassifier>,

    /// Applied in order; a slot survives filtering only if every policy
    /// accepts it.
    policies: Vec<Box<dyn PartitioningPolicy>>,
}

impl Default for PartitionManager {
    fn default() -> Self {
        Self::passthrough()
    }
}

impl PartitionManager {
    pub fn new(
        policies: Vec<Box<dyn PartitioningPolicy>>,
        classifier: Box<dyn PartitionClassifier>,
    ) -> Self {
        Self {
            classifier,
            policies,
        }
    }

    /// No policies and a single partition: filtering is the identity and
    /// accounting is a no-op.
    pub fn passthrough() -> Self {
        Self::new(Vec::new(), Box::new(DefaultClassifier))
    }

    /// Build the manager described by `config`.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let geometry = config.cache.geometry()?;
        let mut policies: Vec<Box<dyn PartitioningPolicy>> = Vec::with_capacity(config.policies.len());

        for policy in &config.policies {
            let built: Box<dyn PartitioningPolicy> = match policy {
                PolicyConfig::StrictQuota {
                    quotas,
                    default_quota,
                } => Box::new(StrictQuotaPolicy::new(quotas, *default_quota)?),
                PolicyConfig::MaxCapacity {
                    partition_ids,
                    capacities,
                } => Box::new(MaxCapacityPolicy::new(
                    partition_ids,
                    capacities,
                    geometry.total_blocks() as u64,
                )?),
                PolicyConfig::Way { allocations } => {
                    Box::new(WayPartitioningPolicy::new(allocations, geometry.assoc)?)
                }
            };
            policies.push(built);
        }

        let classifier = build_classifier(&config.classifier)?;

        info!(
            policies = ?policies.iter().map(|p| p.name()).collect::<Vec<_>>(),
            "Partition manager configured"
        );

        Ok(Self::new(policies, classifier))
    }

    /// Partition a request belongs to.
    pub fn classify(&self, attrs: &RequestAttributes) -> PartitionId {
        self.classifier.classify(attrs)
    }

    /// A slot has just been filled on behalf of `id`.
    pub fn notify_acquire(&mut self, id: PartitionId) {
        for policy in &mut self.policies {
            policy.on_acquire(id);
        }
    }

    /// A slot attributed to `id` has been evicted or invalidated.
    ///
    /// Every policy is notified; the first underflow is returned. An error
    /// here means acquire/release calls upstream are unbalanced.
    pub fn notify_release(&mut self, id: PartitionId) -> Result<(), PartitionError> {
        let mut first_err = None;
        for policy in &mut self.policies {
            if let Err(e) = policy.on_release(id) {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Whether every policy accepts `slot` as a victim for `requester`.
    pub fn is_eligible(&self, slot: &dyn PartitionedEntry, requester: PartitionId) -> bool {
        self.policies
            .iter()
            .all(|policy| policy.is_eligible(slot, requester))
    }

    /// Narrow replacement candidates to those usable by `requester`.
    ///
    /// Order is preserved. An empty result means no victim is available
    /// under the current policies; the caller decides what to do.
    pub fn filter_candidates<'a, E: PartitionedEntry>(
        &self,
        mut candidates: Vec<&'a E>,
        requester: PartitionId,
    ) -> Vec<&'a E> {
        if self.policies.is_empty() {
            return candidates;
        }

        let before = candidates.len();
        candidates.retain(|&slot| self.is_eligible(slot, requester));

        debug!(
            partition_id = requester,
            before,
            after = candidates.len(),
            "Filtered replacement candidates"
        );
        candidates
    }

    /// Occupancy of `id` as tracked by the first policy; `None` without
    /// policies.
    pub fn occupancy(&self, id: PartitionId) -> Option<u64> {
        self.policies.first().map(|policy| policy.occupancy(id))
    }

    pub fn policies(&self) -> &[Box<dyn PartitioningPolicy>] {
        &self.policies
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QuotaEntry;
    use crate::partition::classifier::TableClassifier;
    use crate::partition::occupancy::PartitionStatus;
    use crate::partition::test_support::TestSlot;

    const A: PartitionId = 1;
    const B: PartitionId = 2;

    fn quota_manager(quota: u64) -> PartitionManager {
        let policy = StrictQuotaPolicy::new(&[QuotaEntry { partition_id: A, quota }], None).unwrap();
        PartitionManager::new(vec![Box::new(policy)], Box::new(DefaultClassifier))
    }

    #[test]
    fn test_passthrough_is_identity() {
        let mut manager = PartitionManager::passthrough();
        let slots = [TestSlot::owned(A, 0), TestSlot::free(1), TestSlot::owned(B, 2)];
        let candidates: Vec<&TestSlot> = slots.iter().collect();

        let filtered = manager.filter_candidates(candidates, B);
        assert_eq!(filtered.len(), 3);

        manager.notify_acquire(A);
        assert!(manager.notify_release(A).is_ok());
        assert!(manager.notify_release(A).is_ok());
        assert_eq!(manager.occupancy(A), None);
        assert_eq!(manager.classify(&RequestAttributes::from_tag("T1")), 0);
    }

    #[test]
    fn test_quota_scenario() {
        let mut manager = quota_manager(2);
        let slots = [TestSlot::owned(A, 0), TestSlot::owned(A, 1), TestSlot::owned(A, 2)];

        manager.notify_acquire(A);
        manager.notify_acquire(A);
        assert_eq!(manager.occupancy(A), Some(2));
        assert!(manager.filter_candidates(slots.iter().collect(), B).is_empty());

        manager.notify_acquire(A);
        assert_eq!(manager.policies()[0].status(A), PartitionStatus::OverQuota);
        assert_eq!(manager.filter_candidates(slots.iter().collect(), B).len(), 3);

        manager.notify_release(A).unwrap();
        assert_eq!(manager.policies()[0].status(A), PartitionStatus::WithinQuota);
        assert!(manager.filter_candidates(slots.iter().collect(), B).is_empty());
    }

    #[test]
    fn test_release_underflow_surfaces() {
        let mut manager = quota_manager(2);
        assert_eq!(
            manager.notify_release(A),
            Err(PartitionError::AccountingUnderflow {
                policy: "StrictQuota",
                partition_id: A
            })
        );
    }

    #[test]
    fn test_policies_compose_with_and() {
        let quota = StrictQuotaPolicy::new(&[QuotaEntry { partition_id: A, quota: 0 }], None).unwrap();
        let ways = WayPartitioningPolicy::new(
            &[crate::config::WayAllocation {
                partition_id: B,
                ways: vec![0, 1],
            }],
            4,
        )
        .unwrap();
        let mut manager = PartitionManager::new(
            vec![Box::new(quota), Box::new(ways)],
            Box::new(DefaultClassifier),
        );
        manager.notify_acquire(A);

        // A is over its zero quota, so only the way allocation restricts B.
        let slots = [TestSlot::owned(A, 0), TestSlot::owned(A, 1), TestSlot::owned(A, 2)];
        let filtered = manager.filter_candidates(slots.iter().collect(), B);
        let ways: Vec<usize> = filtered.iter().map(|s| s.way).collect();
        assert_eq!(ways, vec![0, 1]);
    }

    #[test]
    fn test_classify_uses_configured_table() {
        let mut table = TableClassifier::new();
        table.insert_tag("T1".into(), 5).unwrap();
        let manager = PartitionManager::new(Vec::new(), Box::new(table));
        assert_eq!(manager.classify(&RequestAttributes::from_tag("T1")), 5);
        assert_eq!(manager.classify(&RequestAttributes::from_tag("T9")), 0);
    }
}
