//! Prometheus metrics for partitioned cache runs.

use prometheus::{IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::partition::PartitionId;

/// Access outcome label values. Every miss counts as `miss`, whether it
/// filled a line or bypassed; bypasses are also counted separately.
pub const HIT: &str = "hit";
pub const MISS: &str = "miss";

/// Per-partition counters and gauges, held in a private registry.
#[derive(Clone)]
pub struct PartitionMetrics {
    registry: Registry,
    accesses: IntCounterVec,
    bypasses: IntCounterVec,
    evictions: IntCounterVec,
    occupancy: IntGaugeVec,
}

impl PartitionMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let accesses = IntCounterVec::new(
            Opts::new("cache_partition_accesses_total", "Cache accesses by partition and outcome"),
            &["partition", "outcome"],
        )?;
        let bypasses = IntCounterVec::new(
            Opts::new(
                "cache_partition_bypasses_total",
                "Misses left unallocated because no candidate was eligible",
            ),
            &["partition"],
        )?;
        let evictions = IntCounterVec::new(
            Opts::new(
                "cache_partition_evictions_total",
                "Lines evicted from a partition to make room for a fill",
            ),
            &["partition"],
        )?;
        let occupancy = IntGaugeVec::new(
            Opts::new("cache_partition_occupancy_blocks", "Lines currently owned by a partition"),
            &["partition"],
        )?;

        registry.register(Box::new(accesses.clone()))?;
        registry.register(Box::new(bypasses.clone()))?;
        registry.register(Box::new(evictions.clone()))?;
        registry.register(Box::new(occupancy.clone()))?;

        Ok(Self {
            registry,
            accesses,
            bypasses,
            evictions,
            occupancy,
        })
    }

    pub fn record_access(&self, id: PartitionId, outcome: &str) {
        let partition = id.to_string();
        self.accesses
            .with_label_values(&[partition.as_str(), outcome])
            .inc();
    }

    pub fn record_bypass(&self, id: PartitionId) {
        let partition = id.to_string();
        self.bypasses.with_label_values(&[partition.as_str()]).inc();
    }

    pub fn record_eviction(&self, victim: PartitionId) {
        let partition = victim.to_string();
        self.evictions.with_label_values(&[partition.as_str()]).inc();
    }

    pub fn set_occupancy(&self, id: PartitionId, blocks: u64) {
        let partition = id.to_string();
        self.occupancy
            .with_label_values(&[partition.as_str()])
            .set(blocks as i64);
    }

    /// Text exposition of every metric.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}
