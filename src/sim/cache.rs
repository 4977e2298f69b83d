//! Set-associative cache model driving the partition manager.
//!
//! Plays the part of the tag array and replacement logic: it owns the
//! lines, picks LRU victims among the candidates the manager leaves, and
//! reports fills and evictions back to it.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, trace};

use crate::config::{CacheGeometry, Config};
use crate::metrics::{PartitionMetrics, HIT, MISS};
use crate::partition::classifier::RequestAttributes;
use crate::partition::manager::PartitionManager;
use crate::partition::{ConfigError, PartitionError, PartitionId, PartitionedEntry};

#[derive(Error, Debug)]
pub enum CacheError {
    #[error(transparent)]
    Partition(#[from] PartitionError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// One line of storage.
#[derive(Debug, Clone)]
pub struct CacheBlock {
    pub tag: u64,

    /// Owning partition; `None` while the line is invalid.
    pub owner: Option<PartitionId>,

    pub way: usize,

    /// Access tick of the last hit or fill.
    pub last_touch: u64,
}

impl CacheBlock {
    fn empty(way: usize) -> Self {
        Self {
            tag: 0,
            owner: None,
            way,
            last_touch: 0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.owner.is_some()
    }
}

impl PartitionedEntry for CacheBlock {
    fn owner(&self) -> Option<PartitionId> {
        self.owner
    }

    fn way(&self) -> usize {
        self.way
    }
}

/// What happened on an access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOutcome {
    Hit,
    /// Miss filled into `way`, evicting the line of `evicted` if any.
    Fill {
        way: usize,
        evicted: Option<PartitionId>,
    },
    /// Miss with no eligible victim; the line was not allocated.
    Bypass,
}

/// Per-partition counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartitionStats {
    pub hits: u64,
    pub misses: u64,
    pub bypasses: u64,
    /// Lines this partition lost to fills.
    pub evictions: u64,
    /// Valid lines currently owned.
    pub occupancy: u64,
}

pub struct SetAssocCache {
    geometry: CacheGeometry,
    sets: Vec<Vec<CacheBlock>>,
    manager: PartitionManager,
    stats: BTreeMap<PartitionId, PartitionStats>,
    metrics: Option<PartitionMetrics>,
    tick: u64,
}

impl SetAssocCache {
    pub fn new(geometry: CacheGeometry, manager: PartitionManager) -> Self {
        let sets = (0..geometry.sets)
            .map(|_| (0..geometry.assoc).map(CacheBlock::empty).collect())
            .collect();

        Self {
            geometry,
            sets,
            manager,
            stats: BTreeMap::new(),
            metrics: None,
            tick: 0,
        }
    }

    /// Build cache and manager from configuration.
    pub fn from_config(config: &Config) -> Result<Self, CacheError> {
        let geometry = config.cache.geometry()?;
        let manager = PartitionManager::from_config(config)?;
        Ok(Self::new(geometry, manager))
    }

    pub fn with_metrics(mut self, metrics: PartitionMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Look up `addr` for a request, filling on miss when a victim is
    /// available.
    pub fn access(&mut self, addr: u64, attrs: &RequestAttributes) -> Result<AccessOutcome, CacheError> {
        self.tick += 1;
        let id = self.manager.classify(attrs);
        let set_idx = self.geometry.set_index(addr);
        let tag = self.geometry.tag(addr);

        if let Some(way) = self.find_way(set_idx, tag) {
            self.sets[set_idx][way].last_touch = self.tick;
            self.stats.entry(id).or_default().hits += 1;
            self.record(id, HIT);
            trace!(addr, partition_id = id, "Hit");
            return Ok(AccessOutcome::Hit);
        }

        self.stats.entry(id).or_default().misses += 1;
        self.record(id, MISS);

        let victim_way = {
            let candidates: Vec<&CacheBlock> = self.sets[set_idx].iter().collect();
            let eligible = self.manager.filter_candidates(candidates, id);
            lru_victim(&eligible)
        };

        let Some(way) = victim_way else {
            self.stats.entry(id).or_default().bypasses += 1;
            if let Some(metrics) = &self.metrics {
                metrics.record_bypass(id);
            }
            debug!(addr, partition_id = id, set = set_idx, "No eligible victim, bypassing");
            return Ok(AccessOutcome::Bypass);
        };

        let evicted = self.sets[set_idx][way].owner;
        if let Some(old) = evicted {
            self.manager.notify_release(old)?;
            let old_stats = self.stats.entry(old).or_default();
            old_stats.evictions += 1;
            old_stats.occupancy -= 1;
            let occupancy = old_stats.occupancy;
            if let Some(metrics) = &self.metrics {
                metrics.record_eviction(old);
                metrics.set_occupancy(old, occupancy);
            }
            debug!(addr, set = set_idx, way, victim = old, partition_id = id, "Evicted line");
        }

        let block = &mut self.sets[set_idx][way];
        block.tag = tag;
        block.owner = Some(id);
        block.last_touch = self.tick;
        self.manager.notify_acquire(id);

        let new_stats = self.stats.entry(id).or_default();
        new_stats.occupancy += 1;
        let occupancy = new_stats.occupancy;
        if let Some(metrics) = &self.metrics {
            metrics.set_occupancy(id, occupancy);
        }

        Ok(AccessOutcome::Fill { way, evicted })
    }

    /// Drop the line holding `addr`, if present. Returns whether a line was
    /// invalidated.
    pub fn invalidate(&mut self, addr: u64) -> Result<bool, CacheError> {
        let set_idx = self.geometry.set_index(addr);
        let tag = self.geometry.tag(addr);

        let Some(owner) = self
            .find_way(set_idx, tag)
            .and_then(|way| self.sets[set_idx][way].owner.take())
        else {
            return Ok(false);
        };
        self.manager.notify_release(owner)?;

        let stats = self.stats.entry(owner).or_default();
        stats.occupancy -= 1;
        let occupancy = stats.occupancy;
        if let Some(metrics) = &self.metrics {
            metrics.set_occupancy(owner, occupancy);
        }
        debug!(addr, partition_id = owner, "Invalidated line");
        Ok(true)
    }

    /// Owner of the line holding `addr`, if cached.
    pub fn owner_of(&self, addr: u64) -> Option<PartitionId> {
        let set_idx = self.geometry.set_index(addr);
        self.find_way(set_idx, self.geometry.tag(addr))
            .and_then(|way| self.sets[set_idx][way].owner)
    }

    pub fn valid_lines(&self) -> usize {
        self.sets.iter().flatten().filter(|b| b.is_valid()).count()
    }

    pub fn stats(&self) -> &BTreeMap<PartitionId, PartitionStats> {
        &self.stats
    }

    pub fn manager(&self) -> &PartitionManager {
        &self.manager
    }

    pub fn geometry(&self) -> CacheGeometry {
        self.geometry
    }

    fn find_way(&self, set_idx: usize, tag: u64) -> Option<usize> {
        self.sets[set_idx]
            .iter()
            .position(|b| b.is_valid() && b.tag == tag)
    }

    fn record(&self, id: PartitionId, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_access(id, outcome);
        }
    }
}

/// Free line first, otherwise least recently touched.
fn lru_victim(candidates: &[&CacheBlock]) -> Option<usize> {
    candidates
        .iter()
        .find(|b| !b.is_valid())
        .or_else(|| candidates.iter().min_by_key(|b| b.last_touch))
        .map(|b| b.way)
}
