//! Runtime configuration for cache-partition.
//!
//! Configuration can be loaded from a JSON file or constructed programmatically.
//! Cache geometry, classification tables and the ordered policy list live here.

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::partition::{ConfigError, PartitionId};

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "cache-partition", about = "Partitioned cache trace simulator")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Path to the access trace (JSON lines).
    #[arg(short, long)]
    pub trace: PathBuf,

    /// Write the per-partition report to this file instead of stdout.
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Print Prometheus metrics after the run.
    #[arg(long)]
    pub metrics: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cache geometry.
    pub cache: CacheConfig,

    /// Request → partition tables.
    pub classifier: ClassifierConfig,

    /// Partitioning policies, applied in order.
    pub policies: Vec<PolicyConfig>,
}

/// Cache geometry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Total capacity in bytes.
    pub size_bytes: usize,

    /// Line size in bytes.
    pub block_size: usize,

    /// Ways per set.
    pub assoc: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            size_bytes: 1024 * 1024, // 1 MB
            block_size: 64,
            assoc: 16,
        }
    }
}

/// Validated cache shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheGeometry {
    pub sets: usize,
    pub assoc: usize,
    pub block_size: usize,
}

impl CacheGeometry {
    pub fn total_blocks(&self) -> usize {
        self.sets * self.assoc
    }

    /// Set an address maps to.
    pub fn set_index(&self, addr: u64) -> usize {
        ((addr / self.block_size as u64) % self.sets as u64) as usize
    }

    /// Tag bits of an address.
    pub fn tag(&self, addr: u64) -> u64 {
        addr / self.block_size as u64 / self.sets as u64
    }
}

impl CacheConfig {
    /// Derive and validate the set/way layout.
    pub fn geometry(&self) -> Result<CacheGeometry, ConfigError> {
        if !self.block_size.is_power_of_two() {
            return Err(ConfigError::InvalidGeometry(format!(
                "block size {} is not a power of two",
                self.block_size
            )));
        }
        if self.assoc == 0 {
            return Err(ConfigError::InvalidGeometry("associativity is zero".into()));
        }
        let way_bytes = self.block_size.checked_mul(self.assoc).ok_or_else(|| {
            ConfigError::InvalidGeometry(format!(
                "block_size {} * assoc {} overflows",
                self.block_size, self.assoc
            ))
        })?;
        if self.size_bytes == 0 || self.size_bytes % way_bytes != 0 {
            return Err(ConfigError::InvalidGeometry(format!(
                "size {} is not a multiple of block_size * assoc ({way_bytes})",
                self.size_bytes
            )));
        }
        let sets = self.size_bytes / way_bytes;
        if !sets.is_power_of_two() {
            return Err(ConfigError::InvalidGeometry(format!(
                "set count {sets} is not a power of two"
            )));
        }
        Ok(CacheGeometry {
            sets,
            assoc: self.assoc,
            block_size: self.block_size,
        })
    }
}

/// Classification tables. Both empty means a single default partition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Tag → partition, consulted first.
    pub tags: Vec<TagEntry>,

    /// Requestor id groups → partition.
    pub requestor_groups: Vec<RequestorGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagEntry {
    pub tag: String,
    pub partition_id: PartitionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestorGroup {
    pub partition_id: PartitionId,
    pub requestors: Vec<u32>,
}

/// One partitioning policy and its parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PolicyConfig {
    /// Per-partition occupancy quotas.
    StrictQuota {
        #[serde(default)]
        quotas: Vec<QuotaEntry>,
        /// Quota for partitions missing from `quotas` (none = unprotected).
        #[serde(default)]
        default_quota: Option<u64>,
    },

    /// Fraction of the cache each partition may fill.
    MaxCapacity {
        partition_ids: Vec<PartitionId>,
        capacities: Vec<f64>,
    },

    /// Ways reserved per partition.
    Way { allocations: Vec<WayAllocation> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaEntry {
    pub partition_id: PartitionId,
    pub quota: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WayAllocation {
    pub partition_id: PartitionId,
    pub ways: Vec<usize>,
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }
}
