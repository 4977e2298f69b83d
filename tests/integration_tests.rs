//! Integration tests for the full trace-replay pipeline.

use std::io::Write;

use cache_partition::config::Config;
use cache_partition::metrics::PartitionMetrics;
use cache_partition::partition::classifier::RequestAttributes;
use cache_partition::sim::cache::{AccessOutcome, SetAssocCache};
use cache_partition::sim::trace::{read_trace, replay, TraceError};

const CONFIG: &str = r#"{
    "cache": { "size_bytes": 1024, "block_size": 64, "assoc": 4 },
    "classifier": {
        "requestor_groups": [
            { "partition_id": 0, "requestors": [3, 4, 5, 6, 7, 8] },
            { "partition_id": 1, "requestors": [9, 10, 11, 12, 13, 14] }
        ]
    },
    "policies": [
        { "type": "StrictQuota", "quotas": [
            { "partition_id": 0, "quota": 8 },
            { "partition_id": 1, "quota": 8 }
        ] }
    ]
}"#;

fn write_temp(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn load_cache() -> SetAssocCache {
    let config_file = write_temp(CONFIG);
    let config = Config::load(config_file.path()).unwrap();
    SetAssocCache::from_config(&config).unwrap()
}

#[test]
fn test_config_file_round_trip() {
    let config_file = write_temp(CONFIG);
    let config = Config::load(config_file.path()).unwrap();
    let geometry = config.cache.geometry().unwrap();
    assert_eq!(geometry.sets, 4);
    assert_eq!(config.policies.len(), 1);
    assert_eq!(config.classifier.requestor_groups.len(), 2);
}

#[test]
fn test_missing_config_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(&dir.path().join("absent.json")).unwrap();
    assert!(config.policies.is_empty());
}

#[test]
fn test_streaming_partition_cannot_evict_protected_lines() {
    let mut cache = load_cache();
    let cpu0 = RequestAttributes::from_requestor(8);
    let cpu1 = RequestAttributes::from_requestor(14);

    // Partition 0 fills two ways of every set: 8 lines, exactly its quota.
    for n in 0..8u64 {
        cache.access(n * 64, &cpu0).unwrap();
    }

    // Partition 1 streams far more lines than the cache holds.
    for n in 100..200u64 {
        cache.access(n * 64, &cpu1).unwrap();
    }

    for n in 0..8u64 {
        assert_eq!(cache.owner_of(n * 64), Some(0), "line {n} lost");
    }
    assert_eq!(cache.manager().occupancy(0), Some(8));
    assert_eq!(cache.stats()[&0].evictions, 0);
}

#[test]
fn test_replay_accounting_matches_valid_lines() {
    let trace: String = (0..64u64)
        .map(|n| {
            let requestor = if n % 3 == 0 { 4 } else { 12 };
            format!("{{\"addr\": {}, \"requestor_id\": {requestor}}}\n", (n % 40) * 64)
        })
        .chain((0..10u64).map(|n| format!("{{\"addr\": {}, \"op\": \"invalidate\"}}\n", n * 64)))
        .collect();
    let trace_file = write_temp(&trace);

    let mut cache = load_cache();
    let records = read_trace(trace_file.path()).unwrap();
    let report = replay(&mut cache, &records).unwrap();

    assert_eq!(report.accesses, 64);
    assert_eq!(report.hits + report.misses, 64);

    let owned: u64 = report.partitions.values().map(|s| s.occupancy).sum();
    assert_eq!(owned as usize, report.valid_lines);
    for (&id, stats) in &report.partitions {
        assert_eq!(cache.manager().occupancy(id), Some(stats.occupancy));
    }
}

#[test]
fn test_passthrough_never_bypasses() {
    let mut cache = SetAssocCache::from_config(&Config::default())
        .unwrap()
        .with_metrics(PartitionMetrics::new().unwrap());
    let attrs = RequestAttributes::from_tag("anything");

    for n in 0..50_000u64 {
        let outcome = cache.access(n * 64, &attrs).unwrap();
        assert_ne!(outcome, AccessOutcome::Bypass);
    }
    assert_eq!(cache.valid_lines(), cache.geometry().total_blocks());
    assert_eq!(cache.stats()[&0].occupancy as usize, cache.valid_lines());
}

#[test]
fn test_malformed_trace_file() {
    let trace_file = write_temp("{\"addr\": 0}\n{\"addr\": \"zero\"}\n");
    match read_trace(trace_file.path()) {
        Err(TraceError::Parse { line, .. }) => assert_eq!(line, 2),
        other => panic!("expected parse error, got {other:?}"),
    }
}
