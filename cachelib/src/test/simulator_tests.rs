use std::error::Error;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tracing::Level;
use crate::cache::{AccessKind, AccessResult, Cache};
use crate::config::{CacheConfig, Geometry, PolicyKind, SimulationConfig, TimingConfig};
use crate::error::{ConfigurationError, SimulationError};
use crate::observer::{CacheObserver, TracingObserver};
use crate::simulator::{PolicyComparison, Simulator};
use crate::util::{locality_trace, random_trace, render_trace, sequential_trace};

fn two_level() -> Result<SimulationConfig, serde_json::Error> {
    serde_json::from_str(
        r#"{
            "caches": [
                { "name": "small", "size": 256, "block_size": 64, "associativity": 4, "policy": "lru" },
                {
                    "name": "large",
                    "size": 4096,
                    "block_size": 64,
                    "associativity": 4,
                    "policy": "random",
                    "seed": 3,
                    "timing": { "hit_latency": 2, "miss_latency": 20 }
                }
            ]
        }"#,
    )
}

#[test]
fn caches_see_the_same_trace() -> Result<(), Box<dyn Error>> {
    let mut simulator = Simulator::new(&two_level()?)?;
    let trace = "R 0x000\nR 0x040\nR 0x080\nR 0x0C0\nR 0x000\nW 0x100\nnot an access\nR 0x040\n";
    let result = simulator.simulate(trace.as_bytes())?;
    assert_eq!(result.accesses, 7);
    assert_eq!(result.skipped_lines, 1);
    let [small, large] = &result.caches[..] else {
        panic!("expected two caches");
    };
    assert_eq!((small.name.as_str(), small.policy.as_str()), ("small", "LRU"));
    // 0x040 was the LRU victim of the write to 0x100
    assert_eq!((small.stats.hits, small.stats.misses, small.stats.evictions), (1, 6, 2));
    assert_eq!(small.cycles, None);
    assert_eq!((large.stats.hits, large.stats.misses, large.stats.evictions), (2, 5, 0));
    assert_eq!(large.cycles, Some(2 * 2 + 5 * 20));
    assert_eq!(simulator.get_uninitialised_line_counts(), vec![0, 59]);
    Ok(())
}

#[test]
fn text_and_replay_agree() -> Result<(), Box<dyn Error>> {
    let config = two_level()?;
    let records = random_trace(4000, 0x2000, 3, 21);
    let mut from_text = Simulator::new(&config)?;
    let mut from_records = Simulator::new(&config)?;
    assert_eq!(from_text.simulate(render_trace(&records).as_bytes())?, from_records.replay(records));
    Ok(())
}

#[test]
fn reset_clears_results() -> Result<(), Box<dyn Error>> {
    let mut simulator = Simulator::new(&two_level()?)?;
    let records = random_trace(1000, 0x4000, 2, 4);
    let first = simulator.replay(records.clone());
    simulator.reset();
    let cleared = simulator.result();
    assert_eq!(cleared.accesses, 0);
    assert!(cleared.caches.iter().all(|c| c.stats.total_accesses() == 0));
    assert_eq!(simulator.replay(records), first);
    Ok(())
}

#[test]
fn repeated_simulation_accumulates() -> Result<(), Box<dyn Error>> {
    let mut simulator = Simulator::new(&two_level()?)?;
    simulator.replay(sequential_trace(256, 64));
    let result = simulator.replay(sequential_trace(256, 64));
    assert_eq!(result.accesses, 8);
    // The four blocks fit in both caches
    assert!(result.caches.iter().all(|c| c.stats.hits == 4 && c.stats.misses == 4));
    Ok(())
}

#[test]
fn invalid_configurations() -> Result<(), Box<dyn Error>> {
    assert!(matches!(Simulator::new(&SimulationConfig { caches: vec![] }), Err(SimulationError::NoCaches)));
    let config: SimulationConfig = serde_json::from_str(
        r#"{"caches": [{ "name": "odd", "size": 1000, "block_size": 64, "associativity": 2 }]}"#,
    )?;
    match Simulator::new(&config) {
        Err(SimulationError::Configuration { name, source: ConfigurationError::UnevenSize { .. } }) => {
            assert_eq!(name, "odd")
        }
        other => panic!("expected an uneven size error, got {:?}", other.err()),
    }
    Ok(())
}

#[derive(Default)]
struct Recorder {
    configured: Vec<(String, u64, String)>,
    evictions: usize,
    accesses: usize,
}

impl CacheObserver for Recorder {
    fn configured(&mut self, name: &str, geometry: &Geometry, policy: &str) {
        self.configured.push((name.to_string(), geometry.num_sets, policy.to_string()));
    }

    fn accessed(&mut self, _name: &str, cache: &Cache, _address: u64, _kind: AccessKind, result: &AccessResult) {
        self.accesses += 1;
        if result.evicted {
            self.evictions += 1;
            assert_eq!(cache.stats().evictions as usize, self.evictions);
        }
    }
}

#[test]
fn observer_sees_everything() -> Result<(), Box<dyn Error>> {
    let config = SimulationConfig {
        caches: vec![CacheConfig {
            name: "direct".to_string(),
            size: 256,
            block_size: 64,
            associativity: 1,
            address_bits: 16,
            policy: PolicyKind::FirstInFirstOut,
            seed: None,
            timing: Some(TimingConfig::default()),
        }],
    };
    let mut simulator = Simulator::with_observer(&config, Recorder::default())?;
    simulator.replay(sequential_trace(1024, 64));
    let observer = simulator.observer();
    assert_eq!(observer.configured, vec![("direct".to_string(), 4, "Direct".to_string())]);
    assert_eq!(observer.accesses, 16);
    assert_eq!(observer.evictions, 12);
    let (name, cache) = simulator.caches().next().ok_or("no caches")?;
    assert_eq!(name, "direct");
    assert_eq!(cache.cycle(), 16 * 100);
    Ok(())
}

#[test]
fn result_formats() -> Result<(), Box<dyn Error>> {
    let mut simulator = Simulator::new(&two_level()?)?;
    let empty = simulator.result().to_string();
    assert!(empty.starts_with("Processed 0 requests (0 malformed lines skipped)"));
    assert!(empty.contains("No accesses recorded."));
    let text = simulator.replay(sequential_trace(512, 64)).to_string();
    assert!(text.contains("=== small (LRU) ==="));
    assert!(text.contains("=== large (Random) ==="));
    assert!(text.contains("Hit rate:        0.00%"));
    assert!(text.contains("Total latency:   160 cycles"));
    let json = serde_json::to_value(simulator.result())?;
    assert_eq!(json["caches"][1]["cycles"], 160);
    assert_eq!(json["caches"][0]["cycles"], serde_json::Value::Null);
    Ok(())
}

#[test]
fn compares_policies_on_way_traces() -> Result<(), ConfigurationError> {
    let comparison = PolicyComparison::run(&[0, 1, 2, 3, 0], 4, 1)?;
    assert_eq!(comparison.runs.len(), 4);
    let victims = |kind: PolicyKind| {
        comparison
            .runs
            .iter()
            .find(|run| run.policy == kind)
            .map(|run| run.victims.clone())
            .unwrap_or_default()
    };
    assert_eq!(victims(PolicyKind::LeastRecentlyUsed), vec![1, 2, 3, 0, 1]);
    assert_eq!(victims(PolicyKind::FirstInFirstOut), vec![1, 2, 3, 0, 0]);
    assert_eq!(victims(PolicyKind::PseudoLeastRecentlyUsed), vec![2, 2, 0, 0, 2]);
    let random = victims(PolicyKind::Random);
    assert_eq!(random.len(), 5);
    assert!(random.iter().all(|&way| way < 4));
    assert!(comparison.runs.iter().all(|run| run.accesses == 5));
    let table = comparison.to_string();
    assert!(table.contains("Victims after each access (4-way)"));
    assert!(table.contains("LRU: 1 2 3 0 1"));
    Ok(())
}

#[test]
fn comparison_rejects_ways_plru_cannot_track() {
    assert_eq!(
        PolicyComparison::run(&[0, 1, 2], 3, 0).err(),
        Some(ConfigurationError::UnsupportedPseudoLruWays(3))
    );
}

#[test]
fn malformed_encoding_does_not_stop_a_run() -> Result<(), Box<dyn Error>> {
    let mut simulator = Simulator::new(&two_level()?)?;
    let result = simulator.simulate(&b"R 0x0\nR 0x\xff\xfe\nR 0x40\n"[..])?;
    assert_eq!(result.accesses, 2);
    assert_eq!(result.skipped_lines, 1);
    Ok(())
}

#[test]
fn locality_trace_stays_in_the_first_256_blocks() {
    let records = locality_trace(20_000, 16, 64, 9);
    assert!(records.iter().all(|r| r.address % 64 == 0 && r.address < 256 * 64));
    assert!(records.iter().any(|r| r.address >= 16 * 64));
}

#[derive(Clone, Default)]
struct SharedLog(Arc<Mutex<Vec<u8>>>);

impl Write for SharedLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().map_err(|_| io::Error::new(io::ErrorKind::Other, "log poisoned"))?.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn tracing_observer_logs_evictions_in_hex() -> Result<(), Box<dyn Error>> {
    let log = SharedLog::default();
    let writer = log.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let config: SimulationConfig = serde_json::from_str(
        r#"{"caches": [{ "name": "direct", "size": 128, "block_size": 64, "associativity": 1 }]}"#,
    )?;
    tracing::subscriber::with_default(subscriber, || -> Result<(), SimulationError> {
        let mut simulator = Simulator::with_observer(&config, TracingObserver)?;
        simulator.replay(sequential_trace(256, 64));
        Ok(())
    })?;
    let output = String::from_utf8(log.0.lock().map_err(|_| "log poisoned")?.clone())?;
    assert!(output.contains("cache configured"));
    assert_eq!(output.matches("evicted line").count(), 2);
    assert!(output.contains("victim=0x0"));
    assert!(output.contains("victim=0x40"));
    Ok(())
}
