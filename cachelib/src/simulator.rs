use std::fmt;
use std::io::BufRead;
use std::time::{Duration, Instant};
use serde::Serialize;
use crate::cache::{Cache, AccessResult};
use crate::config::{PolicyKind, SimulationConfig};
use crate::error::{ConfigurationError, SimulationError};
use crate::observer::{CacheObserver, NullObserver};
use crate::replacement_policies::{EvictionPolicy, ReplacementPolicy};
use crate::stats::{Stats, Summary};
use crate::trace::{AccessTrace, TraceRecord};

/// The simulator replays a trace over every configured cache and collects the results.
///
/// The caches are independent of one another: each sees every access, nothing is forwarded
/// between them. This makes it easy to compare geometries or policies on the same trace.
///
/// It supports calling simulate multiple times, and will update the time taken to simulate and the
/// results accordingly
pub struct Simulator<O: CacheObserver = NullObserver> {
    names: Vec<String>,
    caches: Vec<Cache>,
    observer: O,
    accesses: u64,
    skipped: u64,
    simulation_time: Duration,
}

/// The result of a simulation, printable as text or serialisable to JSON
#[derive(Debug, Serialize, PartialEq)]
pub struct SimulationResult {
    pub accesses: u64,
    pub skipped_lines: u64,
    pub caches: Vec<CacheResult>,
}

/// The result for an individual cache
#[derive(Debug, Serialize, PartialEq)]
pub struct CacheResult {
    pub name: String,
    pub policy: String,
    pub stats: Stats,
    pub hit_rate: f64,
    /// Logical cycles spent, only for timed caches
    pub cycles: Option<u64>,
}

impl Simulator<NullObserver> {
    /// Creates a new simulator for a given configuration, without any observer
    pub fn new(config: &SimulationConfig) -> Result<Self, SimulationError> {
        Self::with_observer(config, NullObserver)
    }
}

impl<O: CacheObserver> Simulator<O> {
    /// Creates a new simulator for a given configuration
    ///
    /// # Arguments
    ///
    /// * `config`: A simulation configuration, usually resulting from parsing JSON
    /// * `observer`: Told about every cache as it is built, and about every access
    ///
    /// returns: Result<Simulator<O>, SimulationError>
    pub fn with_observer(config: &SimulationConfig, mut observer: O) -> Result<Self, SimulationError> {
        if config.caches.is_empty() {
            return Err(SimulationError::NoCaches);
        }
        let mut names = Vec::with_capacity(config.caches.len());
        let mut caches = Vec::with_capacity(config.caches.len());
        for cache_config in &config.caches {
            let cache = Cache::new(cache_config).map_err(|source| SimulationError::Configuration {
                name: cache_config.name.clone(),
                source,
            })?;
            observer.configured(&cache_config.name, cache.geometry(), cache.policy_name());
            names.push(cache_config.name.clone());
            caches.push(cache);
        }
        Ok(Self {
            names,
            caches,
            observer,
            accesses: 0,
            skipped: 0,
            simulation_time: Duration::ZERO,
        })
    }

    /// Performs one access on every cache, returning the per-cache results in configuration order
    pub fn access(&mut self, record: TraceRecord) -> Vec<AccessResult> {
        self.accesses += 1;
        self.names
            .iter()
            .zip(self.caches.iter_mut())
            .map(|(name, cache)| {
                let result = cache.access(record.address, record.kind);
                self.observer.accessed(name, cache, record.address, record.kind, &result);
                result
            })
            .collect()
    }

    /// Replays already parsed records
    pub fn replay<I: IntoIterator<Item = TraceRecord>>(&mut self, records: I) -> SimulationResult {
        let start = Instant::now();
        for record in records {
            self.access(record);
        }
        self.simulation_time += start.elapsed();
        self.result()
    }

    /// Simulates the caches on a textual trace, one `R <address>` or `W <address>` per line
    ///
    /// Malformed lines are skipped with a warning and counted in the result.
    ///
    /// # Arguments
    ///
    /// * `reader`: The trace
    ///
    /// returns: Result<SimulationResult, SimulationError>
    pub fn simulate<R: BufRead>(&mut self, reader: R) -> Result<SimulationResult, SimulationError> {
        let start = Instant::now();
        let mut trace = AccessTrace::new(reader);
        for record in &mut trace {
            self.access(record?);
        }
        self.skipped += trace.skipped() as u64;
        self.simulation_time += start.elapsed();
        Ok(self.result())
    }

    pub fn result(&self) -> SimulationResult {
        SimulationResult {
            accesses: self.accesses,
            skipped_lines: self.skipped,
            caches: self
                .names
                .iter()
                .zip(&self.caches)
                .map(|(name, cache)| CacheResult {
                    name: name.clone(),
                    policy: cache.policy_name().to_string(),
                    stats: *cache.stats(),
                    hit_rate: cache.stats().hit_rate(),
                    cycles: cache.timing().map(|_| cache.cycle()),
                })
                .collect(),
        }
    }

    /// Resets every cache and the access counters. Execution time keeps accumulating
    pub fn reset(&mut self) {
        for cache in &mut self.caches {
            cache.reset();
        }
        self.accesses = 0;
        self.skipped = 0;
    }

    /// Gets the wall-clock execution time for processing
    pub fn get_execution_time(&self) -> &Duration {
        &self.simulation_time
    }

    /// Gets the number of lines never filled, for each cache
    pub fn get_uninitialised_line_counts(&self) -> Vec<u64> {
        self.caches.iter().map(|x| x.invalid_line_count() as u64).collect()
    }

    pub fn caches(&self) -> impl Iterator<Item = (&str, &Cache)> + '_ {
        self.names.iter().map(String::as_str).zip(&self.caches)
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }
}

impl fmt::Display for SimulationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Processed {} requests ({} malformed lines skipped)", self.accesses, self.skipped_lines)?;
        for cache in &self.caches {
            writeln!(f)?;
            writeln!(f, "=== {} ({}) ===", cache.name, cache.policy)?;
            writeln!(f, "{}", Summary::new(&cache.stats, cache.cycles.is_some()))?;
        }
        Ok(())
    }
}

/// Victims chosen by one policy while replaying a way trace
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PolicyRun {
    pub policy: PolicyKind,
    pub accesses: usize,
    pub victims: Vec<usize>,
}

/// Replays a trace of way indices against one instance of every policy, asking for a victim
/// after each access
///
/// There is no cache here, so empty ways are never preferred: this shows the raw ordering each
/// policy keeps.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PolicyComparison {
    pub ways: usize,
    pub runs: Vec<PolicyRun>,
}

impl PolicyComparison {
    pub fn run(trace: &[usize], ways: usize, seed: u64) -> Result<Self, ConfigurationError> {
        let runs = PolicyKind::ALL
            .iter()
            .map(|&kind| -> Result<PolicyRun, ConfigurationError> {
                let mut policy = EvictionPolicy::new(kind, ways, seed, 0)?;
                let victims = trace
                    .iter()
                    .map(|&way| {
                        policy.access(way);
                        policy.victim()
                    })
                    .collect();
                Ok(PolicyRun {
                    policy: kind,
                    accesses: trace.len(),
                    victims,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { ways, runs })
    }
}

impl fmt::Display for PolicyComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<15}{:<15}{:<15}", "Policy", "Accesses", "Victims")?;
        writeln!(f, "{}", "-".repeat(45))?;
        for run in &self.runs {
            writeln!(f, "{:<15}{:<15}{:<15}", run.policy.to_string(), run.accesses, run.victims.len())?;
        }
        writeln!(f)?;
        writeln!(f, "Victims after each access ({}-way)", self.ways)?;
        for run in &self.runs {
            let victims = run.victims.iter().map(usize::to_string).collect::<Vec<_>>().join(" ");
            writeln!(f, "{}: {victims}", run.policy)?;
        }
        Ok(())
    }
}
