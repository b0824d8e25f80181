use std::fmt;
use serde::{Deserialize, Serialize};
use crate::address::{AddressDecoder, DecodedAddress};
use crate::config::{CacheConfig, Geometry, PolicyKind, TimingConfig};
use crate::error::ConfigurationError;
use crate::replacement_policies::{EvictionPolicy, NoPolicy, ReplacementPolicy};
use crate::stats::{Stats, Summary};

/// Whether an access reads or writes its block
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessKind {
    Read,
    Write,
}

/// Metadata for one way of one set. Only the tag is tracked, never the data
///
/// Invariant: a dirty line is always valid
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct CacheLine {
    valid: bool,
    dirty: bool,
    tag: u64,
}

impl CacheLine {
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn tag(&self) -> u64 {
        self.tag
    }

    pub fn matches(&self, tag: u64) -> bool {
        self.valid && self.tag == tag
    }

    fn load(&mut self, tag: u64, dirty: bool) {
        self.valid = true;
        self.dirty = dirty;
        self.tag = tag;
    }

    fn mark_dirty(&mut self) {
        debug_assert!(self.valid);
        self.dirty = true;
    }
}

/// One set: `associativity` lines and the replacement policy state that orders them
#[derive(Debug, Clone)]
pub struct CacheSet {
    lines: Vec<CacheLine>,
    policy: EvictionPolicy,
}

impl CacheSet {
    pub fn new(ways: usize, policy: EvictionPolicy) -> Self {
        Self {
            lines: vec![CacheLine::default(); ways],
            policy,
        }
    }

    /// Finds the way holding `tag`, if any. At most one way can match
    pub fn find_line(&self, tag: u64) -> Option<usize> {
        self.lines.iter().position(|line| line.matches(tag))
    }

    /// Picks the way to fill on a miss. Empty ways are always used before anything is evicted
    pub fn find_victim(&mut self) -> usize {
        match self.lines.iter().position(|line| !line.valid) {
            Some(way) => way,
            None => self.policy.victim(),
        }
    }

    /// Called on every hit and every fill, so the policy sees load order as well as reuse
    pub fn update_recency(&mut self, way: usize) {
        self.policy.access(way);
    }

    pub fn lines(&self) -> &[CacheLine] {
        &self.lines
    }

    pub fn policy(&self) -> &EvictionPolicy {
        &self.policy
    }

    pub fn eviction_order(&self) -> Option<Vec<usize>> {
        self.policy.eviction_order()
    }

    pub fn invalid_line_count(&self) -> usize {
        self.lines.iter().filter(|line| !line.valid).count()
    }

    /// Loads `tag` into `way`, handing back the line it replaced if that line was valid
    fn fill(&mut self, way: usize, tag: u64, dirty: bool) -> Option<CacheLine> {
        let line = &mut self.lines[way];
        let evicted = line.valid.then_some(*line);
        if evicted.is_some() {
            self.policy.invalidate(way);
        }
        line.load(tag, dirty);
        evicted
    }

    fn reset(&mut self) {
        self.lines.fill(CacheLine::default());
        self.policy.reset();
    }
}

/// What happened on a single access
///
/// `evicted_dirty` and `evicted_tag` are only meaningful when `evicted` is set. `latency` is
/// only present for caches with a timing configuration.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct AccessResult {
    pub hit: bool,
    pub evicted: bool,
    pub evicted_dirty: bool,
    pub evicted_tag: u64,
    pub set_index: usize,
    pub way: usize,
    pub latency: Option<u64>,
}

/// A set associative cache
///
/// Direct mapped and fully associative caches are the special cases of one way per set and one
/// set respectively. Accesses never fail: the geometry is validated once at construction and
/// masking keeps every decoded set index in bounds.
///
/// A timed cache charges each access a latency from its [`TimingConfig`] and advances a logical
/// cycle counter by it; an untimed one only counts events.
#[derive(Debug, Clone)]
pub struct Cache {
    geometry: Geometry,
    decoder: AddressDecoder,
    sets: Vec<CacheSet>,
    stats: Stats,
    timing: Option<TimingConfig>,
    cycle: u64,
}

impl Cache {
    /// Builds a cache from its configuration
    ///
    /// One way caches always use [`NoPolicy`], whatever policy was asked for, as there is never
    /// a choice of victim.
    ///
    /// # Arguments
    ///
    /// * `config`: A cache configuration, usually resulting from parsing JSON
    ///
    /// returns: Result<Cache, ConfigurationError>
    pub fn new(config: &CacheConfig) -> Result<Self, ConfigurationError> {
        let geometry = config.geometry()?;
        let policy = (!geometry.is_direct_mapped()).then_some(config.policy);
        let seed = config.seed.unwrap_or_else(rand::random);
        Self::build(geometry, policy, seed, config.timing)
    }

    /// Builds a cache with exactly the given policy in every set, including one way caches
    pub fn with_policy(geometry: Geometry, policy: PolicyKind, seed: u64, timing: Option<TimingConfig>) -> Result<Self, ConfigurationError> {
        Self::build(geometry, Some(policy), seed, timing)
    }

    fn build(geometry: Geometry, policy: Option<PolicyKind>, seed: u64, timing: Option<TimingConfig>) -> Result<Self, ConfigurationError> {
        let ways = geometry.associativity as usize;
        let sets = (0..geometry.num_sets as usize)
            .map(|set_index| -> Result<CacheSet, ConfigurationError> {
                let policy = match policy {
                    Some(kind) => EvictionPolicy::new(kind, ways, seed, set_index)?,
                    None => NoPolicy.into(),
                };
                Ok(CacheSet::new(ways, policy))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            geometry,
            decoder: AddressDecoder::new(&geometry),
            sets,
            stats: Stats::default(),
            timing,
            cycle: 0,
        })
    }

    /// Reads or writes the block containing `address`, updating lines, policy state and stats
    ///
    /// Writes allocate on a miss and mark the line dirty; dirty lines are only accounted for
    /// when they are evicted.
    pub fn access(&mut self, address: u64, kind: AccessKind) -> AccessResult {
        let DecodedAddress { tag, set_index, .. } = self.decoder.decode(address);
        let set = &mut self.sets[set_index];
        let mut result = AccessResult {
            set_index,
            ..AccessResult::default()
        };
        match set.find_line(tag) {
            Some(way) => {
                set.update_recency(way);
                if kind == AccessKind::Write {
                    set.lines[way].mark_dirty();
                }
                result.hit = true;
                result.way = way;
                result.latency = self.timing.map(|timing| timing.hit_latency);
            }
            None => {
                let way = set.find_victim();
                // The victim has to be captured before the new block overwrites it
                if let Some(victim) = set.fill(way, tag, kind == AccessKind::Write) {
                    result.evicted = true;
                    result.evicted_dirty = victim.dirty;
                    result.evicted_tag = victim.tag;
                    self.stats.record_eviction(victim.dirty);
                }
                set.update_recency(way);
                result.way = way;
                let dirty = result.evicted_dirty;
                result.latency = self.timing.map(|timing| {
                    let writeback = if dirty { timing.writeback() } else { 0 };
                    timing.miss_latency + writeback
                });
            }
        }
        self.stats.record_access(kind, result.hit, result.latency);
        self.cycle += result.latency.unwrap_or(0);
        result
    }

    /// Puts every line, policy, counter and the cycle count back to the just-constructed state
    pub fn reset(&mut self) {
        for set in &mut self.sets {
            set.reset();
        }
        self.stats = Stats::default();
        self.cycle = 0;
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn decoder(&self) -> &AddressDecoder {
        &self.decoder
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn timing(&self) -> Option<&TimingConfig> {
        self.timing.as_ref()
    }

    /// The logical cycle count. Always zero for untimed caches
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn policy_name(&self) -> &'static str {
        self.sets[0].policy().name()
    }

    pub fn set(&self, index: usize) -> Option<&CacheSet> {
        self.sets.get(index)
    }

    pub fn sets(&self) -> &[CacheSet] {
        &self.sets
    }

    /// Gets the number of lines never filled since construction or the last reset. Useful for
    /// analysing cache performance or debugging
    pub fn invalid_line_count(&self) -> usize {
        self.sets.iter().map(CacheSet::invalid_line_count).sum()
    }

    pub fn summary(&self) -> Summary<'_> {
        Summary::new(&self.stats, self.timing.is_some())
    }

    /// A printable dump of one set, `None` if the index is out of range
    pub fn dump_set(&self, index: usize) -> Option<SetDump<'_>> {
        self.sets.get(index).map(|set| SetDump { cache: self, set, index })
    }

    /// A printable dump of every set holding at least one valid line
    pub fn dump_contents(&self) -> ContentsDump<'_> {
        ContentsDump { cache: self }
    }
}

pub struct SetDump<'a> {
    cache: &'a Cache,
    set: &'a CacheSet,
    index: usize,
}

impl fmt::Display for SetDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Set {}:", self.index)?;
        for (way, line) in self.set.lines().iter().enumerate() {
            let valid = if line.valid { 'V' } else { '-' };
            let dirty = if line.dirty { 'D' } else { '-' };
            write!(f, "  Way {way}: {valid}{dirty} Tag=0x{:08x}", line.tag)?;
            if line.valid {
                write!(f, " (Addr=0x{:x})", self.cache.decoder.reconstruct(line.tag, self.index))?;
            }
            writeln!(f)?;
        }
        match self.set.eviction_order() {
            Some(order) => {
                let order = order.iter().map(usize::to_string).collect::<Vec<_>>().join(", ");
                write!(f, "  {} order: [{order}] (left=next victim)", self.set.policy().name())
            }
            None => write!(f, "  {} keeps no eviction order", self.set.policy().name()),
        }
    }
}

pub struct ContentsDump<'a> {
    cache: &'a Cache,
}

impl fmt::Display for ContentsDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Cache Contents ===")?;
        for (index, set) in self.cache.sets.iter().enumerate() {
            if set.lines().iter().any(CacheLine::is_valid) {
                let dump = SetDump { cache: self.cache, set, index };
                writeln!(f, "{dump}")?;
                writeln!(f)?;
            }
        }
        write!(f, "======================")
    }
}
