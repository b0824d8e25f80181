use std::fmt;
use serde::{Deserialize, Serialize};
use crate::error::ConfigurationError;

/// A simulation configuration: every cache listed replays the same trace independently
#[derive(Debug, Deserialize)]
pub struct SimulationConfig {
    pub caches: Vec<CacheConfig>,
}

/// A configuration for a single cache
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub name: String,
    /// Total capacity in bytes
    pub size: u64,
    /// Line size in bytes
    pub block_size: u64,
    /// Ways per set. 1 is direct mapped
    pub associativity: u64,
    #[serde(default = "default_address_bits")]
    pub address_bits: u32,
    #[serde(default = "PolicyKind::default")]
    pub policy: PolicyKind,
    /// Seed for the random policy. Drawn from entropy when absent
    #[serde(default)]
    pub seed: Option<u64>,
    /// Latency accounting. Caches without a timing block only count events
    #[serde(default)]
    pub timing: Option<TimingConfig>,
}

fn default_address_bits() -> u32 {
    32
}

impl CacheConfig {
    /// Validates the geometric parameters of this configuration
    pub fn geometry(&self) -> Result<Geometry, ConfigurationError> {
        Geometry::new(self.size, self.block_size, self.associativity, self.address_bits)
    }
}

/// The eviction policy - lru, fifo, random, or plru. Defaults to LRU.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum PolicyKind {
    #[default]
    #[serde(alias = "lru")]
    LeastRecentlyUsed,
    #[serde(alias = "fifo")]
    FirstInFirstOut,
    #[serde(alias = "random")]
    Random,
    #[serde(alias = "plru", alias = "pseudo_lru")]
    PseudoLeastRecentlyUsed,
}

impl PolicyKind {
    pub const ALL: [PolicyKind; 4] = [
        PolicyKind::LeastRecentlyUsed,
        PolicyKind::FirstInFirstOut,
        PolicyKind::Random,
        PolicyKind::PseudoLeastRecentlyUsed,
    ];
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PolicyKind::LeastRecentlyUsed => "LRU",
            PolicyKind::FirstInFirstOut => "FIFO",
            PolicyKind::Random => "Random",
            PolicyKind::PseudoLeastRecentlyUsed => "Pseudo-LRU",
        })
    }
}

/// Latencies charged per access when a cache runs in timed mode
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TimingConfig {
    #[serde(default = "default_hit_latency")]
    pub hit_latency: u64,
    #[serde(default = "default_miss_latency")]
    pub miss_latency: u64,
    /// Extra cost of writing back a dirty victim. Defaults to the miss latency
    #[serde(default)]
    pub writeback_latency: Option<u64>,
}

fn default_hit_latency() -> u64 {
    1
}

fn default_miss_latency() -> u64 {
    100
}

impl TimingConfig {
    pub fn writeback(&self) -> u64 {
        self.writeback_latency.unwrap_or(self.miss_latency)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            hit_latency: default_hit_latency(),
            miss_latency: default_miss_latency(),
            writeback_latency: None,
        }
    }
}

/// Validated cache geometry, along with the widths of the address fields it implies
///
/// Every count here is a power of two, and `offset_bits + index_bits + tag_bits == address_bits`
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct Geometry {
    pub size: u64,
    pub block_size: u64,
    pub associativity: u64,
    pub address_bits: u32,
    pub num_lines: u64,
    pub num_sets: u64,
    pub offset_bits: u32,
    pub index_bits: u32,
    pub tag_bits: u32,
}

impl Geometry {
    /// Checks the parameters and derives the line/set counts and field widths
    ///
    /// # Examples
    ///
    /// ```
    /// use cachelib::config::Geometry;
    /// let geometry = Geometry::new(8192, 64, 4, 32).unwrap();
    /// assert_eq!(geometry.num_sets, 32);
    /// assert_eq!((geometry.offset_bits, geometry.index_bits, geometry.tag_bits), (6, 5, 21));
    /// ```
    pub fn new(size: u64, block_size: u64, associativity: u64, address_bits: u32) -> Result<Self, ConfigurationError> {
        for (name, value) in [("size", size), ("block size", block_size), ("associativity", associativity)] {
            if value == 0 {
                return Err(ConfigurationError::ZeroParameter { name });
            }
        }
        if address_bits == 0 || address_bits > u64::BITS {
            return Err(ConfigurationError::AddressWidth(address_bits));
        }
        if !block_size.is_power_of_two() {
            return Err(ConfigurationError::NotPowerOfTwo { name: "block size", value: block_size });
        }
        if !associativity.is_power_of_two() {
            return Err(ConfigurationError::NotPowerOfTwo { name: "associativity", value: associativity });
        }
        let uneven = ConfigurationError::UnevenSize { size, block_size, associativity };
        let set_bytes = block_size.checked_mul(associativity).ok_or_else(|| uneven.clone())?;
        if size % set_bytes != 0 {
            return Err(uneven);
        }
        let num_lines = size / block_size;
        let num_sets = num_lines / associativity;
        if !num_sets.is_power_of_two() {
            return Err(ConfigurationError::NotPowerOfTwo { name: "number of sets", value: num_sets });
        }
        let offset_bits = block_size.trailing_zeros();
        let index_bits = num_sets.trailing_zeros();
        if offset_bits + index_bits > address_bits {
            return Err(ConfigurationError::AddressTooNarrow { address_bits, offset_bits, index_bits });
        }
        Ok(Self {
            size,
            block_size,
            associativity,
            address_bits,
            num_lines,
            num_sets,
            offset_bits,
            index_bits,
            tag_bits: address_bits - offset_bits - index_bits,
        })
    }

    pub fn is_direct_mapped(&self) -> bool {
        self.associativity == 1
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Size: {} bytes", self.size)?;
        writeln!(f, "Block size: {} bytes", self.block_size)?;
        writeln!(f, "Associativity: {}-way", self.associativity)?;
        writeln!(f, "Number of lines: {}", self.num_lines)?;
        writeln!(f, "Number of sets: {}", self.num_sets)?;
        writeln!(f, "Address bits: {}", self.address_bits)?;
        writeln!(f, "  Offset bits: {}", self.offset_bits)?;
        writeln!(f, "  Index bits: {}", self.index_bits)?;
        write!(f, "  Tag bits: {}", self.tag_bits)
    }
}
