use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use crate::config::PolicyKind;
use crate::error::ConfigurationError;

/// The interface shared by the per-set replacement policies
///
/// Each instance tracks the ways of exactly one set. Way indices passed in are always in range,
/// the owning set guarantees it.
pub trait ReplacementPolicy {
    /// Records that `way` was just used, either by a hit or by a fill
    fn access(&mut self, way: usize);

    /// Picks the way to evict. Only consulted once every way in the set is valid
    fn victim(&mut self) -> usize;

    /// Tells the policy that the line in `way` has been evicted, so its next fill is a fresh load
    ///
    /// Not applicable for most policies, a default which does nothing is provided
    fn invalidate(&mut self, _way: usize) {}

    /// Returns the policy to its just-constructed state
    fn reset(&mut self);
}

/// NoPolicy is used for direct mapped caches. There is only one way, so it is always the victim
#[derive(Debug, Default, Clone)]
pub struct NoPolicy;

impl ReplacementPolicy for NoPolicy {
    fn access(&mut self, _: usize) {}

    fn victim(&mut self) -> usize {
        0
    }

    fn reset(&mut self) {}
}

/// Least Recently Used replacement policy
///
/// Keeps a logical clock and stamps each way with it on use. The initial stamps are staggered
/// `[0, 1, .., ways - 1]` with the clock starting at `ways`, so before any access way 0 is the
/// victim, and ties can't happen afterwards.
#[derive(Debug, Clone)]
pub struct LeastRecentlyUsed {
    last_used_times: Vec<u64>,
    time: u64,
}

impl LeastRecentlyUsed {
    pub fn new(ways: usize) -> Self {
        let mut policy = Self {
            last_used_times: vec![0; ways],
            time: 0,
        };
        policy.reset();
        policy
    }

    /// Ways ordered from least to most recently used
    pub fn order(&self) -> Vec<usize> {
        order_by_stamp(&self.last_used_times)
    }
}

impl ReplacementPolicy for LeastRecentlyUsed {
    fn access(&mut self, way: usize) {
        self.last_used_times[way] = self.time;
        self.time += 1;
    }

    fn victim(&mut self) -> usize {
        // Strict comparison keeps the lowest index on a tie
        let mut min_value = u64::MAX;
        let mut min_index = 0;
        for (index, time) in self.last_used_times.iter().enumerate() {
            if *time < min_value {
                min_value = *time;
                min_index = index;
            }
        }
        min_index
    }

    fn reset(&mut self) {
        for (way, time) in self.last_used_times.iter_mut().enumerate() {
            *time = way as u64;
        }
        self.time = self.last_used_times.len() as u64;
    }
}

/// First in, first out replacement policy
///
/// A way is stamped with an insertion time on its first load only; hits on a loaded way leave
/// the stamp alone. A stamp of zero means the way hasn't been loaded since the last reset or
/// invalidation.
#[derive(Debug, Clone)]
pub struct FirstInFirstOut {
    insertion_times: Vec<u64>,
    next_insertion: u64,
}

impl FirstInFirstOut {
    pub fn new(ways: usize) -> Self {
        Self {
            insertion_times: vec![0; ways],
            next_insertion: 1,
        }
    }

    /// Ways ordered from oldest to newest load
    pub fn order(&self) -> Vec<usize> {
        order_by_stamp(&self.insertion_times)
    }
}

impl ReplacementPolicy for FirstInFirstOut {
    fn access(&mut self, way: usize) {
        let stamp = &mut self.insertion_times[way];
        if *stamp == 0 {
            *stamp = self.next_insertion;
            self.next_insertion += 1;
        }
    }

    fn victim(&mut self) -> usize {
        let mut victim = 0;
        for (index, time) in self.insertion_times.iter().enumerate().skip(1) {
            if *time < self.insertion_times[victim] {
                victim = index;
            }
        }
        victim
    }

    fn invalidate(&mut self, way: usize) {
        self.insertion_times[way] = 0;
    }

    fn reset(&mut self) {
        self.insertion_times.fill(0);
        self.next_insertion = 1;
    }
}

/// Random replacement policy
///
/// Victims are drawn uniformly from a private ChaCha8 stream. The generator is seeded once at
/// construction, with the set index selecting the stream so sets sharing a seed don't evict in
/// lockstep. Resetting rewinds the stream to where it started.
#[derive(Debug, Clone)]
pub struct RandomReplacement {
    ways: usize,
    seed: u64,
    stream: u64,
    rng: ChaCha8Rng,
}

impl RandomReplacement {
    pub fn new(ways: usize, seed: u64, stream: u64) -> Self {
        Self {
            ways,
            seed,
            stream,
            rng: Self::generator(seed, stream),
        }
    }

    fn generator(seed: u64, stream: u64) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(stream);
        rng
    }
}

impl ReplacementPolicy for RandomReplacement {
    fn access(&mut self, _: usize) {}

    fn victim(&mut self) -> usize {
        self.rng.gen_range(0..self.ways)
    }

    fn reset(&mut self) {
        self.rng = Self::generator(self.seed, self.stream);
    }
}

/// Tree based pseudo least recently used replacement policy
///
/// The `ways - 1` internal nodes of a binary tree over the ways are stored as bits, node `n`
/// having children `2n + 1` and `2n + 2`. A set bit points to the right subtree. For 4 ways:
///
/// ```text
///        b0
///      /    \
///    b1      b2
///   /  \    /  \
///  W0  W1  W2  W3
/// ```
#[derive(Debug, Clone)]
pub struct PseudoLeastRecentlyUsed {
    bits: u64,
    depth: u32,
}

impl PseudoLeastRecentlyUsed {
    pub fn new(ways: usize) -> Result<Self, ConfigurationError> {
        if ways < 2 || ways > u64::BITS as usize || !ways.is_power_of_two() {
            return Err(ConfigurationError::UnsupportedPseudoLruWays(ways));
        }
        Ok(Self {
            bits: 0,
            depth: ways.trailing_zeros(),
        })
    }
}

impl ReplacementPolicy for PseudoLeastRecentlyUsed {
    /// Walks from the root to `way`, pointing every node on the path at the other subtree
    fn access(&mut self, way: usize) {
        let mut node = 0;
        let mut position = way;
        for level in 0..self.depth {
            let half = 1 << (self.depth - level - 1);
            if position >= half {
                self.bits &= !(1 << node);
                position -= half;
                node = 2 * node + 2;
            } else {
                self.bits |= 1 << node;
                node = 2 * node + 1;
            }
        }
    }

    /// Follows the bits from the root down to a leaf
    fn victim(&mut self) -> usize {
        let mut node = 0;
        let mut victim = 0;
        for level in 0..self.depth {
            if self.bits & (1 << node) != 0 {
                victim += 1 << (self.depth - level - 1);
                node = 2 * node + 2;
            } else {
                node = 2 * node + 1;
            }
        }
        victim
    }

    fn reset(&mut self) {
        self.bits = 0;
    }
}

fn order_by_stamp(stamps: &[u64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..stamps.len()).collect();
    order.sort_by_key(|&way| (stamps[way], way));
    order
}

/// Enum for every per-set policy provided by the library
///
/// The set of policies is closed, so explicitly branching on each of them lets the compiler see
/// the concrete types and inline the hot paths, which trait objects would hide.
#[derive(Debug, Clone)]
pub enum EvictionPolicy {
    Direct(NoPolicy),
    LeastRecentlyUsed(LeastRecentlyUsed),
    FirstInFirstOut(FirstInFirstOut),
    Random(RandomReplacement),
    PseudoLeastRecentlyUsed(PseudoLeastRecentlyUsed),
}

impl EvictionPolicy {
    /// Builds the policy state for one set
    ///
    /// # Arguments
    ///
    /// * `kind`: Which policy to build
    /// * `ways`: The associativity of the set
    /// * `seed`: Seed for the random policy, ignored by the others
    /// * `set_index`: The set this policy belongs to, used to pick a random stream
    ///
    /// returns: Result<EvictionPolicy, ConfigurationError>
    pub fn new(kind: PolicyKind, ways: usize, seed: u64, set_index: usize) -> Result<Self, ConfigurationError> {
        Ok(match kind {
            PolicyKind::LeastRecentlyUsed => LeastRecentlyUsed::new(ways).into(),
            PolicyKind::FirstInFirstOut => FirstInFirstOut::new(ways).into(),
            PolicyKind::Random => RandomReplacement::new(ways, seed, set_index as u64).into(),
            PolicyKind::PseudoLeastRecentlyUsed => PseudoLeastRecentlyUsed::new(ways)?.into(),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            EvictionPolicy::Direct(_) => "Direct",
            EvictionPolicy::LeastRecentlyUsed(_) => "LRU",
            EvictionPolicy::FirstInFirstOut(_) => "FIFO",
            EvictionPolicy::Random(_) => "Random",
            EvictionPolicy::PseudoLeastRecentlyUsed(_) => "Pseudo-LRU",
        }
    }

    /// The order in which ways would be evicted, victim first. Only exact for LRU and FIFO,
    /// the other policies have no total order to report
    pub fn eviction_order(&self) -> Option<Vec<usize>> {
        match self {
            EvictionPolicy::LeastRecentlyUsed(p) => Some(p.order()),
            EvictionPolicy::FirstInFirstOut(p) => Some(p.order()),
            _ => None,
        }
    }
}

impl From<NoPolicy> for EvictionPolicy {
    fn from(value: NoPolicy) -> Self {
        Self::Direct(value)
    }
}

impl From<LeastRecentlyUsed> for EvictionPolicy {
    fn from(value: LeastRecentlyUsed) -> Self {
        Self::LeastRecentlyUsed(value)
    }
}

impl From<FirstInFirstOut> for EvictionPolicy {
    fn from(value: FirstInFirstOut) -> Self {
        Self::FirstInFirstOut(value)
    }
}

impl From<RandomReplacement> for EvictionPolicy {
    fn from(value: RandomReplacement) -> Self {
        Self::Random(value)
    }
}

impl From<PseudoLeastRecentlyUsed> for EvictionPolicy {
    fn from(value: PseudoLeastRecentlyUsed) -> Self {
        Self::PseudoLeastRecentlyUsed(value)
    }
}

impl ReplacementPolicy for EvictionPolicy {
    #[inline]
    fn access(&mut self, way: usize) {
        match self {
            EvictionPolicy::Direct(p) => p.access(way),
            EvictionPolicy::LeastRecentlyUsed(p) => p.access(way),
            EvictionPolicy::FirstInFirstOut(p) => p.access(way),
            EvictionPolicy::Random(p) => p.access(way),
            EvictionPolicy::PseudoLeastRecentlyUsed(p) => p.access(way),
        }
    }

    #[inline]
    fn victim(&mut self) -> usize {
        match self {
            EvictionPolicy::Direct(p) => p.victim(),
            EvictionPolicy::LeastRecentlyUsed(p) => p.victim(),
            EvictionPolicy::FirstInFirstOut(p) => p.victim(),
            EvictionPolicy::Random(p) => p.victim(),
            EvictionPolicy::PseudoLeastRecentlyUsed(p) => p.victim(),
        }
    }

    fn invalidate(&mut self, way: usize) {
        match self {
            EvictionPolicy::Direct(p) => p.invalidate(way),
            EvictionPolicy::LeastRecentlyUsed(p) => p.invalidate(way),
            EvictionPolicy::FirstInFirstOut(p) => p.invalidate(way),
            EvictionPolicy::Random(p) => p.invalidate(way),
            EvictionPolicy::PseudoLeastRecentlyUsed(p) => p.invalidate(way),
        }
    }

    fn reset(&mut self) {
        match self {
            EvictionPolicy::Direct(p) => p.reset(),
            EvictionPolicy::LeastRecentlyUsed(p) => p.reset(),
            EvictionPolicy::FirstInFirstOut(p) => p.reset(),
            EvictionPolicy::Random(p) => p.reset(),
            EvictionPolicy::PseudoLeastRecentlyUsed(p) => p.reset(),
        }
    }
}
