use std::fmt;
use serde::{Deserialize, Serialize};
use crate::cache::AccessKind;

/// Event counters for a single cache. Every counter only ever grows until the cache is reset
///
/// `total_latency` is only meaningful for caches running with a timing configuration, it stays
/// at zero otherwise.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub hits: u64,
    pub misses: u64,
    pub reads: u64,
    pub writes: u64,
    pub evictions: u64,
    pub dirty_evictions: u64,
    pub total_latency: u64,
}

impl Stats {
    /// Records one access, and the latency it was charged if the cache is timed
    pub fn record_access(&mut self, kind: AccessKind, hit: bool, latency: Option<u64>) {
        match kind {
            AccessKind::Read => self.reads += 1,
            AccessKind::Write => self.writes += 1,
        }
        if hit {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        if let Some(latency) = latency {
            self.total_latency += latency;
        }
    }

    /// Records a valid line being replaced. Dirty ones would need writing back first
    pub fn record_eviction(&mut self, dirty: bool) {
        self.evictions += 1;
        if dirty {
            self.dirty_evictions += 1;
        }
    }

    pub fn total_accesses(&self) -> u64 {
        self.hits + self.misses
    }

    /// Hits over total accesses, or 0 if nothing has been accessed yet
    ///
    /// # Examples
    ///
    /// ```
    /// use cachelib::stats::Stats;
    /// assert_eq!(Stats::default().hit_rate(), 0.0);
    /// let stats = Stats { hits: 3, misses: 1, ..Stats::default() };
    /// assert_eq!(stats.hit_rate(), 0.75);
    /// ```
    pub fn hit_rate(&self) -> f64 {
        match self.total_accesses() {
            0 => 0.0,
            total => self.hits as f64 / total as f64,
        }
    }

    pub fn average_latency(&self) -> Option<f64> {
        match self.total_accesses() {
            0 => None,
            total => Some(self.total_latency as f64 / total as f64),
        }
    }
}

/// Borrowed view used to print a summary, with or without the latency lines
pub struct Summary<'a> {
    stats: &'a Stats,
    timed: bool,
}

impl<'a> Summary<'a> {
    pub fn new(stats: &'a Stats, timed: bool) -> Self {
        Self { stats, timed }
    }
}

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats;
        writeln!(f, "Total accesses:  {}", stats.total_accesses())?;
        writeln!(f, "Hits:            {}", stats.hits)?;
        writeln!(f, "Misses:          {}", stats.misses)?;
        writeln!(f, "Reads:           {}", stats.reads)?;
        writeln!(f, "Writes:          {}", stats.writes)?;
        writeln!(f, "Evictions:       {}", stats.evictions)?;
        writeln!(f, "Dirty evictions: {}", stats.dirty_evictions)?;
        if stats.total_accesses() == 0 {
            return write!(f, "No accesses recorded.");
        }
        write!(f, "Hit rate:        {:.2}%", stats.hit_rate() * 100.0)?;
        if self.timed {
            writeln!(f)?;
            writeln!(f, "Total latency:   {} cycles", stats.total_latency)?;
            write!(f, "Avg latency:     {:.2} cycles", stats.average_latency().unwrap_or(0.0))?;
        }
        Ok(())
    }
}
