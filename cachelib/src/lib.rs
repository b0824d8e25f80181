//! # CacheLib
//!
//! Cachelib is a library for set associative cache simulation
//!
//! It decodes addresses against a validated geometry, keeps tag/valid/dirty metadata per way, and
//! picks victims with one of a closed set of replacement policies (LRU, FIFO, random and tree
//! pseudo-LRU). Every access produces an [`cache::AccessResult`] and updates per-cache counters,
//! optionally charging latencies. A simulator replays textual traces over several independent
//! caches at once.
//!
//! ```
//! use cachelib::cache::{AccessKind, Cache};
//! use cachelib::config::{Geometry, PolicyKind};
//! let geometry = Geometry::new(256, 64, 4, 32).unwrap();
//! let mut cache = Cache::with_policy(geometry, PolicyKind::LeastRecentlyUsed, 0, None).unwrap();
//! assert!(!cache.access(0x40, AccessKind::Read).hit);
//! assert!(cache.access(0x44, AccessKind::Read).hit);
//! ```

/// Address decoding into tag, set index and block offset
pub mod address;

/// Contains the implementation of the cache, its sets and lines
pub mod cache;

/// Contains definitions for the JSON configuration format, and geometry validation
pub mod config;

pub mod error;

/// Helpers for reading trace files
pub mod io;

/// Hooks for reporting on caches without them printing anything themselves
pub mod observer;

/// Contains the provided replacement policies, with a trait implemented by all of them
pub mod replacement_policies;

/// Contains the simulator used to replay traces over a set of caches, and the policy comparison
pub mod simulator;

pub mod stats;

/// Parsing of access traces and way index traces
pub mod trace;

#[cfg(test)]
mod test;

/// Synthetic traces for tests and benchmarks
pub mod util;
