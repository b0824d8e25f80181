use tracing::{debug, info, trace};
use crate::cache::{AccessKind, AccessResult, Cache};
use crate::config::Geometry;

/// Receives notifications from the simulator as caches are built and accessed
///
/// Caches never print anything themselves; anything that wants to report on them is injected
/// here instead. Both methods default to doing nothing.
pub trait CacheObserver {
    /// A cache named `name` has been constructed with `geometry`
    fn configured(&mut self, _name: &str, _geometry: &Geometry, _policy: &str) {}

    /// `cache` has just performed an access to `address`
    fn accessed(&mut self, _name: &str, _cache: &Cache, _address: u64, _kind: AccessKind, _result: &AccessResult) {}
}

/// Observer which ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl CacheObserver for NullObserver {}

/// Observer which reports through `tracing`: configurations at info level, evictions at debug
/// level and every access at trace level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl CacheObserver for TracingObserver {
    fn configured(&mut self, name: &str, geometry: &Geometry, policy: &str) {
        info!(
            cache = name,
            size = geometry.size,
            block_size = geometry.block_size,
            associativity = geometry.associativity,
            sets = geometry.num_sets,
            offset_bits = geometry.offset_bits,
            index_bits = geometry.index_bits,
            tag_bits = geometry.tag_bits,
            policy,
            "cache configured"
        );
        debug!(cache = name, "\n{geometry}");
    }

    fn accessed(&mut self, name: &str, cache: &Cache, address: u64, kind: AccessKind, result: &AccessResult) {
        trace!(cache = name, address, ?kind, hit = result.hit, set = result.set_index, way = result.way, "access");
        if result.evicted {
            let victim = cache.decoder().reconstruct(result.evicted_tag, result.set_index);
            debug!(
                cache = name,
                set = result.set_index,
                way = result.way,
                victim = %format_args!("{victim:#x}"),
                dirty = result.evicted_dirty,
                "evicted line"
            );
        }
    }
}
