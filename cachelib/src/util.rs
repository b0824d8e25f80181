use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use crate::trace::TraceRecord;

/// Reads of consecutive bytes `[0, bytes)` with a fixed `stride`
pub fn sequential_trace(bytes: u64, stride: u64) -> Vec<TraceRecord> {
    (0..bytes).step_by(stride as usize).map(TraceRecord::read).collect()
}

/// `count` reads and writes spread uniformly over `[0, max_address)`, roughly one in
/// `write_every` being a write
pub fn random_trace(count: usize, max_address: u64, write_every: u32, seed: u64) -> Vec<TraceRecord> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let address = rng.gen_range(0..max_address);
            if rng.gen_ratio(1, write_every) {
                TraceRecord::write(address)
            } else {
                TraceRecord::read(address)
            }
        })
        .collect()
}

/// `count` block aligned reads which stay inside a working set of `working_set` blocks 80% of the
/// time, jumping anywhere in the first 256 blocks otherwise
pub fn locality_trace(count: usize, working_set: u64, block_size: u64, seed: u64) -> Vec<TraceRecord> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let block = if rng.gen_bool(0.8) {
                rng.gen_range(0..working_set)
            } else {
                rng.gen_range(0..256)
            };
            TraceRecord::read(block * block_size)
        })
        .collect()
}

/// Renders records in the textual trace format read by the simulator
pub fn render_trace(records: &[TraceRecord]) -> String {
    records
        .iter()
        .map(|record| {
            let kind = match record.kind {
                crate::cache::AccessKind::Read => 'R',
                crate::cache::AccessKind::Write => 'W',
            };
            format!("{kind} {:#x}\n", record.address)
        })
        .collect()
}
