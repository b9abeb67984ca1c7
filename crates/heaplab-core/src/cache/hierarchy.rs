//! Multi-level cache controller.
//!
//! Owns the ordered levels plus the main-memory penalty and drives the
//! inclusive access protocol: a hit in level *k* refreshes levels 0..=*k*
//! with the current logical timestamp, so every upper level keeps a
//! superset of the lines above it.

use std::io::{self, Write};

use serde::Serialize;

use super::level::CacheLevel;

/// Default main-memory latency in cycles.
pub const DEFAULT_MEMORY_LATENCY: u64 = 100;

/// Per-level statistics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheLevelReport {
    /// Zero-based level index (0 = L1).
    pub index: usize,
    /// Configured size in bytes.
    pub size_bytes: usize,
    /// Line size in bytes.
    pub block_size: usize,
    /// Ways per set.
    pub associativity: usize,
    /// Number of sets.
    pub num_sets: usize,
    /// Access latency in cycles.
    pub latency: u64,
    /// Lookups that reached this level.
    pub accesses: u64,
    /// Lookups satisfied here.
    pub hits: u64,
    /// Lookups that fell through.
    pub misses: u64,
    /// `hits / accesses`, percent.
    pub hit_ratio_pct: f64,
    /// `miss_penalty_accum / misses`, cycles; 0 when no misses.
    pub avg_miss_penalty: f64,
}

/// Hierarchy-wide statistics snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheReport {
    /// Number of configured levels.
    pub levels: usize,
    /// Main-memory latency in cycles.
    pub memory_latency: u64,
    /// Total accesses against the hierarchy.
    pub accesses: u64,
    /// Accesses satisfied by some cache level.
    pub hits: u64,
    /// Accesses that went to main memory.
    pub misses: u64,
    /// `hits / accesses`, percent.
    pub hit_ratio_pct: f64,
    /// `total penalty cycles / accesses`.
    pub avg_penalty: f64,
    /// Per-level details in hierarchy order.
    pub per_level: Vec<CacheLevelReport>,
}

/// Ordered cache levels plus main memory, sharing one logical clock.
#[derive(Debug, Clone)]
pub struct CacheHierarchy {
    levels: Vec<CacheLevel>,
    memory_latency: u64,
    clock: u64,
    total_accesses: u64,
    total_hits: u64,
    total_misses: u64,
    total_penalty: u64,
}

impl CacheHierarchy {
    /// Creates an empty hierarchy with the default memory latency.
    #[must_use]
    pub fn new() -> Self {
        Self {
            levels: Vec::new(),
            memory_latency: DEFAULT_MEMORY_LATENCY,
            clock: 0,
            total_accesses: 0,
            total_hits: 0,
            total_misses: 0,
            total_penalty: 0,
        }
    }

    /// Resets to the default two-level configuration:
    /// L1 4 KiB, 64-byte lines, 4-way, 1 cycle; L2 32 KiB, 64-byte lines,
    /// 8-way, 8 cycles; main memory 100 cycles.
    pub fn init_default(&mut self) {
        self.reset();
        self.add_level(4 * 1024, 64, 4, 1);
        self.add_level(32 * 1024, 64, 8, 8);
        self.set_memory_latency(DEFAULT_MEMORY_LATENCY);
    }

    /// Drops all levels, zeroes every counter, and restores the default
    /// memory latency.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Sets the main-memory latency (0 is treated as 1).
    pub fn set_memory_latency(&mut self, latency_cycles: u64) {
        self.memory_latency = latency_cycles.max(1);
    }

    /// Appends a level; L1 is index 0, L2 is 1, and so on.
    pub fn add_level(
        &mut self,
        size_bytes: usize,
        block_size: usize,
        associativity: usize,
        latency_cycles: u64,
    ) {
        let index = self.levels.len();
        self.levels.push(CacheLevel::new(
            size_bytes,
            block_size,
            associativity,
            latency_cycles,
            index,
        ));
    }

    /// Replaces the level at `index`, discarding its lines and counters.
    /// No-op when `index` is out of range.
    pub fn configure_level(
        &mut self,
        index: usize,
        size_bytes: usize,
        block_size: usize,
        associativity: usize,
        latency_cycles: u64,
    ) {
        if index >= self.levels.len() {
            return;
        }
        self.levels[index] =
            CacheLevel::new(size_bytes, block_size, associativity, latency_cycles, index);
    }

    /// Number of configured levels.
    #[must_use]
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Configured levels in hierarchy order.
    #[must_use]
    pub fn levels(&self) -> &[CacheLevel] {
        &self.levels
    }

    /// Current logical clock value.
    #[must_use]
    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Simulates one access to `addr`.
    ///
    /// Reads and writes drive the identical protocol; the flag is accepted
    /// for interface parity only. Walks levels in order accumulating
    /// latency, fills every level down to the hit point (or all levels on a
    /// full miss), and attributes the cycles spent below each missing level
    /// to that level's miss penalty.
    pub fn access(&mut self, addr: u64, _is_write: bool) {
        if self.levels.is_empty() {
            return;
        }

        self.clock += 1;
        self.total_accesses += 1;

        let mut penalty = 0u64;
        let mut hit_level: Option<usize> = None;
        let mut miss_records: Vec<(usize, u64)> = Vec::new();

        for i in 0..self.levels.len() {
            penalty += self.levels[i].latency();
            self.levels[i].stats_mut().accesses += 1;

            if self.levels[i].lookup(addr, self.clock) {
                self.levels[i].stats_mut().hits += 1;
                hit_level = Some(i);
                break;
            }
            self.levels[i].stats_mut().misses += 1;
            miss_records.push((i, penalty));
        }

        let fill_upto = match hit_level {
            Some(level) => {
                self.total_hits += 1;
                level
            }
            None => {
                penalty += self.memory_latency;
                self.total_misses += 1;
                self.levels.len() - 1
            }
        };

        for level in &mut self.levels[..=fill_upto] {
            level.insert(addr, self.clock);
        }

        for (index, penalty_upto) in miss_records {
            self.levels[index].stats_mut().miss_penalty_accum += penalty - penalty_upto;
        }

        self.total_penalty += penalty;
    }

    /// Snapshots the hierarchy statistics.
    #[must_use]
    pub fn report(&self) -> CacheReport {
        let pct = |num: f64, den: f64| if den == 0.0 { 0.0 } else { 100.0 * num / den };

        let per_level = self
            .levels
            .iter()
            .map(|level| {
                let stats = level.stats();
                CacheLevelReport {
                    index: level.level_index(),
                    size_bytes: level.size_bytes(),
                    block_size: level.block_size(),
                    associativity: level.associativity(),
                    num_sets: level.num_sets(),
                    latency: level.latency(),
                    accesses: stats.accesses,
                    hits: stats.hits,
                    misses: stats.misses,
                    hit_ratio_pct: pct(stats.hits as f64, stats.accesses as f64),
                    avg_miss_penalty: if stats.misses == 0 {
                        0.0
                    } else {
                        stats.miss_penalty_accum as f64 / stats.misses as f64
                    },
                }
            })
            .collect();

        CacheReport {
            levels: self.levels.len(),
            memory_latency: self.memory_latency,
            accesses: self.total_accesses,
            hits: self.total_hits,
            misses: self.total_misses,
            hit_ratio_pct: pct(self.total_hits as f64, self.total_accesses as f64),
            avg_penalty: if self.total_accesses == 0 {
                0.0
            } else {
                self.total_penalty as f64 / self.total_accesses as f64
            },
            per_level,
        }
    }

    /// Renders the textual statistics block.
    pub fn dump_stats<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let report = self.report();

        writeln!(out, "Multi-level cache statistics:")?;
        writeln!(out, "  Levels: {}", report.levels)?;
        writeln!(out, "  Main memory latency: {} cycles", report.memory_latency)?;
        writeln!(out, "  Total accesses: {}", report.accesses)?;
        writeln!(out, "  Total hits:     {}", report.hits)?;
        writeln!(out, "  Total misses:   {}", report.misses)?;
        writeln!(out, "  Global hit ratio: {:.2}%", report.hit_ratio_pct)?;
        writeln!(
            out,
            "  Avg access penalty: {:.2} cycles/access",
            report.avg_penalty
        )?;

        writeln!(out, "\nPer-level details:")?;
        for level in &report.per_level {
            writeln!(
                out,
                "  L{}: size={} bytes, block={} bytes, assoc={}-way, sets={}, latency={} cycles",
                level.index + 1,
                level.size_bytes,
                level.block_size,
                level.associativity,
                level.num_sets,
                level.latency,
            )?;
            writeln!(
                out,
                "     accesses={}, hits={}, misses={}, hit ratio={:.2}%, \
                 avg miss penalty to lower levels={:.2} cycles",
                level.accesses,
                level.hits,
                level.misses,
                level.hit_ratio_pct,
                level.avg_miss_penalty,
            )?;
        }
        Ok(())
    }
}

impl Default for CacheHierarchy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration() {
        let mut cache = CacheHierarchy::new();
        cache.init_default();
        assert_eq!(cache.level_count(), 2);
        let report = cache.report();
        assert_eq!(report.per_level[0].size_bytes, 4 * 1024);
        assert_eq!(report.per_level[0].associativity, 4);
        assert_eq!(report.per_level[1].size_bytes, 32 * 1024);
        assert_eq!(report.per_level[1].associativity, 8);
        assert_eq!(report.memory_latency, 100);
    }

    #[test]
    fn test_access_without_levels_is_noop() {
        let mut cache = CacheHierarchy::new();
        cache.access(0x1000, false);
        let report = cache.report();
        assert_eq!(report.accesses, 0);
        assert_eq!(cache.clock(), 0);
    }

    #[test]
    fn test_cold_miss_then_hit() {
        let mut cache = CacheHierarchy::new();
        cache.init_default();

        cache.access(0x1000, false);
        let report = cache.report();
        assert_eq!(report.accesses, 1);
        assert_eq!(report.hits, 0);
        assert_eq!(report.misses, 1);
        assert_eq!(report.per_level[0].misses, 1);
        assert_eq!(report.per_level[1].misses, 1);
        // 1 (L1) + 8 (L2) + 100 (memory).
        assert!((report.avg_penalty - 109.0).abs() < 1e-9);

        cache.access(0x1000, false);
        let report = cache.report();
        assert_eq!(report.hits, 1);
        assert_eq!(report.per_level[0].hits, 1);
        // L2 was not consulted on the L1 hit.
        assert_eq!(report.per_level[1].accesses, 1);
    }

    #[test]
    fn test_inclusive_fill_covers_upper_levels() {
        let mut cache = CacheHierarchy::new();
        cache.init_default();
        cache.access(0x40, false);

        // Both levels now hold the line.
        assert!(cache.levels()[0].probe(0x40).is_some());
        assert!(cache.levels()[1].probe(0x40).is_some());
    }

    #[test]
    fn test_l2_hit_refreshes_l1() {
        // Tiny direct-mapped L1 (one line) over a large L2.
        let mut cache = CacheHierarchy::new();
        cache.add_level(64, 64, 1, 1);
        cache.add_level(32 * 1024, 64, 8, 8);

        cache.access(0x0, false); // both filled with block 0
        cache.access(0x1000, false); // evicts block 0 from L1
        assert!(cache.levels()[0].probe(0x0).is_none());

        cache.access(0x0, false); // L1 miss, L2 hit
        let report = cache.report();
        assert_eq!(report.per_level[1].hits, 1);
        assert_eq!(report.hits, 1);
        // Inclusive refresh put block 0 back into L1.
        assert!(cache.levels()[0].probe(0x0).is_some());
    }

    #[test]
    fn test_miss_penalty_attribution() {
        let mut cache = CacheHierarchy::new();
        cache.add_level(4 * 1024, 64, 4, 1);
        cache.add_level(32 * 1024, 64, 8, 8);
        cache.set_memory_latency(100);

        // Full miss: total penalty 109. L1 accrues 109-1=108, L2 109-9=100.
        cache.access(0x40, false);
        let report = cache.report();
        assert!((report.per_level[0].avg_miss_penalty - 108.0).abs() < 1e-9);
        assert!((report.per_level[1].avg_miss_penalty - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_l2_hit_penalty_attribution() {
        let mut cache = CacheHierarchy::new();
        cache.add_level(64, 64, 1, 1);
        cache.add_level(32 * 1024, 64, 8, 8);
        cache.set_memory_latency(100);

        cache.access(0x0, false);
        cache.access(0x1000, false);
        cache.access(0x0, false); // L1 miss, L2 hit: penalty 9, L1 accrues 8

        let stats = cache.levels()[0].stats();
        assert_eq!(stats.misses, 3);
        // 108 (cold) + 108 (cold) + 8 (L2 hit) cycles below L1.
        assert_eq!(stats.miss_penalty_accum, 224);
    }

    #[test]
    fn test_clock_strictly_increases_per_access() {
        let mut cache = CacheHierarchy::new();
        cache.init_default();
        for i in 1..=10u64 {
            cache.access(0x40, false);
            assert_eq!(cache.clock(), i);
        }
    }

    #[test]
    fn test_global_counters_balance() {
        let mut cache = CacheHierarchy::new();
        cache.init_default();
        for addr in (0..4096u64).step_by(64) {
            cache.access(addr, false);
        }
        for addr in (0..4096u64).step_by(64) {
            cache.access(addr, true);
        }
        let report = cache.report();
        assert_eq!(report.hits + report.misses, report.accesses);
        for level in &report.per_level {
            assert_eq!(level.hits + level.misses, level.accesses);
        }
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut cache = CacheHierarchy::new();
        cache.init_default();
        cache.set_memory_latency(7);
        cache.access(0x40, false);
        cache.reset();

        assert_eq!(cache.level_count(), 0);
        assert_eq!(cache.clock(), 0);
        let report = cache.report();
        assert_eq!(report.accesses, 0);
        assert_eq!(report.memory_latency, DEFAULT_MEMORY_LATENCY);
    }

    #[test]
    fn test_configure_level_replaces_in_place() {
        let mut cache = CacheHierarchy::new();
        cache.init_default();
        cache.access(0x40, false);

        cache.configure_level(0, 8 * 1024, 32, 2, 2);
        let report = cache.report();
        // New geometry, counters discarded.
        assert_eq!(report.per_level[0].size_bytes, 8 * 1024);
        assert_eq!(report.per_level[0].block_size, 32);
        assert_eq!(report.per_level[0].accesses, 0);
        // L2 untouched.
        assert_eq!(report.per_level[1].accesses, 1);
        // Out-of-range index is ignored.
        cache.configure_level(9, 1, 1, 1, 1);
        assert_eq!(cache.level_count(), 2);
    }

    #[test]
    fn test_zero_memory_latency_clamped() {
        let mut cache = CacheHierarchy::new();
        cache.set_memory_latency(0);
        cache.add_level(64, 64, 1, 1);
        cache.access(0x0, false);
        // Penalty = 1 (L1) + 1 (clamped memory).
        let report = cache.report();
        assert!((report.avg_penalty - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_repeated_access_single_miss_per_level() {
        let mut cache = CacheHierarchy::new();
        cache.init_default();
        for _ in 0..50 {
            cache.access(0x80, false);
        }
        let report = cache.report();
        assert_eq!(report.per_level[0].misses, 1);
        assert_eq!(report.per_level[1].misses, 1);
        assert_eq!(report.hits, 49);
    }

    #[test]
    fn test_dump_stats_renders_every_level() {
        let mut cache = CacheHierarchy::new();
        cache.init_default();
        cache.access(0x40, false);

        let mut out = Vec::new();
        cache.dump_stats(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Levels: 2"));
        assert!(text.contains("L1: size=4096 bytes"));
        assert!(text.contains("L2: size=32768 bytes"));
        assert!(text.contains("Global hit ratio: 0.00%"));
    }
}
