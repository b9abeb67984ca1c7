//! Allocator statistics and report rendering.

use std::io::{self, Write};

use serde::Serialize;

use crate::heap::layout::HEADER_SIZE;

/// Allocation attempt counters.
///
/// `requests` counts every sized attempt; `success + failed == requests`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AllocCounters {
    /// Allocation attempts with a non-zero size.
    pub requests: u64,
    /// Attempts that returned a block.
    pub success: u64,
    /// Attempts that found no fit.
    pub failed: u64,
}

/// One block-list entry as seen by `dump`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockReport {
    /// Position in address order.
    pub index: usize,
    /// Heap offset of the header.
    pub offset: usize,
    /// Block id (−1 for free holes).
    pub id: i64,
    /// Heap offset of the first payload byte.
    pub payload: usize,
    /// Payload capacity in bytes.
    pub size: usize,
    /// Byte count originally requested; 0 for free holes.
    pub requested: usize,
    /// Whether the block is a free hole.
    pub free: bool,
    /// Whether accesses route through the cache.
    pub cacheable: bool,
    /// Count of `access` invocations against this block.
    pub cache_hits: u64,
}

/// Point-in-time heap statistics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeapReport {
    /// Total heap region size in bytes.
    pub heap_size: usize,
    /// Payload bytes held by allocated blocks.
    pub used_bytes: usize,
    /// Allocated block count.
    pub used_blocks: usize,
    /// Payload bytes held by free holes.
    pub free_bytes: usize,
    /// Free hole count.
    pub free_blocks: usize,
    /// Σ over allocated blocks of `size − requested`.
    pub internal_frag_bytes: usize,
    /// `internal_frag_bytes / used_bytes`, percent.
    pub internal_frag_pct: f64,
    /// `1 − largest_free / free_bytes`, percent; 0 when nothing is free.
    pub external_frag_pct: f64,
    /// Largest free hole payload size.
    pub largest_free_block: usize,
    /// Allocation attempt counters.
    pub counters: AllocCounters,
    /// `success / requests`, percent.
    pub success_pct: f64,
    /// `failed / requests`, percent.
    pub failure_pct: f64,
    /// `used_bytes / heap_size`, percent.
    pub utilization_pct: f64,
}

impl HeapReport {
    /// Computes ratios from raw byte totals and counters.
    #[must_use]
    pub fn from_totals(
        heap_size: usize,
        used_bytes: usize,
        used_blocks: usize,
        free_bytes: usize,
        free_blocks: usize,
        internal_frag_bytes: usize,
        largest_free_block: usize,
        counters: AllocCounters,
    ) -> Self {
        let pct = |num: f64, den: f64| if den == 0.0 { 0.0 } else { 100.0 * num / den };

        let external_frag_pct = if free_bytes != 0 && largest_free_block != 0 {
            100.0 * (1.0 - largest_free_block as f64 / free_bytes as f64)
        } else {
            0.0
        };

        Self {
            heap_size,
            used_bytes,
            used_blocks,
            free_bytes,
            free_blocks,
            internal_frag_bytes,
            internal_frag_pct: pct(internal_frag_bytes as f64, used_bytes as f64),
            external_frag_pct,
            largest_free_block,
            counters,
            success_pct: pct(counters.success as f64, counters.requests as f64),
            failure_pct: pct(counters.failed as f64, counters.requests as f64),
            utilization_pct: pct(used_bytes as f64, heap_size as f64),
        }
    }

    /// Renders the textual stats block.
    pub fn render<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "Allocator stats:")?;
        writeln!(out, "  Heap size: {} bytes", self.heap_size)?;
        writeln!(
            out,
            "  Used:      {} bytes in {} block(s)",
            self.used_bytes, self.used_blocks
        )?;
        writeln!(
            out,
            "  Free:      {} bytes in {} block(s)",
            self.free_bytes, self.free_blocks
        )?;
        writeln!(
            out,
            "  Internal fragmentation: {} bytes ({:.2}%)",
            self.internal_frag_bytes, self.internal_frag_pct
        )?;
        writeln!(
            out,
            "  External fragmentation: {:.2}%",
            self.external_frag_pct
        )?;
        writeln!(
            out,
            "  Largest free block:     {} bytes",
            self.largest_free_block
        )?;
        writeln!(
            out,
            "  Allocation requests:    {}",
            self.counters.requests
        )?;
        writeln!(
            out,
            "    Success:              {} ({:.2}%)",
            self.counters.success, self.success_pct
        )?;
        writeln!(
            out,
            "    Failures:             {} ({:.2}%)",
            self.counters.failed, self.failure_pct
        )?;
        writeln!(
            out,
            "  Memory utilization:     {:.2}% of heap",
            self.utilization_pct
        )
    }
}

/// Renders the `dump` block listing.
pub fn render_dump<W: Write>(blocks: &[BlockReport], out: &mut W) -> io::Result<()> {
    writeln!(out, "Heap dump (block list):")?;
    for block in blocks {
        writeln!(
            out,
            "  Block {}: offset={}, id={}, payload={}, size={}, {}, cacheable={}, cache_hits={}",
            block.index,
            block.offset,
            block.id,
            block.payload,
            block.size,
            if block.free { "FREE" } else { "USED" },
            if block.cacheable { "yes" } else { "no" },
            block.cache_hits,
        )?;
    }
    writeln!(out, "{HEADER_SIZE} bytes per block header")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratios_with_zero_denominators() {
        let report = HeapReport::from_totals(0, 0, 0, 0, 0, 0, 0, AllocCounters::default());
        assert_eq!(report.internal_frag_pct, 0.0);
        assert_eq!(report.external_frag_pct, 0.0);
        assert_eq!(report.success_pct, 0.0);
        assert_eq!(report.utilization_pct, 0.0);
    }

    #[test]
    fn external_fragmentation_single_hole_is_zero() {
        let report =
            HeapReport::from_totals(1024, 0, 0, 512, 1, 0, 512, AllocCounters::default());
        assert_eq!(report.external_frag_pct, 0.0);
    }

    #[test]
    fn external_fragmentation_split_holes() {
        // Two holes of 256/768: 1 - 768/1024 = 25%.
        let report =
            HeapReport::from_totals(4096, 0, 0, 1024, 2, 0, 768, AllocCounters::default());
        assert!((report.external_frag_pct - 25.0).abs() < 1e-9);
    }

    #[test]
    fn success_and_failure_split_requests() {
        let counters = AllocCounters {
            requests: 4,
            success: 3,
            failed: 1,
        };
        let report = HeapReport::from_totals(4096, 100, 1, 100, 1, 0, 100, counters);
        assert!((report.success_pct - 75.0).abs() < 1e-9);
        assert!((report.failure_pct - 25.0).abs() < 1e-9);
    }

    #[test]
    fn render_mentions_every_section() {
        let report = HeapReport::from_totals(
            4096,
            112,
            1,
            3872,
            1,
            12,
            3872,
            AllocCounters {
                requests: 1,
                success: 1,
                failed: 0,
            },
        );
        let mut out = Vec::new();
        report.render(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        for needle in [
            "Heap size: 4096 bytes",
            "Used:      112 bytes in 1 block(s)",
            "Internal fragmentation: 12 bytes",
            "Largest free block:     3872 bytes",
            "Memory utilization:",
        ] {
            assert!(text.contains(needle), "missing {needle:?} in:\n{text}");
        }
    }

    #[test]
    fn dump_lists_blocks_and_header_size() {
        let blocks = [BlockReport {
            index: 0,
            offset: 0,
            id: -1,
            payload: HEADER_SIZE,
            size: 4040,
            requested: 0,
            free: true,
            cacheable: false,
            cache_hits: 0,
        }];
        let mut out = Vec::new();
        render_dump(&blocks, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Block 0: offset=0, id=-1"));
        assert!(text.contains("FREE"));
        assert!(text.contains(&format!("{HEADER_SIZE} bytes per block header")));
    }
}
