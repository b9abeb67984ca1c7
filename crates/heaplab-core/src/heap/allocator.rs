//! Allocator façade.
//!
//! The [`MemorySandbox`] owns the heap storage, the block-id counter, the
//! allocation counters, the write-poisoning policy, and the cache
//! hierarchy. It is the only component that crosses from allocator-land to
//! cache-land: `read`, `write`, and `access` route heap-relative addresses
//! into the hierarchy, one access per byte touched.
//!
//! All operations are total: invalid arguments degrade to sentinel ids,
//! `false` returns, or no-ops, and land a record in the lifecycle event log
//! instead of panicking.

use std::io::{self, Write};

use crate::cache::CacheHierarchy;
use crate::config::{SandboxConfig, WritePolicy};
use crate::heap::block;
use crate::heap::layout::{
    BlockHeader, FREE_ID, HEADER_SIZE, PATTERN_FREED, PATTERN_UNINITIALIZED,
};
use crate::heap::stats::{AllocCounters, BlockReport, HeapReport};
use crate::heap::strategy::FitStrategy;

/// Lifecycle event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLevel {
    Trace,
    Info,
    Warn,
}

/// Structured lifecycle record for one façade operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    /// Monotonic event id.
    pub seq: u64,
    /// Severity level.
    pub level: EventLevel,
    /// Operation name (`malloc`, `free`, `read`, `write`, ...).
    pub op: &'static str,
    /// Event kind (`alloc`, `oom`, `garbage_read`, ...).
    pub event: &'static str,
    /// Block id involved, when one exists.
    pub id: Option<i64>,
    /// Byte count involved, when one exists.
    pub size: Option<usize>,
    /// Machine-readable outcome label.
    pub outcome: &'static str,
}

/// The memory-management sandbox: fixed-size heap plus cache simulator.
pub struct MemorySandbox {
    heap: Vec<u8>,
    /// Set once the spanning free block has been written.
    initialized: bool,
    next_id: i64,
    strategy: FitStrategy,
    write_policy: WritePolicy,
    counters: AllocCounters,
    cache: CacheHierarchy,
    events: Vec<EventRecord>,
    next_event_seq: u64,
}

impl MemorySandbox {
    /// Builds a sandbox over an externally supplied heap region.
    ///
    /// The region must at least hold one block header. The block list is
    /// written lazily on the first operation; the cache comes up in its
    /// default two-level configuration.
    #[must_use]
    pub fn new(storage: Vec<u8>, config: SandboxConfig) -> Self {
        assert!(
            storage.len() > HEADER_SIZE,
            "heap region must exceed one header"
        );
        let mut cache = CacheHierarchy::new();
        cache.init_default();
        Self {
            heap: storage,
            initialized: false,
            next_id: 0,
            strategy: config.strategy,
            write_policy: config.write_policy,
            counters: AllocCounters::default(),
            cache,
            events: Vec::new(),
            next_event_seq: 1,
        }
    }

    /// Total heap region size in bytes.
    #[must_use]
    pub fn heap_size(&self) -> usize {
        self.heap.len()
    }

    /// The cache hierarchy, for configuration commands.
    pub fn cache_mut(&mut self) -> &mut CacheHierarchy {
        self.ensure_init();
        &mut self.cache
    }

    /// The cache hierarchy, read-only.
    #[must_use]
    pub fn cache(&self) -> &CacheHierarchy {
        &self.cache
    }

    /// Allocation attempt counters.
    #[must_use]
    pub fn counters(&self) -> AllocCounters {
        self.counters
    }

    /// Current default fit strategy.
    #[must_use]
    pub fn strategy(&self) -> FitStrategy {
        self.strategy
    }

    /// Updates the default fit strategy used by [`MemorySandbox::malloc`].
    pub fn set_strategy(&mut self, strategy: FitStrategy) {
        self.strategy = strategy;
    }

    /// Current write-poisoning policy.
    #[must_use]
    pub fn write_policy(&self) -> WritePolicy {
        self.write_policy
    }

    /// Updates the write-poisoning policy.
    pub fn set_write_policy(&mut self, policy: WritePolicy) {
        self.write_policy = policy;
    }

    fn ensure_init(&mut self) {
        if self.initialized {
            return;
        }
        block::init(&mut self.heap);
        self.initialized = true;
    }

    fn record(
        &mut self,
        level: EventLevel,
        op: &'static str,
        event: &'static str,
        id: Option<i64>,
        size: Option<usize>,
        outcome: &'static str,
    ) {
        let seq = self.next_event_seq;
        self.next_event_seq += 1;
        self.events.push(EventRecord {
            seq,
            level,
            op,
            event,
            id,
            size,
            outcome,
        });
    }

    /// Lifecycle event records accumulated so far.
    #[must_use]
    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    /// Drains the lifecycle event records.
    pub fn drain_events(&mut self) -> Vec<EventRecord> {
        std::mem::take(&mut self.events)
    }

    /// Allocates `size` bytes under the current default strategy.
    pub fn malloc(&mut self, size: usize) -> i64 {
        self.malloc_with(size, self.strategy)
    }

    /// Allocates `size` bytes, parsing the strategy from its command
    /// spelling (unknown spellings fall back to first fit).
    pub fn malloc_named(&mut self, size: usize, strategy: &str) -> i64 {
        self.malloc_with(size, FitStrategy::parse(strategy))
    }

    /// Allocates `size` bytes under an explicit fit strategy.
    ///
    /// Returns the new block's id, or −1 when `size` is zero or no free
    /// block fits the aligned request.
    pub fn malloc_with(&mut self, size: usize, strategy: FitStrategy) -> i64 {
        self.ensure_init();
        if size == 0 {
            self.record(
                EventLevel::Warn,
                "malloc",
                "zero_size",
                None,
                Some(0),
                "denied",
            );
            return -1;
        }

        self.counters.requests += 1;
        let aligned = block::aligned_request(size);

        let Some(offset) = block::find_fit(&self.heap, aligned, strategy) else {
            self.counters.failed += 1;
            self.record(
                EventLevel::Warn,
                "malloc",
                "no_fit",
                None,
                Some(size),
                "oom",
            );
            return -1;
        };

        block::split_if_needed(&mut self.heap, offset, aligned);

        let mut header = BlockHeader::read(&self.heap, offset);
        let id = self.next_id;
        self.next_id += 1;
        header.free = false;
        header.id = id;
        header.cacheable = true;
        header.cache_hits = 0;
        header.payload = offset + HEADER_SIZE;
        header.requested = size;
        header.write(&mut self.heap, offset);

        // Poison the entire payload, slack included.
        let payload = header.payload;
        self.heap[payload..payload + header.size].fill(PATTERN_UNINITIALIZED);

        self.counters.success += 1;
        self.record(
            EventLevel::Trace,
            "malloc",
            "alloc",
            Some(id),
            Some(size),
            "success",
        );
        id
    }

    /// Frees the block carrying `id` and coalesces adjacent holes.
    ///
    /// Negative or unknown ids are ignored, so a double free degrades to a
    /// no-op.
    pub fn free(&mut self, id: i64) {
        self.ensure_init();
        if id < 0 {
            self.record(
                EventLevel::Trace,
                "free",
                "negative_id",
                Some(id),
                None,
                "noop",
            );
            return;
        }

        let Some(offset) = block::find_by_id(&self.heap, id) else {
            self.record(
                EventLevel::Warn,
                "free",
                "unknown_id",
                Some(id),
                None,
                "ignored",
            );
            return;
        };

        let mut header = BlockHeader::read(&self.heap, offset);
        header.free = true;
        header.id = FREE_ID;
        header.cacheable = false;
        header.cache_hits = 0;
        header.requested = 0;
        header.write(&mut self.heap, offset);

        let payload = header.payload;
        self.heap[payload..payload + header.size].fill(PATTERN_FREED);

        block::coalesce(&mut self.heap);
        self.record(
            EventLevel::Trace,
            "free",
            "free",
            Some(id),
            Some(header.size),
            "success",
        );
    }

    /// Marks the block carrying `id` cacheable or not. No-op for unknown
    /// or negative ids.
    pub fn set_cacheable(&mut self, id: i64, cacheable: bool) {
        self.ensure_init();
        if id < 0 {
            return;
        }
        let Some(offset) = block::find_by_id(&self.heap, id) else {
            return;
        };
        let mut header = BlockHeader::read(&self.heap, offset);
        header.cacheable = cacheable;
        header.write(&mut self.heap, offset);
    }

    /// Simulates one cache access through the block carrying `id`.
    ///
    /// Routes the heap-relative address of the block's first payload byte
    /// through the hierarchy and bumps the block's access counter. No-op
    /// for unknown, negative, or non-cacheable ids.
    pub fn access(&mut self, id: i64, is_write: bool) {
        self.ensure_init();
        if id < 0 {
            return;
        }
        let Some(offset) = block::find_by_id(&self.heap, id) else {
            return;
        };
        let mut header = BlockHeader::read(&self.heap, offset);
        if !header.cacheable {
            return;
        }
        self.cache.access(header.payload as u64, is_write);
        header.cache_hits += 1;
        header.write(&mut self.heap, offset);
    }

    /// Reads `dst.len()` bytes starting at `offset` within the block's
    /// user-requested range.
    ///
    /// Every source byte routes through the cache. Bytes are copied
    /// unconditionally; the return value is `false` when the range is
    /// invalid or any byte still holds a poison pattern, in which case the
    /// caller must treat the copied bytes as untrusted.
    pub fn read(&mut self, id: i64, offset: usize, dst: &mut [u8]) -> bool {
        self.ensure_init();
        let count = dst.len();
        if id < 0 || count == 0 {
            return false;
        }
        let Some(block_offset) = block::find_by_id(&self.heap, id) else {
            return false;
        };
        let header = BlockHeader::read(&self.heap, block_offset);
        if header.free || !range_fits(offset, count, header.requested) {
            return false;
        }

        let base = header.payload + offset;
        let mut garbage = false;
        for i in 0..count {
            let value = self.heap[base + i];
            self.cache.access((base + i) as u64, false);
            if value == PATTERN_UNINITIALIZED || value == PATTERN_FREED {
                garbage = true;
            }
            dst[i] = value;
        }

        if garbage {
            self.record(
                EventLevel::Warn,
                "read",
                "garbage_read",
                Some(id),
                Some(count),
                "flagged",
            );
            return false;
        }
        true
    }

    /// Writes `src` into the block starting at `offset` within its
    /// user-requested range.
    ///
    /// Every destination byte routes through the cache. A destination range
    /// still holding poison bytes is flagged in the event log; under
    /// [`WritePolicy::Strict`] the write is aborted before any byte is
    /// stored, otherwise it proceeds and reports success.
    pub fn write(&mut self, id: i64, offset: usize, src: &[u8]) -> bool {
        self.ensure_init();
        let count = src.len();
        if id < 0 || count == 0 {
            return false;
        }
        let Some(block_offset) = block::find_by_id(&self.heap, id) else {
            return false;
        };
        let header = BlockHeader::read(&self.heap, block_offset);
        if header.free || !range_fits(offset, count, header.requested) {
            return false;
        }

        let base = header.payload + offset;
        let garbage = self.heap[base..base + count]
            .iter()
            .any(|&b| b == PATTERN_UNINITIALIZED || b == PATTERN_FREED);
        if garbage {
            let denied = self.write_policy.rejects_garbage();
            self.record(
                if denied {
                    EventLevel::Warn
                } else {
                    EventLevel::Info
                },
                "write",
                "garbage_destination",
                Some(id),
                Some(count),
                if denied { "denied" } else { "flagged" },
            );
            if denied {
                return false;
            }
        }

        for i in 0..count {
            self.cache.access((base + i) as u64, true);
            self.heap[base + i] = src[i];
        }
        true
    }

    /// Snapshot of every block in address order.
    #[must_use]
    pub fn block_reports(&mut self) -> Vec<BlockReport> {
        self.ensure_init();
        block::blocks(&self.heap)
            .enumerate()
            .map(|(index, (offset, header))| BlockReport {
                index,
                offset,
                id: header.id,
                payload: header.payload,
                size: header.size,
                requested: header.requested,
                free: header.free,
                cacheable: header.cacheable,
                cache_hits: header.cache_hits,
            })
            .collect()
    }

    /// Snapshot of the heap statistics.
    #[must_use]
    pub fn heap_report(&mut self) -> HeapReport {
        self.ensure_init();
        let mut used_bytes = 0;
        let mut used_blocks = 0;
        let mut free_bytes = 0;
        let mut free_blocks = 0;
        let mut internal_frag = 0;
        let mut largest_free = 0;

        for (_, header) in block::blocks(&self.heap) {
            if header.free {
                free_blocks += 1;
                free_bytes += header.size;
                largest_free = largest_free.max(header.size);
            } else {
                used_blocks += 1;
                used_bytes += header.size;
                internal_frag += header.size - header.requested.min(header.size);
            }
        }

        HeapReport::from_totals(
            self.heap.len(),
            used_bytes,
            used_blocks,
            free_bytes,
            free_blocks,
            internal_frag,
            largest_free,
            self.counters,
        )
    }

    /// Writes the `dump` block listing to `out`.
    pub fn render_dump<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        let blocks = self.block_reports();
        crate::heap::stats::render_dump(&blocks, out)
    }

    /// Writes the combined allocator and cache statistics to `out`.
    pub fn render_stats<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        self.heap_report().render(out)?;
        writeln!(out, "\nCache statistics:")?;
        self.cache.dump_stats(out)
    }

    /// Prints the block listing to stdout.
    pub fn dump(&mut self) {
        let _ = self.render_dump(&mut io::stdout());
    }

    /// Prints the combined statistics to stdout.
    pub fn stats(&mut self) {
        let _ = self.render_stats(&mut io::stdout());
    }

    /// Direct payload inspection for tests and harnesses: the byte at
    /// `offset` within the block's payload, addressed by current block
    /// layout rather than by id (free holes included).
    #[must_use]
    pub fn peek_payload(&mut self, block_index: usize, offset: usize) -> Option<u8> {
        self.ensure_init();
        let (_, header) = block::blocks(&self.heap).nth(block_index)?;
        if offset >= header.size {
            return None;
        }
        Some(self.heap[header.payload + offset])
    }
}

/// `offset + count` stays inside `requested`, without overflowing.
fn range_fits(offset: usize, count: usize, requested: usize) -> bool {
    offset
        .checked_add(count)
        .is_some_and(|end| end <= requested)
}
