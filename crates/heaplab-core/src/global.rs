//! Process-wide sandbox singleton.
//!
//! Harnesses ported from flat C-style APIs want free functions instead of a
//! threaded-through handle. This module keeps one [`MemorySandbox`] behind a
//! single [`parking_lot::Mutex`]; every public operation locks it for the
//! full call, which also serializes the logical cache clock.
//!
//! The sandbox is created on first use with a [`DEFAULT_HEAP_SIZE`] heap and
//! default config. [`reset`] discards it so tests can start fresh.

use parking_lot::Mutex;

use crate::cache::CacheReport;
use crate::config::SandboxConfig;
use crate::heap::allocator::MemorySandbox;
use crate::heap::stats::HeapReport;
use crate::heap::strategy::FitStrategy;

/// Heap size used by the lazily created global sandbox: 64 KiB.
pub const DEFAULT_HEAP_SIZE: usize = 64 * 1024;

static SANDBOX: Mutex<Option<MemorySandbox>> = Mutex::new(None);

fn with_sandbox<T>(f: impl FnOnce(&mut MemorySandbox) -> T) -> T {
    let mut guard = SANDBOX.lock();
    let sandbox = guard.get_or_insert_with(|| {
        MemorySandbox::new(vec![0u8; DEFAULT_HEAP_SIZE], SandboxConfig::default())
    });
    f(sandbox)
}

/// Discards the global sandbox; the next operation recreates it fresh.
pub fn reset() {
    *SANDBOX.lock() = None;
}

/// Replaces the global sandbox with one over the given storage and config.
pub fn install(storage: Vec<u8>, config: SandboxConfig) {
    *SANDBOX.lock() = Some(MemorySandbox::new(storage, config));
}

/// Allocates under the current default strategy. −1 on failure.
pub fn malloc(size: usize) -> i64 {
    with_sandbox(|sb| sb.malloc(size))
}

/// Allocates under a strategy given by its command spelling.
pub fn malloc_named(size: usize, strategy: &str) -> i64 {
    with_sandbox(|sb| sb.malloc_named(size, strategy))
}

/// Allocates under an explicit strategy.
pub fn malloc_with(size: usize, strategy: FitStrategy) -> i64 {
    with_sandbox(|sb| sb.malloc_with(size, strategy))
}

/// Frees the block carrying `id`.
pub fn free(id: i64) {
    with_sandbox(|sb| sb.free(id));
}

/// Updates the default fit strategy.
pub fn set_strategy(strategy: FitStrategy) {
    with_sandbox(|sb| sb.set_strategy(strategy));
}

/// Marks a block cacheable or not.
pub fn set_cacheable(id: i64, cacheable: bool) {
    with_sandbox(|sb| sb.set_cacheable(id, cacheable));
}

/// Simulates one cache access through a block.
pub fn access(id: i64, is_write: bool) {
    with_sandbox(|sb| sb.access(id, is_write));
}

/// Reads from a block; see [`MemorySandbox::read`].
pub fn read(id: i64, offset: usize, dst: &mut [u8]) -> bool {
    with_sandbox(|sb| sb.read(id, offset, dst))
}

/// Writes into a block; see [`MemorySandbox::write`].
pub fn write(id: i64, offset: usize, src: &[u8]) -> bool {
    with_sandbox(|sb| sb.write(id, offset, src))
}

/// Prints the block listing to stdout.
pub fn dump() {
    with_sandbox(MemorySandbox::dump);
}

/// Prints the combined statistics to stdout.
pub fn stats() {
    with_sandbox(MemorySandbox::stats);
}

/// Snapshot of the heap statistics.
pub fn heap_report() -> HeapReport {
    with_sandbox(MemorySandbox::heap_report)
}

/// Snapshot of the cache statistics.
pub fn cache_report() -> CacheReport {
    with_sandbox(|sb| sb.cache().report())
}

/// Resets the global cache hierarchy to no levels.
pub fn cache_reset() {
    with_sandbox(|sb| sb.cache_mut().reset());
}

/// Restores the default two-level cache configuration.
pub fn cache_init_default() {
    with_sandbox(|sb| sb.cache_mut().init_default());
}

/// Appends a cache level.
pub fn cache_add_level(size_bytes: usize, block_size: usize, associativity: usize, latency: u64) {
    with_sandbox(|sb| {
        sb.cache_mut()
            .add_level(size_bytes, block_size, associativity, latency)
    });
}

/// Replaces the cache level at `index`; out-of-range indices are ignored.
pub fn cache_configure_level(
    index: usize,
    size_bytes: usize,
    block_size: usize,
    associativity: usize,
    latency: u64,
) {
    with_sandbox(|sb| {
        sb.cache_mut()
            .configure_level(index, size_bytes, block_size, associativity, latency)
    });
}

/// Number of configured cache levels.
pub fn cache_level_count() -> usize {
    with_sandbox(|sb| sb.cache().level_count())
}

/// Sets the main-memory latency.
pub fn cache_set_memory_latency(latency: u64) {
    with_sandbox(|sb| sb.cache_mut().set_memory_latency(latency));
}
