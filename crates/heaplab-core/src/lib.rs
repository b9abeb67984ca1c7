//! # heaplab-core
//!
//! A pedagogical memory-management sandbox: a fixed-size heap managed by an
//! intrusive free-list allocator, coupled with an inclusive multi-level cache
//! simulator. Harnesses issue allocate/free/read/write commands and observe
//! fragmentation, fit-strategy effects, and cache behavior.
//!
//! # Architecture
//!
//! - **Heap layout** (`heap::layout`): byte codec for the intrusive block
//!   headers embedded in the heap region; all offset arithmetic lives here
//! - **Block list** (`heap::block`): fit selection, splitting, coalescing
//!   over the singly-linked block list
//! - **Allocator façade** (`heap::allocator`): the [`MemorySandbox`] owning
//!   the heap storage, allocation counters, lifecycle events, and the bridge
//!   into the cache hierarchy
//! - **Cache level** (`cache::level`): one set-associative cache with LFU
//!   replacement and LRU tie-break
//! - **Cache hierarchy** (`cache::hierarchy`): ordered levels, inclusive
//!   fill, miss-penalty attribution, global logical clock
//! - **Configuration** (`config`): fit strategy and write-poisoning policy
//! - **Global façade** (`global`): process-wide sandbox singleton behind a
//!   single mutex, for harnesses that need a C-like flat API

#![deny(unsafe_code)]

pub mod cache;
pub mod config;
pub mod global;
pub mod heap;

pub use cache::{CacheHierarchy, CacheLevel, CacheLevelReport, CacheReport};
pub use config::{SandboxConfig, WritePolicy};
pub use heap::allocator::{EventLevel, EventRecord, MemorySandbox};
pub use heap::layout::{HEADER_SIZE, MAX_ALIGN, PATTERN_FREED, PATTERN_UNINITIALIZED};
pub use heap::stats::{AllocCounters, BlockReport, HeapReport};
pub use heap::strategy::FitStrategy;
pub use global::DEFAULT_HEAP_SIZE;
