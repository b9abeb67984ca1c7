//! Heap allocation.
//!
//! Implements the intrusive free-list allocator over a fixed-size byte
//! region:
//! - Block headers are serialized into the heap bytes themselves (`layout`)
//! - Fit selection, splitting and coalescing walk the embedded list (`block`)
//! - The façade owns the storage, ids, counters and the cache bridge
//!   (`allocator`)

pub mod allocator;
pub mod block;
pub mod layout;
pub mod stats;
pub mod strategy;

pub use allocator::MemorySandbox;
pub use layout::BlockHeader;
pub use stats::{AllocCounters, HeapReport};
pub use strategy::FitStrategy;
