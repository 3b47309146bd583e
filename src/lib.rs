//! Storage core of a disk-backed database: fixed-size slotted pages on a
//! single file, cached by a bounded buffer pool with LRU eviction.
//!
//! Individual pool operations are internally synchronized, but multi-step
//! sequences (pin, mutate through the handle, unpin) must be serialized by
//! the caller; see [`BufferPoolManager`].

pub mod common;
pub mod storage;

// Re-export key items for convenient access
pub use storage::buffer::BufferPoolManager;
pub use storage::buffer::BufferPoolError;
pub use storage::page::{Page, PageError};
