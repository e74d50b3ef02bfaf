//! # Memory Management
//!
//! Reserved-once memory for connection tables and wire buffers.
//!
//! ## Design Philosophy
//!
//! All memory comes out of one reservation made at startup. While serving:
//! - No per-object frees
//! - Buffers are recycled through free lists, never returned to the OS
//! - Running out of reservation is a configuration error, not a runtime condition

mod arena;
mod buffers;
mod pool;

pub use arena::{Arena, ArenaBlock};
pub use buffers::BufferPool;
pub use pool::SlotPool;
