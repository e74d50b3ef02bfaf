//! # Ashgate Core
//!
//! The memory model every other Ashgate crate builds on:
//! - Reserve a large range once at startup
//! - Commit it in fixed granules as the bump cursor advances
//! - Never free individual objects
//!
//! ## Architecture Rules
//!
//! 1. **No per-object free** - blocks live as long as the process
//! 2. **Exhaustion is fatal** - capacity is sized from configured connection limits
//! 3. **Single-threaded** - one arena is shared by the services of one event loop
//!
//! ## Example
//!
//! ```rust,ignore
//! use ashgate_core::Arena;
//!
//! let arena = Arena::reserve(64 * 1024 * 1024, 1024 * 1024)?;
//! let read_buffer = arena.alloc(2048, 8);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod memory;

pub use error::{ArenaError, ArenaResult};
pub use memory::{Arena, ArenaBlock, BufferPool, SlotPool};
