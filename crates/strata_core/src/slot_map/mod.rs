//! # Slot Map
//!
//! Stable-handle storage with O(1) insert, erase and lookup.
//!
//! ## Design Philosophy
//!
//! - Values live in one dense array, so iteration never skips holes
//! - Keys are indices into a key table; they stay valid while other values
//!   are inserted and erased
//! - Freed keys are recycled through an intrusive free list
//! - No generation counters: stale keys are the caller's responsibility

mod key;
mod map;

pub use key::{Handle, Key};
pub use map::SlotMap;
