// src/sync/mod.rs

//! Small synchronisation building blocks shared by the scheduler.
//!
//! - [`latch`] is the resettable completion latch every schedule node owns.
//! - [`pool`] is the explicit, shared free-list used to recycle nodes.

pub mod latch;
pub mod pool;

pub use latch::Latch;
pub use pool::ObjectPool;
