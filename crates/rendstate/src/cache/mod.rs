//! Caches from 64-bit state hashes to already-created backend state.
//!
//! Keys are opaque hashes of state descriptors computed by the caller; equal
//! hashes are treated as equal state.

mod lru;
mod simple;

pub use lru::{Iter, LruHandle, StateCacheLru};
pub use simple::StateCache;

/// Teardown hook run when a cache gives up ownership of a value.
///
/// Backends implement this on their object wrappers to destroy the GPU object
/// (pipeline, descriptor set, sampler) the cache was holding.
pub trait Release {
    fn release(self);
}

macro_rules! release_noop {
    ($($ty:ty),*) => {
        $(impl Release for $ty {
            fn release(self) {}
        })*
    };
}

release_noop!((), u16, u32, u64);
