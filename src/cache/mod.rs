//! Session-scoped detail cache for remote lookups.
//!
//! This module provides a catalog-agnostic caching mechanism that:
//! - Serves entities from memory while they are fresh
//! - Coalesces concurrent lookups of the same key into one fetch
//! - Falls back to a stale entry when a refetch fails (offline mode)

mod layer;
mod storage;
mod traits;

pub use layer::CacheLayer;
pub use traits::{CacheResult, CacheSource};
