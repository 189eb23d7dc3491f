//! Two-tier caching: an in-process mirror in front of a durable sqlite store.
//!
//! The cache is opportunistic, never a source of truth:
//! - one entry per key, upsert semantics, no explicit deletion
//! - a shared freshness policy `(now - updated_at) < ttl`, TTL per call site
//! - a failing durable tier degrades to a miss instead of failing the request

mod layer;
mod storage;

pub use layer::TieredCache;
pub use storage::{CacheStorage, NoopStorage, SqliteStorage};
