//! Two-tier cache: in-memory mirror over the durable store.

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use super::storage::CacheStorage;
use crate::error::Result;

/// Process-lifetime cache layered in front of the durable store.
///
/// The mirror is purely a latency shortcut: when present and fresh its
/// content is the same JSON the durable tier would return. Both tiers share
/// one freshness policy, `(now - updated_at) < ttl`, with the TTL supplied
/// per call site.
pub struct TieredCache<S: CacheStorage> {
  storage: Arc<S>,
  mirror: Arc<Mutex<HashMap<String, MirrorEntry>>>,
  /// When false, both tiers are bypassed: every `cached` call recomputes.
  enabled: bool,
}

#[derive(Clone)]
struct MirrorEntry {
  value: Value,
  captured_at: DateTime<Utc>,
}

impl<S: CacheStorage> TieredCache<S> {
  pub fn new(storage: S) -> Self {
    Self {
      storage: Arc::new(storage),
      mirror: Arc::new(Mutex::new(HashMap::new())),
      enabled: true,
    }
  }

  /// A cache that never serves from either tier. Disabling caching must mean
  /// every request recomputes, not "durable tier only".
  pub fn disabled(storage: S) -> Self {
    Self {
      enabled: false,
      ..Self::new(storage)
    }
  }

  fn is_fresh(updated_at: DateTime<Utc>, ttl: Duration) -> bool {
    Utc::now() - updated_at < ttl
  }

  /// Look a key up across both tiers.
  ///
  /// Mirror first; on a fresh durable hit the mirror is repopulated so the
  /// next lookup short-circuits. A failing durable tier is logged and
  /// treated as a miss - the cache is never allowed to fail a request.
  pub fn lookup(&self, key: &str, ttl: Duration) -> Option<Value> {
    if !self.enabled {
      return None;
    }
    {
      let mirror = self.mirror.lock().ok()?;
      if let Some(entry) = mirror.get(key) {
        if Self::is_fresh(entry.captured_at, ttl) {
          debug!(key, "cache hit (memory)");
          return Some(entry.value.clone());
        }
      }
    }

    let entry = match self.storage.get(key) {
      Ok(found) => found?,
      Err(err) => {
        warn!(key, %err, "durable cache read failed, treating as miss");
        return None;
      }
    };

    if !Self::is_fresh(entry.updated_at, ttl) {
      return None;
    }

    match serde_json::from_str::<Value>(&entry.data) {
      Ok(value) => {
        debug!(key, "cache hit (durable)");
        if let Ok(mut mirror) = self.mirror.lock() {
          mirror.insert(
            key.to_string(),
            MirrorEntry {
              value: value.clone(),
              captured_at: entry.updated_at,
            },
          );
        }
        Some(value)
      }
      Err(err) => {
        warn!(key, %err, "corrupt cache entry, treating as miss");
        None
      }
    }
  }

  /// Write a value to both tiers unconditionally (upsert).
  pub fn store(&self, key: &str, value: &Value) {
    if !self.enabled {
      return;
    }
    if let Ok(mut mirror) = self.mirror.lock() {
      mirror.insert(
        key.to_string(),
        MirrorEntry {
          value: value.clone(),
          captured_at: Utc::now(),
        },
      );
    }

    // Best-effort: a broken durable tier must not fail the request.
    if let Err(err) = self.storage.put(key, &value.to_string()) {
      warn!(key, %err, "durable cache write failed");
    }
  }

  /// The one caching wrapper every handler goes through: look up `key`, and
  /// on miss run `compute`, store the result in both tiers, and return it.
  pub async fn cached<T, F, Fut>(&self, key: &str, ttl: Duration, compute: F) -> Result<T>
  where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    if let Some(value) = self.lookup(key, ttl) {
      if let Ok(parsed) = serde_json::from_value::<T>(value) {
        return Ok(parsed);
      }
      // Shape drift between releases; recompute and overwrite.
      warn!(key, "cached payload no longer deserializes, recomputing");
    }

    let computed = compute().await?;
    match serde_json::to_value(&computed) {
      Ok(value) => self.store(key, &value),
      Err(err) => warn!(key, %err, "failed to serialize value for caching"),
    }
    Ok(computed)
  }
}

impl<S: CacheStorage> Clone for TieredCache<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      mirror: Arc::clone(&self.mirror),
      enabled: self.enabled,
    }
  }
}
