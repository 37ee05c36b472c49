// hive-control/src/idempotency.rs
// ============================================================================
// Module: Idempotency Cache
// Description: Caches a command's result keyed by its caller-supplied
//              `command-id`, so replaying the same command is a no-op.
// Purpose: Satisfy the Control RPC contract that every command is
//          idempotent by `command-id` (spec.md §6).
// Dependencies: hive_core::CommandId, serde_json, tokio::sync::Mutex
// ============================================================================

//! ## Overview
//! Every [`crate::engine::Engine`] command is wrapped in
//! [`IdempotencyCache::get_or_insert`]: the first call with a given
//! `command-id` runs the command and caches its serialized result; every
//! later call with the same id returns the cached result without mutating
//! state again. A `command-id` reused for a structurally different result
//! type is a caller bug, surfaced as [`crate::error::EngineError::IdempotencyConflict`]
//! rather than silently returning a mismatched value.

use std::collections::HashMap;

use hive_core::CommandId;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::EngineError;

/// Caches command results by `command-id`.
#[derive(Default)]
pub struct IdempotencyCache {
    entries: Mutex<HashMap<CommandId, Value>>,
}

impl IdempotencyCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached result for `command_id` if present, running `f`
    /// and caching its result otherwise. `f`'s error is never cached, so a
    /// failed command may be retried under the same `command_id`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::IdempotencyConflict`] if a cached value
    /// exists but cannot be decoded as `T`; propagates `f`'s error
    /// otherwise.
    pub async fn get_or_insert<T, F>(&self, command_id: &CommandId, f: F) -> Result<T, EngineError>
    where
        T: Serialize + DeserializeOwned,
        F: std::future::Future<Output = Result<T, EngineError>>,
    {
        if let Some(cached) = self.entries.lock().await.get(command_id).cloned() {
            return serde_json::from_value(cached)
                .map_err(|_| EngineError::IdempotencyConflict(command_id.to_string()));
        }
        let result = f.await?;
        let encoded = serde_json::to_value(&result)
            .map_err(|_| EngineError::IdempotencyConflict(command_id.to_string()))?;
        self.entries.lock().await.insert(command_id.clone(), encoded);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;
    use std::sync::atomic::Ordering;

    use super::*;

    #[tokio::test]
    async fn replaying_the_same_command_id_does_not_rerun_the_closure() {
        let cache = IdempotencyCache::new();
        let calls = AtomicU32::new(0);
        let id = CommandId::new("cmd-1");

        for _ in 0..3 {
            let result = cache
                .get_or_insert(&id, async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, EngineError>(42u64)
                })
                .await
                .expect("get_or_insert");
            assert_eq!(result, 42);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_command_ids_run_independently() {
        let cache = IdempotencyCache::new();
        let a = cache.get_or_insert(&CommandId::new("a"), async { Ok::<_, EngineError>(1u64) }).await.expect("a");
        let b = cache.get_or_insert(&CommandId::new("b"), async { Ok::<_, EngineError>(2u64) }).await.expect("b");
        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }
}
