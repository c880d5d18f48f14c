//! Memoization for async functions.
//!
//! Works like [`crate::sync::SyncMemoized`] but the slots are
//! `tokio::sync::OnceCell`s, so callers waiting on a result that is still
//! being computed yield to the runtime instead of blocking a thread. If the
//! caller driving the computation is cancelled, the slot stays empty and one
//! of the waiting callers takes over.
//!
//! As with [`crate::sync::SyncMemoized`], a failed slot nobody else is
//! waiting on is dropped from the map, and a call that awaits the same
//! wrapper with its own signature never completes.

use crate::error::CallError;
use crate::key::{Args, CallSignature, FnId};
use crate::metrics::Metrics;
use crate::Result;
use dashmap::DashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, trace, warn};

/// An async callable wrapped with an unbounded result cache.
pub struct AsyncMemoized<F, T> {
    id: FnId,
    func: F,
    slots: DashMap<CallSignature, Arc<OnceCell<T>>>,
    metrics: Metrics,
}

impl<F, T> fmt::Debug for AsyncMemoized<F, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncMemoized")
            .field("id", &self.id)
            .field("slots", &self.slots.len())
            .field("metrics", &self.metrics)
            .finish()
    }
}

impl<F, T> AsyncMemoized<F, T> {
    /// Wrap `func` under an explicit name.
    pub fn named(name: impl Into<FnId>, func: F) -> Self {
        Self {
            id: name.into(),
            func,
            slots: DashMap::new(),
            metrics: Metrics::new(),
        }
    }

    /// Identity of the wrapped function.
    pub fn name(&self) -> &FnId {
        &self.id
    }

    /// Call statistics.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Number of cached results.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.value().initialized())
            .count()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a call with `args` would be answered from the cache.
    pub fn contains(&self, args: &Args) -> bool {
        CallSignature::derive(&self.id, args)
            .ok()
            .and_then(|signature| {
                self.slots
                    .get(&signature)
                    .map(|slot| slot.value().initialized())
            })
            .unwrap_or(false)
    }

    fn signature(&self, args: &Args) -> Result<CallSignature> {
        CallSignature::derive(&self.id, args).map_err(|err| {
            warn!(function = %self.id, error = %err, "cannot derive call signature");
            err
        })
    }

    fn slot(&self, signature: &CallSignature) -> Arc<OnceCell<T>> {
        if let Some(slot) = self.slots.get(signature) {
            return slot.value().clone();
        }
        self.slots
            .entry(signature.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .value()
            .clone()
    }

    // Our own handle and the map's are the only two references when nobody
    // else is waiting on the slot.
    fn forget_failed(&self, signature: &CallSignature, slot: &Arc<OnceCell<T>>) {
        if Arc::strong_count(slot) <= 2 {
            self.slots.remove_if(signature, |_, slot| {
                !slot.initialized() && Arc::strong_count(slot) <= 2
            });
        }
    }

    fn record(&self, signature: &CallSignature, ran: bool) {
        if ran {
            self.metrics.record_miss();
            self.metrics.record_insertion();
            debug!(function = %self.id, fingerprint = signature.fingerprint(), "memo miss");
        } else {
            self.metrics.record_hit();
            trace!(function = %self.id, fingerprint = signature.fingerprint(), "memo hit");
        }
    }
}

impl<F, Fut, T> AsyncMemoized<F, T>
where
    F: Fn(Args) -> Fut,
    Fut: Future<Output = T>,
    T: Clone,
{
    /// Call the wrapped function, or return the cached result.
    pub async fn call(&self, args: Args) -> Result<T> {
        let signature = self.signature(&args)?;
        let slot = self.slot(&signature);

        let mut ran = false;
        let value = slot
            .get_or_init(|| {
                ran = true;
                (self.func)(args)
            })
            .await
            .clone();

        self.record(&signature, ran);
        Ok(value)
    }
}

impl<F, Fut, T, E> AsyncMemoized<F, T>
where
    F: Fn(Args) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    T: Clone,
{
    /// Call the wrapped function, or return the cached success.
    ///
    /// Errors are returned in [`CallError::Failed`] and never cached.
    pub async fn try_call(&self, args: Args) -> std::result::Result<T, CallError<E>> {
        let signature = self.signature(&args)?;
        let slot = self.slot(&signature);

        let mut ran = false;
        let outcome = slot
            .get_or_try_init(|| {
                ran = true;
                (self.func)(args)
            })
            .await;

        match outcome {
            Ok(value) => {
                let value = value.clone();
                self.record(&signature, ran);
                Ok(value)
            }
            Err(err) => {
                self.forget_failed(&signature, &slot);
                self.metrics.record_miss();
                self.metrics.record_failure();
                warn!(
                    function = %self.id,
                    fingerprint = signature.fingerprint(),
                    "wrapped function failed; result not cached"
                );
                Err(CallError::Failed(err))
            }
        }
    }
}
