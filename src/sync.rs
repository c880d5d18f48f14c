//! A memoizer that can be shared between threads.
//!
//! Each call signature owns a slot, a `OnceCell` stored in a `DashMap`. The
//! map's shard lock is only held while fetching or creating the slot, never
//! while the wrapped function runs. Concurrent calls with the same signature
//! collapse onto one execution: the first caller runs the function and the
//! others block on the slot until the result is in. If the function fails
//! the slot stays empty and the next caller in line tries again.
//!
//! A slot that fails with no other caller waiting on it is dropped from the
//! map, so failing signatures do not accumulate. The wrapped function must
//! not call the same wrapper with its own signature: the inner call waits on
//! the slot the outer call is filling and never returns.

use crate::error::CallError;
use crate::key::{Args, CallSignature, FnId};
use crate::metrics::Metrics;
use crate::Result;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// A thread-safe callable wrapped with an unbounded result cache.
pub struct SyncMemoized<F, T> {
    id: FnId,
    func: F,
    slots: DashMap<CallSignature, Arc<OnceCell<T>>>,
    metrics: Metrics,
}

impl<F, T> fmt::Debug for SyncMemoized<F, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncMemoized")
            .field("id", &self.id)
            .field("slots", &self.slots.len())
            .field("metrics", &self.metrics)
            .finish()
    }
}

impl<F, T> SyncMemoized<F, T> {
    fn with_id(id: FnId, func: F) -> Self {
        Self {
            id,
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
            .filter(|slot| slot.value().get().is_some())
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
                    .map(|slot| slot.value().get().is_some())
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
                slot.get().is_none() && Arc::strong_count(slot) <= 2
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

impl<F, T> SyncMemoized<F, T>
where
    F: Fn(&Args) -> T + Send + Sync,
    T: Clone + Send + Sync,
{
    /// Wrap `func`, identifying it by its type name.
    pub fn wrap(func: F) -> Self {
        Self::with_id(FnId::of::<F>(), func)
    }

    /// Wrap `func` under an explicit name.
    pub fn named(name: impl Into<FnId>, func: F) -> Self {
        Self::with_id(name.into(), func)
    }

    /// Call the wrapped function, or return the cached result.
    pub fn call(&self, args: Args) -> Result<T> {
        let signature = self.signature(&args)?;
        let slot = self.slot(&signature);

        let mut ran = false;
        let value = slot
            .get_or_init(|| {
                ran = true;
                (self.func)(&args)
            })
            .clone();

        self.record(&signature, ran);
        Ok(value)
    }
}

impl<F, T, E> SyncMemoized<F, T>
where
    F: Fn(&Args) -> std::result::Result<T, E> + Send + Sync,
    T: Clone + Send + Sync,
{
    /// Wrap a fallible `func`, identifying it by its type name.
    pub fn wrap_fallible(func: F) -> Self {
        Self::with_id(FnId::of::<F>(), func)
    }

    /// Wrap a fallible `func` under an explicit name.
    pub fn named_fallible(name: impl Into<FnId>, func: F) -> Self {
        Self::with_id(name.into(), func)
    }

    /// Call the wrapped function, or return the cached success.
    ///
    /// Errors are returned in [`CallError::Failed`] and never cached.
    pub fn try_call(&self, args: Args) -> std::result::Result<T, CallError<E>> {
        let signature = self.signature(&args)?;
        let slot = self.slot(&signature);

        let mut ran = false;
        let outcome = slot.get_or_try_init(|| {
            ran = true;
            (self.func)(&args)
        });

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
