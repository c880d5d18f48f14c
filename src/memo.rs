//! The memoizing wrapper.
//!
//! [`Memoized`] owns a callable and a private [`CacheStore`]. Each call
//! derives a [`CallSignature`] from the arguments; a stored result is cloned
//! and returned without touching the callable, otherwise the callable runs
//! once and its result is stored for good.
//!
//! Calls take `&mut self`, so a `Memoized` cannot be shared between threads
//! without external locking. Use [`crate::sync::SyncMemoized`] for that.

use crate::error::CallError;
use crate::key::{Args, CallSignature, FnId};
use crate::metrics::Metrics;
use crate::store::CacheStore;
use crate::Result;
use std::fmt;
use tracing::{debug, trace, warn};

/// A callable wrapped with an unbounded result cache.
///
/// ```
/// use fnmemo::{args, Args, Memoized};
///
/// let mut square = Memoized::named("square", |args: &Args| {
///     let x = *args.get::<u64>(0).unwrap();
///     x * x
/// });
///
/// assert_eq!(square.call(args!(5_u64)).unwrap(), 25);
/// assert_eq!(square.call(args!(6_u64)).unwrap(), 36);
/// assert_eq!(square.call(args!(5_u64)).unwrap(), 25);
/// assert_eq!(square.metrics().misses(), 2);
/// ```
pub struct Memoized<F, T> {
    id: FnId,
    func: F,
    store: CacheStore<CallSignature, T>,
    metrics: Metrics,
}

impl<F, T> fmt::Debug for Memoized<F, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoized")
            .field("id", &self.id)
            .field("entries", &self.store.len())
            .field("metrics", &self.metrics)
            .finish()
    }
}

impl<F, T> Memoized<F, T> {
    fn with_id(id: FnId, func: F) -> Self {
        Self {
            id,
            func,
            store: CacheStore::new(),
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
        self.store.len()
    }

    /// Whether nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Whether a call with `args` would be answered from the cache.
    pub fn contains(&self, args: &Args) -> bool {
        CallSignature::derive(&self.id, args)
            .map(|signature| self.store.contains(&signature))
            .unwrap_or(false)
    }

    fn signature(&self, args: &Args) -> Result<CallSignature> {
        CallSignature::derive(&self.id, args).map_err(|err| {
            warn!(function = %self.id, error = %err, "cannot derive call signature");
            err
        })
    }

    fn lookup(&self, signature: &CallSignature) -> Option<&T> {
        let found = self.store.get(signature);
        if found.is_some() {
            self.metrics.record_hit();
            trace!(function = %self.id, fingerprint = signature.fingerprint(), "memo hit");
        } else {
            self.metrics.record_miss();
            debug!(function = %self.id, fingerprint = signature.fingerprint(), "memo miss");
        }
        found
    }
}

impl<F, T> Memoized<F, T>
where
    F: FnMut(&Args) -> T,
    T: Clone,
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
    ///
    /// Fails only with [`crate::Error::InvalidKey`], in which case the
    /// function is not run.
    pub fn call(&mut self, args: Args) -> Result<T> {
        let signature = self.signature(&args)?;
        if let Some(value) = self.lookup(&signature) {
            return Ok(value.clone());
        }

        let value = (self.func)(&args);
        self.metrics.record_insertion();
        Ok(self.store.insert(signature, value).clone())
    }
}

impl<F, T, E> Memoized<F, T>
where
    F: FnMut(&Args) -> std::result::Result<T, E>,
    T: Clone,
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
    /// An error from the function is handed back in [`CallError::Failed`]
    /// and nothing is cached, so the next call with the same arguments runs
    /// the function again.
    pub fn try_call(&mut self, args: Args) -> std::result::Result<T, CallError<E>> {
        let signature = self.signature(&args)?;
        if let Some(value) = self.lookup(&signature) {
            return Ok(value.clone());
        }

        let fingerprint = signature.fingerprint();
        let func = &mut self.func;
        match self.store.get_or_try_insert_with(signature, || func(&args)) {
            Ok(value) => {
                self.metrics.record_insertion();
                Ok(value.clone())
            }
            Err(err) => {
                self.metrics.record_failure();
                warn!(
                    function = %self.id,
                    fingerprint,
                    "wrapped function failed; result not cached"
                );
                Err(CallError::Failed(err))
            }
        }
    }
}
