//! A memoizer with a size limit.
//!
//! [`BoundedMemoized`] behaves like [`crate::Memoized`] until it holds
//! `max_capacity` results. Past that point each new result pushes out the
//! entry chosen by the configured [`EvictionPolicy`], and a later call with
//! the evicted arguments runs the function again.

use crate::config::BoundedConfig;
use crate::error::CallError;
use crate::eviction::{create_policy, EvictionPolicy};
use crate::key::{Args, CallSignature, FnId};
use crate::metrics::Metrics;
use crate::Result;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, trace, warn};

/// A callable wrapped with a size-limited result cache.
pub struct BoundedMemoized<F, T> {
    id: FnId,
    func: F,
    config: BoundedConfig,
    entries: HashMap<CallSignature, T>,
    policy: Box<dyn EvictionPolicy<CallSignature>>,
    metrics: Metrics,
}

impl<F, T> fmt::Debug for BoundedMemoized<F, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedMemoized")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("entries", &self.entries.len())
            .field("metrics", &self.metrics)
            .finish()
    }
}

impl<F, T> BoundedMemoized<F, T> {
    fn with_id(id: FnId, config: BoundedConfig, func: F) -> Self {
        let policy = create_policy(config.eviction_policy);
        Self {
            id,
            func,
            config,
            entries: HashMap::new(),
            policy,
            metrics: Metrics::new(),
        }
    }

    /// Identity of the wrapped function.
    pub fn name(&self) -> &FnId {
        &self.id
    }

    /// The configuration this memoizer was built with.
    pub fn config(&self) -> &BoundedConfig {
        &self.config
    }

    /// Call statistics.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Number of cached results.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a call with `args` would be answered from the cache.
    ///
    /// Does not count as an access for the eviction policy.
    pub fn contains(&self, args: &Args) -> bool {
        CallSignature::derive(&self.id, args)
            .map(|signature| self.entries.contains_key(&signature))
            .unwrap_or(false)
    }

    fn signature(&self, args: &Args) -> Result<CallSignature> {
        CallSignature::derive(&self.id, args).map_err(|err| {
            warn!(function = %self.id, error = %err, "cannot derive call signature");
            err
        })
    }

    fn lookup(&mut self, signature: &CallSignature) -> Option<&T> {
        if self.entries.contains_key(signature) {
            self.metrics.record_hit();
            self.policy.on_access(signature);
            trace!(function = %self.id, fingerprint = signature.fingerprint(), "memo hit");
            self.entries.get(signature)
        } else {
            self.metrics.record_miss();
            debug!(function = %self.id, fingerprint = signature.fingerprint(), "memo miss");
            None
        }
    }

    fn store(&mut self, signature: CallSignature, value: T) -> &T {
        let capacity = self.config.max_capacity;
        if capacity > 0 && self.entries.len() >= capacity {
            let to_evict = self.entries.len() + 1 - capacity;
            for key in self.policy.evict(to_evict).keys_to_evict {
                if self.entries.remove(&key).is_some() {
                    self.metrics.record_eviction();
                    debug!(function = %self.id, fingerprint = key.fingerprint(), "evicted");
                }
            }
        }

        self.policy.on_insert(&signature);
        self.metrics.record_insertion();
        self.entries.entry(signature).or_insert(value)
    }
}

impl<F, T> BoundedMemoized<F, T>
where
    F: FnMut(&Args) -> T,
    T: Clone,
{
    /// Wrap `func` under an explicit name.
    pub fn new(name: impl Into<FnId>, config: BoundedConfig, func: F) -> Self {
        Self::with_id(name.into(), config, func)
    }

    /// Call the wrapped function, or return the cached result.
    pub fn call(&mut self, args: Args) -> Result<T> {
        let signature = self.signature(&args)?;
        if let Some(value) = self.lookup(&signature) {
            return Ok(value.clone());
        }

        let value = (self.func)(&args);
        Ok(self.store(signature, value).clone())
    }
}

impl<F, T, E> BoundedMemoized<F, T>
where
    F: FnMut(&Args) -> std::result::Result<T, E>,
    T: Clone,
{
    /// Wrap a fallible `func` under an explicit name.
    pub fn new_fallible(name: impl Into<FnId>, config: BoundedConfig, func: F) -> Self {
        Self::with_id(name.into(), config, func)
    }

    /// Call the wrapped function, or return the cached success.
    ///
    /// Errors are returned in [`CallError::Failed`] and never cached.
    pub fn try_call(&mut self, args: Args) -> std::result::Result<T, CallError<E>> {
        let signature = self.signature(&args)?;
        if let Some(value) = self.lookup(&signature) {
            return Ok(value.clone());
        }

        match (self.func)(&args) {
            Ok(value) => Ok(self.store(signature, value).clone()),
            Err(err) => {
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
