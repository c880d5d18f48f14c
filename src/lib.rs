#![warn(missing_docs)]
//! # fnmemo
//!
//! Transparent memoization of function results, keyed by the arguments of
//! each call.
//!
//! A wrapped function runs at most once per distinct set of arguments. Later
//! calls with equal arguments get a clone of the stored result and the
//! function (and any side effect it has) is skipped. Positional arguments are
//! compared in order; keyword arguments are compared as a set, so the order
//! they are given in does not matter.
//!
//! ```
//! use fnmemo::{args, Args, Memoized};
//!
//! let mut square = Memoized::named("square", |args: &Args| {
//!     let x = *args.get::<i64>(0).unwrap();
//!     x * x
//! });
//!
//! assert_eq!(square.call(args!(5_i64)).unwrap(), 25);
//! assert_eq!(square.call(args!(6_i64)).unwrap(), 36);
//! assert_eq!(square.call(args!(5_i64)).unwrap(), 25);
//! assert_eq!(square.metrics().misses(), 2);
//! ```
//!
//! The cache of a [`Memoized`] lives and dies with the wrapper. It is never
//! cleared and never bounded; see [`BoundedMemoized`] for a size-limited
//! variant. Thread-safe and async variants live in [`sync`] and [`future`].
//!
//! Errors returned by a fallible function are passed through and never
//! cached, so a failed call is retried the next time.

pub mod bounded;
pub mod config;
pub mod error;
pub mod eviction;
#[cfg(feature = "async")]
pub mod future;
pub mod key;
pub mod memo;
pub mod metrics;
pub mod serialization;
pub mod store;
#[cfg(feature = "sync")]
pub mod sync;

pub use bounded::BoundedMemoized;
pub use config::{BoundedConfig, EvictionKind};
pub use error::{CallError, Error};
pub use key::{Args, CallSignature, FnId};
pub use memo::Memoized;
pub use metrics::Metrics;
pub use store::{CacheStore, MemoOutput};

#[cfg(feature = "async")]
pub use future::AsyncMemoized;
#[cfg(feature = "sync")]
pub use sync::SyncMemoized;

/// Attribute macro that memoizes a free function.
///
/// Every argument must be owned and `Clone + Hash + Eq`; the return type must
/// be `Clone`. Each decorated function gets its own cache, private to the
/// calling thread, plus a `<name>_cache_len()` helper.
///
/// ```
/// use fnmemo::memoize;
///
/// #[memoize]
/// fn fib(n: u64) -> u64 {
///     if n < 2 { n } else { fib(n - 1) + fib(n - 2) }
/// }
///
/// assert_eq!(fib(80), 23_416_728_348_467_685);
/// assert_eq!(fib_cache_len(), 81);
/// ```
#[cfg(feature = "macros")]
#[doc(inline)]
pub use fnmemo_macros::memoize;

/// The main result type.
pub type Result<T> = std::result::Result<T, error::Error>;

/// Wrap `func` in a [`Memoized`], identified by its type name.
///
/// Shorthand for [`Memoized::wrap`].
pub fn wrap<F, T>(func: F) -> Memoized<F, T>
where
    F: FnMut(&Args) -> T,
    T: Clone,
{
    Memoized::wrap(func)
}

/// Common prelude for using the library.
pub mod prelude {
    pub use crate::{
        args, error::CallError, error::Error, key::Args, memo::Memoized, BoundedConfig,
        BoundedMemoized, Result,
    };

    #[cfg(feature = "macros")]
    pub use crate::memoize;
    #[cfg(feature = "async")]
    pub use crate::AsyncMemoized;
    #[cfg(feature = "sync")]
    pub use crate::SyncMemoized;
}
