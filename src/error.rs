//! Error types for the fnmemo library.

use std::fmt;

/// The main error type for the fnmemo library.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// An argument could not be turned into a component of a call signature.
    #[error("invalid cache key: {0}")]
    InvalidKey(String),

    /// A configuration value could not be understood.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Creates a new invalid key error.
    pub fn invalid_key<E: fmt::Display>(reason: E) -> Self {
        Self::InvalidKey(reason.to_string())
    }
}

/// A specialized `Result` type for key derivation and configuration.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a call to a fallible memoized function.
///
/// `Failed` carries the callable's own error exactly as it was returned.
/// Nothing is cached for a call that ends in either variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallError<E> {
    /// The arguments could not form a call signature; the callable never ran.
    InvalidKey(Error),
    /// The underlying callable returned an error.
    Failed(E),
}

impl<E> CallError<E> {
    /// Returns the callable's error, if that is what this is.
    pub fn into_failure(self) -> Option<E> {
        match self {
            CallError::Failed(err) => Some(err),
            CallError::InvalidKey(_) => None,
        }
    }

    /// Whether the callable itself failed.
    pub fn is_failure(&self) -> bool {
        matches!(self, CallError::Failed(_))
    }
}

impl<E> From<Error> for CallError<E> {
    fn from(error: Error) -> Self {
        CallError::InvalidKey(error)
    }
}

impl<E: fmt::Display> fmt::Display for CallError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallError::InvalidKey(err) => write!(f, "{}", err),
            CallError::Failed(err) => write!(f, "{}", err),
        }
    }
}

impl<E> std::error::Error for CallError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CallError::InvalidKey(err) => Some(err),
            CallError::Failed(err) => err.source(),
        }
    }
}
