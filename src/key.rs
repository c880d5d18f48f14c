//! Call signatures: the keys of every memo store.
//!
//! A [`CallSignature`] is derived from three parts:
//!
//! - the identity of the wrapped function ([`FnId`]),
//! - the positional arguments, compared in order,
//! - the keyword arguments, compared as an unordered set of name/value pairs.
//!
//! Argument values are compared through their encoding (see
//! [`crate::serialization`]) together with their Rust type name, so `5u32`
//! and `5i32` are distinct components even though bincode writes the same
//! bytes for both.
//!
//! Values are encoded when they are added to [`Args`]. A value whose
//! serialized form depends on hidden state (a `HashMap`'s iteration order, a
//! `Cell` mutated after the call) may produce signatures that do not reflect
//! the value's logical equality. Keeping arguments stable is the caller's job.

use crate::error::Error;
use crate::serialization::{BincodeEncoder, KeyEncoder};
use crate::Result;
use serde::Serialize;
use std::any::Any;
use std::borrow::Cow;
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Identity of a wrapped function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FnId(Cow<'static, str>);

impl FnId {
    /// Create an identity from an explicit name.
    pub fn new<S: Into<Cow<'static, str>>>(name: S) -> Self {
        Self(name.into())
    }

    /// Identity derived from the type name of `F`.
    ///
    /// For a function item this is its path, e.g. `my_crate::square`. For a
    /// closure it is the enclosing function's path followed by `{{closure}}`,
    /// so every closure in one function gets the same name. The name is a
    /// label for logs; keys never collide across wrappers because each
    /// wrapper owns its store.
    pub fn of<F: ?Sized>() -> Self {
        Self(Cow::Borrowed(std::any::type_name::<F>()))
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for FnId {
    fn from(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }
}

impl From<String> for FnId {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

/// One encoded argument value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArgValue {
    type_name: &'static str,
    bytes: Vec<u8>,
}

impl ArgValue {
    /// Encode `value` with the given encoder.
    pub fn encode<T, E>(encoder: &E, value: &T) -> Result<Self>
    where
        T: Serialize + ?Sized,
        E: KeyEncoder,
    {
        Ok(Self {
            type_name: std::any::type_name::<T>(),
            bytes: encoder.encode(value)?,
        })
    }

    /// The Rust type name of the encoded value.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// A single argument: its key component plus the value handed to the callable.
#[derive(Clone)]
struct Arg {
    key: ArgValue,
    value: Arc<dyn Any + Send + Sync>,
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arg").field("key", &self.key).finish_non_exhaustive()
    }
}

/// The arguments of one call.
///
/// Built with chained [`arg`](Args::arg) and [`kwarg`](Args::kwarg) calls or
/// with the [`args!`](crate::args) macro. Encoding failures and repeated
/// keyword names are remembered and reported when the signature is derived,
/// so building never fails on its own.
///
/// ```
/// use fnmemo::Args;
///
/// let args = Args::new().arg(5_u64).kwarg("scale", 2_u64);
/// assert_eq!(args.get::<u64>(0), Some(&5));
/// assert_eq!(args.get_kw::<u64>("scale"), Some(&2));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Args {
    positional: Vec<Arg>,
    keyword: BTreeMap<String, Arg>,
    error: Option<Error>,
}

impl Args {
    /// Empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg<T>(self, value: T) -> Self
    where
        T: Serialize + Send + Sync + 'static,
    {
        self.arg_with(&BincodeEncoder, value)
    }

    /// Append a positional argument encoded with `encoder`.
    pub fn arg_with<T, E>(mut self, encoder: &E, value: T) -> Self
    where
        T: Serialize + Send + Sync + 'static,
        E: KeyEncoder,
    {
        match Self::make(encoder, value) {
            Ok(arg) => self.positional.push(arg),
            Err(err) => self.fail(err),
        }
        self
    }

    /// Add a keyword argument.
    pub fn kwarg<T>(self, name: impl Into<String>, value: T) -> Self
    where
        T: Serialize + Send + Sync + 'static,
    {
        self.kwarg_with(&BincodeEncoder, name, value)
    }

    /// Add a keyword argument encoded with `encoder`.
    pub fn kwarg_with<T, E>(mut self, encoder: &E, name: impl Into<String>, value: T) -> Self
    where
        T: Serialize + Send + Sync + 'static,
        E: KeyEncoder,
    {
        let name = name.into();
        if self.keyword.contains_key(&name) {
            self.fail(Error::invalid_key(format!(
                "keyword argument `{}` given more than once",
                name
            )));
            return self;
        }
        match Self::make(encoder, value) {
            Ok(arg) => {
                self.keyword.insert(name, arg);
            }
            Err(err) => self.fail(err),
        }
        self
    }

    /// The positional argument at `index`, if present and of type `T`.
    pub fn get<T: Any>(&self, index: usize) -> Option<&T> {
        self.positional
            .get(index)
            .and_then(|arg| arg.value.downcast_ref())
    }

    /// The keyword argument `name`, if present and of type `T`.
    pub fn get_kw<T: Any>(&self, name: &str) -> Option<&T> {
        self.keyword
            .get(name)
            .and_then(|arg| arg.value.downcast_ref())
    }

    /// Number of positional arguments.
    pub fn positional_len(&self) -> usize {
        self.positional.len()
    }

    /// Keyword names in sorted order.
    pub fn keyword_names(&self) -> impl Iterator<Item = &str> {
        self.keyword.keys().map(String::as_str)
    }

    fn make<T, E>(encoder: &E, value: T) -> Result<Arg>
    where
        T: Serialize + Send + Sync + 'static,
        E: KeyEncoder,
    {
        let key = ArgValue::encode(encoder, &value)?;
        Ok(Arg {
            key,
            value: Arc::new(value),
        })
    }

    fn fail(&mut self, err: Error) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }
}

/// Build an [`Args`] value.
///
/// Positional arguments come first, separated by commas. Keyword arguments
/// follow a semicolon as `name = value` pairs.
///
/// ```
/// use fnmemo::args;
///
/// let a = args!(1, 2; x = 1, y = 2);
/// let b = args!(1, 2; y = 2, x = 1);
/// assert_eq!(a.keyword_names().collect::<Vec<_>>(), ["x", "y"]);
/// assert_eq!(b.keyword_names().collect::<Vec<_>>(), ["x", "y"]);
/// ```
#[macro_export]
macro_rules! args {
    ($($pos:expr),* $(,)? $(; $($name:ident = $kw:expr),* $(,)?)?) => {{
        #[allow(unused_mut)]
        let mut args = $crate::Args::new();
        $(args = args.arg($pos);)*
        $($(args = args.kwarg(stringify!($name), $kw);)*)?
        args
    }};
}

/// The cache key of one call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallSignature {
    function: FnId,
    positional: Vec<ArgValue>,
    keyword: Vec<(String, ArgValue)>,
}

impl CallSignature {
    /// Derive the signature of calling `function` with `args`.
    ///
    /// Keyword pairs are stored sorted by name, so insertion order never
    /// matters. Positional order always does. Fails with
    /// [`Error::InvalidKey`] if an argument could not be encoded or a keyword
    /// name was repeated.
    pub fn derive(function: &FnId, args: &Args) -> Result<Self> {
        if let Some(err) = &args.error {
            return Err(err.clone());
        }

        Ok(Self {
            function: function.clone(),
            positional: args.positional.iter().map(|a| a.key.clone()).collect(),
            keyword: args
                .keyword
                .iter()
                .map(|(name, a)| (name.clone(), a.key.clone()))
                .collect(),
        })
    }

    /// The function this signature belongs to.
    pub fn function(&self) -> &FnId {
        &self.function
    }

    /// Number of positional components.
    pub fn arity(&self) -> usize {
        self.positional.len() + self.keyword.len()
    }

    /// A 64-bit digest of the signature, for logging.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(args: Args) -> CallSignature {
        CallSignature::derive(&FnId::new("f"), &args).unwrap()
    }

    #[test]
    fn test_keyword_order_is_ignored() {
        let a = sig(Args::new().kwarg("x", 1).kwarg("y", 2));
        let b = sig(Args::new().kwarg("y", 2).kwarg("x", 1));
        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_positional_order_matters() {
        assert_ne!(sig(args!(1, 2)), sig(args!(2, 1)));
    }

    #[test]
    fn test_positional_and_keyword_are_distinct() {
        assert_ne!(sig(args!(1)), sig(args!(; x = 1)));
    }

    #[test]
    fn test_type_is_part_of_the_key() {
        assert_ne!(sig(args!(5_u32)), sig(args!(5_i32)));
    }

    #[test]
    fn test_function_identity_is_part_of_the_key() {
        let args = args!(3);
        let f = CallSignature::derive(&FnId::new("f"), &args).unwrap();
        let g = CallSignature::derive(&FnId::new("g"), &args).unwrap();
        assert_ne!(f, g);
        assert_eq!(g.function().as_str(), "g");
    }

    #[test]
    fn test_duplicate_keyword_is_invalid() {
        let args = Args::new().kwarg("x", 1).kwarg("x", 2);
        let err = CallSignature::derive(&FnId::new("f"), &args).unwrap_err();
        assert!(matches!(err, Error::InvalidKey(msg) if msg.contains("`x`")));
        assert_eq!(args.get_kw::<i32>("x"), Some(&1));
    }

    #[test]
    fn test_values_are_retrievable() {
        let args = args!(String::from("a"), 7_u8; flag = true);
        assert_eq!(args.positional_len(), 2);
        assert_eq!(args.get::<String>(0).map(String::as_str), Some("a"));
        assert_eq!(args.get::<u8>(1), Some(&7));
        assert_eq!(args.get::<u16>(1), None);
        assert_eq!(args.get_kw::<bool>("flag"), Some(&true));
        assert_eq!(sig(args).arity(), 3);
    }

    #[test]
    fn test_fn_id_of_names_function_items() {
        fn square(x: u64) -> u64 {
            x * x
        }
        fn cube(x: u64) -> u64 {
            x * x * x
        }
        fn id_of<F>(_: &F) -> FnId {
            FnId::of::<F>()
        }

        let square_id = id_of(&square);
        assert_ne!(square_id, id_of(&cube));
        assert!(square_id.as_str().ends_with("square"));
        assert_eq!(square_id, id_of(&square));
    }

    #[test]
    fn test_fn_id_of_closures_is_only_a_label() {
        let a = || 1;
        let b = || 2;
        fn id_of<F>(_: &F) -> FnId {
            FnId::of::<F>()
        }
        assert!(id_of(&a).as_str().contains("{{closure}}"));
        assert_eq!(id_of(&a), id_of(&b));
    }
}
